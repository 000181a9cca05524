//! pebbled - forward desktop notifications to a Pebble watch
//!
//! Long-lived daemon that monitors DBus desktop notifications and mirrors
//! them into the watch's BlobDB Notification table over the TCP developer
//! connection (emulator or dev-port). Notifications closed on the desktop
//! are deleted from the watch; dismissals are retried while the device
//! reports itself busy.
//!
//! Usage:
//!   pebbled --device 127.0.0.1:12344
//!
//! Requirements:
//! - Linux with DBus and a notification daemon
//! - A watch (or emulator) reachable over the developer connection

use chrono::Utc;
use clap::Parser;
use futures::stream::StreamExt;
use log::{debug, error, info, warn};
use pebble_blobdb::{
    timeline::attribute_id, FormatCompletion, FormattedRecord, FormattingChannel,
    NotificationAction, NotificationSync, OsNotificationHandle, RawNotification, RetryPolicy,
    TcpDevLink, TimelineAction, TimelineAttribute,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Collection id the watch groups generic desktop notifications under
const NOTIFICATION_PARENT_ID: Uuid = Uuid::from_u128(0xB2CA_E818_10F8_46DF_AD2B_98AD_2254_A3C1);

/// Generic notification layout selector
const GENERIC_LAYOUT: u8 = 0x01;

/// Byte limits the watch applies to notification text
const MAX_TITLE_LEN: usize = 64;
const MAX_BODY_LEN: usize = 512;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "pebbled")]
#[command(about = "Forward desktop notifications to a Pebble watch")]
struct Args {
    /// Developer connection address of the watch or emulator (host:port)
    #[arg(long, default_value = "127.0.0.1:12344")]
    device: String,

    /// Per-command response timeout in seconds
    #[arg(long, default_value = "10")]
    response_timeout: u64,

    /// Give up on a busy device after this many attempts (default: retry forever)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Only forward notifications from specific apps (comma-separated)
    #[arg(long)]
    filter_apps: Option<String>,
}

/// Formats raw notifications into timeline records locally
///
/// Stands in for a remote formatting engine: it answers every request
/// inline, assigning a fresh record identifier and mapping title, app name,
/// and body text onto the generic notification layout.
struct LocalFormatter;

impl FormattingChannel for LocalFormatter {
    fn request_format(&self, notification: RawNotification, completion: FormatCompletion) {
        let mut attributes = vec![
            TimelineAttribute {
                max_length: MAX_TITLE_LEN,
                ..TimelineAttribute::string(attribute_id::TITLE, notification.title.clone())
            },
            TimelineAttribute::string(attribute_id::SUBTITLE, notification.app_name.clone()),
        ];

        // Conversation-style notifications carry their messages instead of
        // the summary body
        let body = if notification.messages.is_empty() {
            notification.text.clone()
        } else {
            notification
                .messages
                .iter()
                .map(|m| format!("{}: {}", m.sender, m.text))
                .collect::<Vec<_>>()
                .join("\n")
        };
        attributes.push(TimelineAttribute {
            max_length: MAX_BODY_LEN,
            ..TimelineAttribute::string(attribute_id::BODY, body)
        });

        let mut actions = vec![TimelineAction::dismiss(0, "Dismiss")];
        for (index, action) in notification.actions.iter().enumerate() {
            actions.push(TimelineAction {
                action_id: (index + 1) as u8,
                action_type: if action.is_response {
                    pebble_blobdb::ActionType::Response
                } else {
                    pebble_blobdb::ActionType::Generic
                },
                attributes: vec![TimelineAttribute::string(
                    attribute_id::TITLE,
                    action.title.clone(),
                )],
            });
        }

        completion.resolve(FormattedRecord {
            item_id: Uuid::new_v4().to_string(),
            parent_id: NOTIFICATION_PARENT_ID.to_string(),
            timestamp: Utc::now().timestamp(),
            duration: 0,
            layout: GENERIC_LAYOUT,
            attributes,
            actions,
        });
    }
}

/// Cancels a desktop notification through the notification daemon
struct DbusCloseHandle {
    connection: zbus::Connection,
    dbus_id: u32,
}

impl OsNotificationHandle for DbusCloseHandle {
    fn cancel(&self) {
        let connection = self.connection.clone();
        let dbus_id = self.dbus_id;
        tokio::spawn(async move {
            let result = async {
                let proxy = zbus::Proxy::new(
                    &connection,
                    "org.freedesktop.Notifications",
                    "/org/freedesktop/Notifications",
                    "org.freedesktop.Notifications",
                )
                .await?;
                proxy.call_method("CloseNotification", &(dbus_id)).await?;
                Ok::<(), zbus::Error>(())
            }
            .await;

            if let Err(e) = result {
                warn!("Failed to close desktop notification {}: {}", dbus_id, e);
            }
        });
    }
}

/// Record identifiers of forwarded notifications, keyed by desktop id
type ForwardedMap = Arc<Mutex<HashMap<u32, Uuid>>>;

/// Parse a Notify method call into the raw fields the sync layer wants
///
/// Signature "susssasa{sv}i": app_name, replaces_id, app_icon, summary,
/// body, actions, hints, timeout.
fn parse_notify(msg: &zbus::message::Message) -> zbus::Result<(u32, RawNotification)> {
    let (app_name, replaces_id, _app_icon, summary, body, actions, hints, _timeout): (
        String,
        u32,
        String,
        String,
        String,
        Vec<String>,
        HashMap<String, zbus::zvariant::OwnedValue>,
        i32,
    ) = msg.body().deserialize()?;

    // DBus actions alternate [key, label, key, label, ...]; the labels are
    // what the watch can show
    let actions = actions
        .chunks(2)
        .filter_map(|pair| pair.get(1))
        .map(|label| NotificationAction {
            title: label.clone(),
            is_response: false,
        })
        .collect();

    let package_id = hints
        .get("desktop-entry")
        .and_then(|v| <&str>::try_from(v).ok())
        .unwrap_or(&app_name)
        .to_string();

    Ok((
        replaces_id,
        RawNotification {
            package_id,
            app_name,
            notif_id: replaces_id as i64,
            tag_id: None,
            tag_name: None,
            title: summary,
            text: body,
            messages: vec![],
            actions,
        },
    ))
}

async fn handle_notify(
    msg: &zbus::message::Message,
    sync: &NotificationSync,
    control: &zbus::Connection,
    forwarded: &ForwardedMap,
    filter_apps: &Option<Vec<String>>,
    inflight: &mut JoinSet<()>,
) {
    let (dbus_id, raw) = match parse_notify(msg) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Could not parse Notify call: {}", e);
            return;
        }
    };

    if let Some(filter) = filter_apps {
        if !filter.iter().any(|app| raw.app_name.contains(app.as_str())) {
            debug!("Skipping notification from filtered app {}", raw.app_name);
            return;
        }
    }

    info!("Forwarding notification from {}: {}", raw.app_name, raw.title);

    let sync = sync.clone();
    let control = control.clone();
    let forwarded = forwarded.clone();
    inflight.spawn(async move {
        match sync.submit_notification(raw).await {
            Ok((item, status)) => {
                info!("Notification {} committed with {}", item.item_id, status);
                // The desktop id is only known when the sender supplied one;
                // without it there is nothing CloseNotification could target.
                if dbus_id != 0 {
                    sync.track(
                        item.item_id,
                        Box::new(DbusCloseHandle {
                            connection: control,
                            dbus_id,
                        }),
                    );
                    forwarded.lock().unwrap().insert(dbus_id, item.item_id);
                }
            }
            Err(e) => error!("Failed to forward notification: {}", e),
        }
    });
}

async fn handle_notification_closed(
    msg: &zbus::message::Message,
    sync: &NotificationSync,
    forwarded: &ForwardedMap,
    inflight: &mut JoinSet<()>,
) {
    let (dbus_id, _reason): (u32, u32) = match msg.body().deserialize() {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Could not parse NotificationClosed signal: {}", e);
            return;
        }
    };

    let record_id = forwarded.lock().unwrap().remove(&dbus_id);
    if let Some(record_id) = record_id {
        info!(
            "Desktop notification {} closed, deleting record {}",
            dbus_id, record_id
        );
        // The desktop side is already gone; drop the handle without
        // cancelling and only clean up the watch
        sync.registry().untrack(record_id);
        let sync = sync.clone();
        inflight.spawn(async move {
            if let Err(e) = sync.dismiss(record_id).await {
                error!("Failed to delete record {}: {}", record_id, e);
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let filter_apps: Option<Vec<String>> = args
        .filter_apps
        .as_ref()
        .map(|s| s.split(',').map(|a| a.trim().to_string()).collect());

    info!("Connecting to device at {}", args.device);
    let link = TcpDevLink::connect(args.device.as_str())
        .await?
        .with_response_timeout(Duration::from_secs(args.response_timeout));

    let policy = RetryPolicy {
        max_attempts: args.max_attempts,
        ..Default::default()
    };

    let sync = NotificationSync::new(Arc::new(link)).with_policy(policy);
    sync.gateway().attach_channel(Arc::new(LocalFormatter));
    info!("Device link ready");

    // Separate connections: the monitor connection becomes receive-only
    // once BecomeMonitor is granted, so CloseNotification calls need their
    // own connection.
    let monitor = zbus::Connection::session().await?;
    let control = zbus::Connection::session().await?;

    let monitoring_proxy = zbus::fdo::MonitoringProxy::new(&monitor).await?;

    let notify_rule = zbus::MatchRule::builder()
        .msg_type(zbus::message::Type::MethodCall)
        .interface("org.freedesktop.Notifications")?
        .member("Notify")?
        .build();

    let closed_rule = zbus::MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface("org.freedesktop.Notifications")?
        .member("NotificationClosed")?
        .build();

    monitoring_proxy
        .become_monitor(&[notify_rule, closed_rule], 0)
        .await?;
    info!("DBus notification monitor active");

    let forwarded: ForwardedMap = Arc::new(Mutex::new(HashMap::new()));
    let mut inflight: JoinSet<()> = JoinSet::new();
    let mut stream = zbus::MessageStream::from(&monitor);

    loop {
        tokio::select! {
            Some(msg) = stream.next() => {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("DBus stream error: {}", e);
                        continue;
                    }
                };

                let header = msg.header();
                let interface = header.interface().map(|i| i.as_str()).unwrap_or("");
                let member = header.member().map(|m| m.as_str()).unwrap_or("");

                if interface != "org.freedesktop.Notifications" {
                    continue;
                }

                match (msg.message_type(), member) {
                    (zbus::message::Type::MethodCall, "Notify") => {
                        handle_notify(&msg, &sync, &control, &forwarded, &filter_apps, &mut inflight)
                            .await;
                    }
                    (zbus::message::Type::Signal, "NotificationClosed") => {
                        handle_notification_closed(&msg, &sync, &forwarded, &mut inflight).await;
                    }
                    _ => {}
                }
            }
            Some(result) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!("Notification task panicked: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down, aborting {} in-flight operation(s)", inflight.len());
                inflight.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
