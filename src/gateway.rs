//! Record formatting gateway
//!
//! Turning a raw OS notification into a timeline record is the job of an
//! external formatting layer that answers asynchronously through a one-shot
//! callback. This module bridges that callback into a single-result future:
//! each request owns its own completion slot, a request is completed exactly
//! once (a duplicate completion is logged and discarded), and a request made
//! while no channel is attached fails fast instead of waiting on a layer
//! that cannot answer.

use crate::timeline::{TimelineAction, TimelineAttribute, TimelineItem, TimelineItemType};
use crate::types::{BlobDbError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;

/// A structured sub-message of a conversation-style notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: i64,
}

/// An action offered by the OS notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub title: String,
    pub is_response: bool,
}

/// Raw notification fields handed to the formatting layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    pub package_id: String,
    pub app_name: String,
    pub notif_id: i64,
    #[serde(default)]
    pub tag_id: Option<String>,
    #[serde(default)]
    pub tag_name: Option<String>,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub messages: Vec<NotificationMessage>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

/// Structured record description produced by the formatting layer
///
/// Identifiers arrive as strings; parsing them is part of assembling the
/// device-ready record, and a malformed identifier is a caller error, never
/// a retryable condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRecord {
    pub item_id: String,
    pub parent_id: String,
    pub timestamp: i64,
    pub duration: u16,
    pub layout: u8,
    #[serde(default)]
    pub attributes: Vec<TimelineAttribute>,
    #[serde(default)]
    pub actions: Vec<TimelineAction>,
}

impl FormattedRecord {
    /// Assemble the device-ready timeline record
    pub fn into_timeline_item(self) -> Result<TimelineItem> {
        let item_id = parse_identifier(&self.item_id)?;
        let parent_id = parse_identifier(&self.parent_id)?;

        Ok(TimelineItem {
            item_id,
            parent_id,
            timestamp: self.timestamp as u32,
            duration: self.duration,
            item_type: TimelineItemType::Notification,
            flags: 0,
            layout: self.layout,
            attributes: self.attributes,
            actions: self.actions,
        })
    }
}

/// Parse a record identifier string
pub fn parse_identifier(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| BlobDbError::MalformedIdentifier(value.to_string()))
}

/// Single-use completion handle for one format request
///
/// The formatting layer calls [`FormatCompletion::resolve`] exactly once.
/// A second resolution for the same request is a protocol violation: it is
/// logged and discarded without touching the already-delivered result.
#[derive(Clone)]
pub struct FormatCompletion {
    slot: Arc<Mutex<Option<oneshot::Sender<FormattedRecord>>>>,
}

impl FormatCompletion {
    /// Wrap a one-shot sender as a single-use completion
    ///
    /// The gateway builds one per request; channel implementations may also
    /// construct them directly when exercising a channel on its own.
    pub fn new(sender: oneshot::Sender<FormattedRecord>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Deliver the formatted record to the waiting request
    ///
    /// Returns false if this request was already completed.
    pub fn resolve(&self, record: FormattedRecord) -> bool {
        let sender = self.slot.lock().unwrap().take();
        match sender {
            Some(sender) => {
                if sender.send(record).is_err() {
                    debug!("Format request was cancelled before completion");
                }
                true
            }
            None => {
                warn!("Duplicate completion for an already-resolved format request, discarding");
                false
            }
        }
    }
}

/// The external formatting collaborator
///
/// Implementations dispatch the raw fields to whatever produces the record
/// (a UI layer, a rules engine) and invoke the completion when it answers.
pub trait FormattingChannel: Send + Sync {
    fn request_format(&self, notification: RawNotification, completion: FormatCompletion);
}

/// Bridges the callback-style formatting channel into awaitable requests
pub struct FormattingGateway {
    channel: Mutex<Option<Arc<dyn FormattingChannel>>>,
}

impl Default for FormattingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FormattingGateway {
    pub fn new() -> Self {
        Self {
            channel: Mutex::new(None),
        }
    }

    /// Attach the formatting channel once its owning layer is initialized
    pub fn attach_channel(&self, channel: Arc<dyn FormattingChannel>) {
        *self.channel.lock().unwrap() = Some(channel);
    }

    pub fn is_attached(&self) -> bool {
        self.channel.lock().unwrap().is_some()
    }

    /// Request formatting of a raw notification and await the record
    ///
    /// Fails fast with `ChannelUnavailable` when no channel is attached:
    /// there is no backpressure signal to wait on, so waiting would pend
    /// forever. `FormattingAborted` surfaces a channel that dropped the
    /// completion without answering.
    pub async fn format(&self, notification: RawNotification) -> Result<FormattedRecord> {
        let channel = self
            .channel
            .lock()
            .unwrap()
            .clone()
            .ok_or(BlobDbError::ChannelUnavailable)?;

        let (tx, rx) = oneshot::channel();
        channel.request_format(notification, FormatCompletion::new(tx));

        rx.await.map_err(|_| BlobDbError::FormattingAborted)
    }
}
