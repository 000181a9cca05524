//! Notification synchronization service
//!
//! Public surface for keeping the watch's Notification table in step with
//! the OS: submit a raw notification (formatted externally, then inserted
//! and retried until the device settles it), dismiss by record identifier
//! (cancelling the OS notification when one is tracked), or fire a quiet
//! device-side delete without waiting for settlement.

use crate::blobdb::BlobCommand;
use crate::gateway::{parse_identifier, FormattingGateway, RawNotification};
use crate::registry::{ActiveNotifications, OsNotificationHandle};
use crate::retry::{send_settling, RetryPolicy};
use crate::timeline::TimelineItem;
use crate::transport::BlobTransport;
use crate::types::{BlobDatabase, BlobStatus, Result};
use log::{debug, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Drives notification inserts and deletes against the device's BlobDB
///
/// Every operation is an independent async task: submissions and dismissals
/// for different records may run concurrently, correlated to their responses
/// by command token. Dropping an operation's future cancels it at its next
/// suspension point.
#[derive(Clone)]
pub struct NotificationSync {
    transport: Arc<dyn BlobTransport>,
    gateway: Arc<FormattingGateway>,
    registry: Arc<ActiveNotifications>,
    policy: RetryPolicy,
    database: BlobDatabase,
}

impl NotificationSync {
    pub fn new(transport: Arc<dyn BlobTransport>) -> Self {
        Self {
            transport,
            gateway: Arc::new(FormattingGateway::new()),
            registry: Arc::new(ActiveNotifications::new()),
            policy: RetryPolicy::default(),
            database: BlobDatabase::Notification,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The formatting gateway, for attaching the external channel
    pub fn gateway(&self) -> &FormattingGateway {
        &self.gateway
    }

    /// The registry of currently-displayed notifications
    pub fn registry(&self) -> &ActiveNotifications {
        &self.registry
    }

    /// Remember the OS handle for a record so a later dismissal can cancel
    /// the OS notification too
    pub fn track(&self, id: Uuid, handle: Box<dyn OsNotificationHandle>) {
        self.registry.track(id, handle);
    }

    /// Format a raw notification and insert the record on the device
    ///
    /// Completes only once the device settles the insert: TryLater responses
    /// are absorbed by the retry driver, every other status is returned
    /// alongside the record that was sent.
    pub async fn submit_notification(
        &self,
        notification: RawNotification,
    ) -> Result<(TimelineItem, BlobStatus)> {
        let record = self.gateway.format(notification).await?;
        let item = record.into_timeline_item()?;

        debug!(
            "Inserting notification record {} (layout {})",
            item.item_id, item.layout
        );

        let command = BlobCommand::insert(self.database, item.key().to_vec(), item.to_bytes());
        let response = send_settling(self.transport.as_ref(), command, &self.policy).await?;

        info!(
            "Notification {} settled with {}",
            item.item_id, response.status
        );
        Ok((item, response.status))
    }

    /// Dismiss a record: cancel its OS notification if tracked, delete it on
    /// the device, and wait for the delete to settle
    ///
    /// Dismissing an identifier that was never tracked still issues the
    /// device-side delete; the registry removal is simply a no-op.
    pub async fn dismiss(&self, id: Uuid) -> Result<BlobStatus> {
        if let Some(handle) = self.registry.untrack(id) {
            debug!("Cancelling OS notification for {}", id);
            handle.cancel();
        }

        let command = BlobCommand::delete(self.database, id.as_bytes().to_vec());
        let response = send_settling(self.transport.as_ref(), command, &self.policy).await?;

        info!("Dismissal of {} settled with {}", id, response.status);
        Ok(response.status)
    }

    /// Dismiss by identifier string, rejecting malformed input before any
    /// device interaction
    pub async fn dismiss_str(&self, id: &str) -> Result<BlobStatus> {
        let id = parse_identifier(id)?;
        self.dismiss(id).await
    }

    /// Issue a device-side delete without waiting for settlement
    ///
    /// The delete still retries until the device settles it; the returned
    /// handle owns the spawned task, so the caller can await or abort it.
    pub fn dismiss_quiet(&self, id: Uuid) -> JoinHandle<Result<BlobStatus>> {
        let sync = self.clone();
        tokio::spawn(async move {
            let command = BlobCommand::delete(sync.database, id.as_bytes().to_vec());
            let response = send_settling(sync.transport.as_ref(), command, &sync.policy).await?;
            debug!("Quiet dismissal of {} settled with {}", id, response.status);
            Ok(response.status)
        })
    }
}
