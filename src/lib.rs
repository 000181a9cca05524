//! Pebble BlobDB Notification Synchronization
//!
//! This library keeps a wearable's BlobDB record store in step with the
//! notifications shown by the host OS: records are formatted externally,
//! serialized into timeline records, and committed with Insert/Delete
//! commands that are retried until the device settles them.
//!
//! # Modules
//!
//! - `blobdb`: Insert/Delete command payloads and response decoding
//! - `timeline`: timeline record types and device serialization
//! - `transport`: the device link seam and the TCP developer connection
//! - `retry`: the retry-until-settled command driver
//! - `gateway`: callback-to-future bridge to the external formatting layer
//! - `registry`: active OS notifications keyed by record identifier
//! - `sync`: the public submit/dismiss surface
//! - `apps`: installed-app category lookup with per-category TTL caching

pub mod apps;
pub mod blobdb;
pub mod gateway;
pub mod registry;
pub mod retry;
pub mod sync;
pub mod timeline;
pub mod token;
pub mod transport;
pub mod types;

pub use apps::{AppCategoryDirectory, AppCategorySource, TtlCache};
pub use blobdb::{BlobCommand, BlobResponse};
pub use gateway::{
    FormatCompletion, FormattedRecord, FormattingChannel, FormattingGateway, NotificationAction,
    NotificationMessage, RawNotification,
};
pub use registry::{ActiveNotifications, OsNotificationHandle};
pub use retry::{send_settling, RetryPolicy};
pub use sync::NotificationSync;
pub use timeline::{
    ActionType, TimelineAction, TimelineAttribute, TimelineItem, TimelineItemType,
};
pub use transport::{BlobTransport, TcpDevLink, BLOBDB_ENDPOINT};
pub use types::{BlobDatabase, BlobDbError, BlobStatus, Result};
