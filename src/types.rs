//! Common types, enums, and error definitions for BlobDB synchronization

use std::fmt;
use thiserror::Error;

/// Result type alias for BlobDB operations
pub type Result<T> = std::result::Result<T, BlobDbError>;

/// Error types for BlobDB synchronization
#[derive(Error, Debug)]
pub enum BlobDbError {
    #[error("Device link failure: {0}")]
    LinkFailure(String),

    #[error("Timed out waiting for a device response")]
    ResponseTimeout,

    #[error("Response too short: {0} bytes")]
    ResponseTooShort(usize),

    #[error("Command too short: {0} bytes")]
    CommandTooShort(usize),

    #[error("Unknown command id: {0}")]
    UnknownCommand(u8),

    #[error("Unknown blob status code: {0}")]
    UnknownStatus(u8),

    #[error("Unknown blob database id: {0}")]
    UnknownDatabase(u8),

    #[error("Truncated command payload: {0}")]
    TruncatedCommand(String),

    #[error("Formatting channel not available")]
    ChannelUnavailable,

    #[error("Formatting channel dropped the request without completing it")]
    FormattingAborted,

    #[error("Malformed record identifier: {0}")]
    MalformedIdentifier(String),

    #[error("Gave up after {0} attempts with the device still busy")]
    RetriesExhausted(u32),

    #[error("Attribute content too large: {0} bytes")]
    AttributeTooLarge(usize),

    #[error("Record value too large: {0} bytes")]
    ValueTooLarge(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logical tables in the device-side BlobDB record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlobDatabase {
    Test = 0,
    Pin = 1,
    App = 2,
    Reminder = 3,
    Notification = 4,
    Weather = 5,
    CannedResponses = 6,
    HealthParams = 7,
    Contacts = 8,
    AppConfigs = 9,
    HealthStats = 10,
}

impl BlobDatabase {
    /// Convert a byte to a BlobDatabase
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BlobDatabase::Test),
            1 => Ok(BlobDatabase::Pin),
            2 => Ok(BlobDatabase::App),
            3 => Ok(BlobDatabase::Reminder),
            4 => Ok(BlobDatabase::Notification),
            5 => Ok(BlobDatabase::Weather),
            6 => Ok(BlobDatabase::CannedResponses),
            7 => Ok(BlobDatabase::HealthParams),
            8 => Ok(BlobDatabase::Contacts),
            9 => Ok(BlobDatabase::AppConfigs),
            10 => Ok(BlobDatabase::HealthStats),
            _ => Err(BlobDbError::UnknownDatabase(value)),
        }
    }

    /// Convert BlobDatabase to its wire id
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BlobDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobDatabase::Test => write!(f, "Test"),
            BlobDatabase::Pin => write!(f, "Pin"),
            BlobDatabase::App => write!(f, "App"),
            BlobDatabase::Reminder => write!(f, "Reminder"),
            BlobDatabase::Notification => write!(f, "Notification"),
            BlobDatabase::Weather => write!(f, "Weather"),
            BlobDatabase::CannedResponses => write!(f, "CannedResponses"),
            BlobDatabase::HealthParams => write!(f, "HealthParams"),
            BlobDatabase::Contacts => write!(f, "Contacts"),
            BlobDatabase::AppConfigs => write!(f, "AppConfigs"),
            BlobDatabase::HealthStats => write!(f, "HealthStats"),
        }
    }
}

/// Status codes carried in a BlobDB response
///
/// TryLater is the device's backpressure signal and the only status that
/// triggers a resend; every other status settles the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlobStatus {
    Success = 0x01,
    GeneralFailure = 0x02,
    InvalidOperation = 0x03,
    InvalidDatabaseId = 0x04,
    InvalidData = 0x05,
    KeyDoesNotExist = 0x06,
    DatabaseFull = 0x07,
    DataStale = 0x08,
    NotSupported = 0x09,
    Locked = 0x0A,
    TryLater = 0x0B,
}

impl BlobStatus {
    /// Convert a byte to a BlobStatus
    pub fn from_u8(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(BlobStatus::Success),
            0x02 => Ok(BlobStatus::GeneralFailure),
            0x03 => Ok(BlobStatus::InvalidOperation),
            0x04 => Ok(BlobStatus::InvalidDatabaseId),
            0x05 => Ok(BlobStatus::InvalidData),
            0x06 => Ok(BlobStatus::KeyDoesNotExist),
            0x07 => Ok(BlobStatus::DatabaseFull),
            0x08 => Ok(BlobStatus::DataStale),
            0x09 => Ok(BlobStatus::NotSupported),
            0x0A => Ok(BlobStatus::Locked),
            0x0B => Ok(BlobStatus::TryLater),
            _ => Err(BlobDbError::UnknownStatus(code)),
        }
    }

    /// Get the wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this status means the device asked us to resend later
    pub fn is_try_later(self) -> bool {
        self == BlobStatus::TryLater
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlobStatus::Success => "SUCCESS",
            BlobStatus::GeneralFailure => "GENERAL_FAILURE",
            BlobStatus::InvalidOperation => "INVALID_OPERATION",
            BlobStatus::InvalidDatabaseId => "INVALID_DATABASE_ID",
            BlobStatus::InvalidData => "INVALID_DATA",
            BlobStatus::KeyDoesNotExist => "KEY_DOES_NOT_EXIST",
            BlobStatus::DatabaseFull => "DATABASE_FULL",
            BlobStatus::DataStale => "DATA_STALE",
            BlobStatus::NotSupported => "NOT_SUPPORTED",
            BlobStatus::Locked => "LOCKED",
            BlobStatus::TryLater => "TRY_LATER",
        }
    }
}

impl fmt::Display for BlobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
