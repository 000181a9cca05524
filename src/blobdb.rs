//! BlobDB command and response codec
//!
//! This module builds Insert/Delete command payloads for the device-side
//! BlobDB record store and decodes the response status. The wire layout is a
//! fixed device contract: a one-byte command id, a 16-bit correlation token,
//! the database id, then a length-prefixed key and (for Insert) a
//! length-prefixed value. Multi-byte fields are little-endian.

use crate::token::next_token;
use crate::types::{BlobDatabase, BlobDbError, BlobStatus, Result};

const COMMAND_INSERT: u8 = 0x01;
const COMMAND_DELETE: u8 = 0x04;

/// A single BlobDB command addressed to one database
///
/// The token is drawn at construction time and replaced via [`BlobCommand::rebind`]
/// on every retry; a command value is never mutated in place once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCommand {
    Insert {
        token: u16,
        database: BlobDatabase,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        token: u16,
        database: BlobDatabase,
        key: Vec<u8>,
    },
}

impl BlobCommand {
    /// Build an Insert command with a freshly drawn token
    pub fn insert(database: BlobDatabase, key: Vec<u8>, value: Vec<u8>) -> Self {
        BlobCommand::Insert {
            token: next_token(),
            database,
            key,
            value,
        }
    }

    /// Build a Delete command with a freshly drawn token
    pub fn delete(database: BlobDatabase, key: Vec<u8>) -> Self {
        BlobCommand::Delete {
            token: next_token(),
            database,
            key,
        }
    }

    /// The token currently bound to this command
    pub fn token(&self) -> u16 {
        match self {
            BlobCommand::Insert { token, .. } => *token,
            BlobCommand::Delete { token, .. } => *token,
        }
    }

    /// The database this command targets
    pub fn database(&self) -> BlobDatabase {
        match self {
            BlobCommand::Insert { database, .. } => *database,
            BlobCommand::Delete { database, .. } => *database,
        }
    }

    /// The record key this command addresses
    pub fn key(&self) -> &[u8] {
        match self {
            BlobCommand::Insert { key, .. } => key,
            BlobCommand::Delete { key, .. } => key,
        }
    }

    /// Return an equivalent command bound to a new token
    ///
    /// Used by the retry driver: each resend is a logically new command value
    /// carrying a token distinct from the previous attempt.
    pub fn rebind(self, new_token: u16) -> Self {
        match self {
            BlobCommand::Insert {
                database,
                key,
                value,
                ..
            } => BlobCommand::Insert {
                token: new_token,
                database,
                key,
                value,
            },
            BlobCommand::Delete { database, key, .. } => BlobCommand::Delete {
                token: new_token,
                database,
                key,
            },
        }
    }

    /// Encode the command into its wire payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            BlobCommand::Insert {
                token,
                database,
                key,
                value,
            } => {
                if key.len() > u8::MAX as usize {
                    return Err(BlobDbError::ValueTooLarge(key.len()));
                }
                if value.len() > u16::MAX as usize {
                    return Err(BlobDbError::ValueTooLarge(value.len()));
                }

                let mut payload = Vec::with_capacity(7 + key.len() + value.len());
                payload.push(COMMAND_INSERT);
                payload.extend_from_slice(&token.to_le_bytes());
                payload.push(database.to_u8());
                payload.push(key.len() as u8);
                payload.extend_from_slice(key);
                payload.extend_from_slice(&(value.len() as u16).to_le_bytes());
                payload.extend_from_slice(value);
                Ok(payload)
            }
            BlobCommand::Delete {
                token,
                database,
                key,
            } => {
                if key.len() > u8::MAX as usize {
                    return Err(BlobDbError::ValueTooLarge(key.len()));
                }

                let mut payload = Vec::with_capacity(5 + key.len());
                payload.push(COMMAND_DELETE);
                payload.extend_from_slice(&token.to_le_bytes());
                payload.push(database.to_u8());
                payload.push(key.len() as u8);
                payload.extend_from_slice(key);
                Ok(payload)
            }
        }
    }

    /// Decode a command from its wire payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(BlobDbError::CommandTooShort(data.len()));
        }

        let command_id = data[0];
        let token = u16::from_le_bytes([data[1], data[2]]);
        let database = BlobDatabase::from_u8(data[3])?;
        let key_len = data[4] as usize;
        let mut offset = 5;

        if data.len() < offset + key_len {
            return Err(BlobDbError::TruncatedCommand(format!(
                "key needs {} bytes, {} remain",
                key_len,
                data.len() - offset
            )));
        }
        let key = data[offset..offset + key_len].to_vec();
        offset += key_len;

        match command_id {
            COMMAND_INSERT => {
                if data.len() < offset + 2 {
                    return Err(BlobDbError::TruncatedCommand(
                        "missing value length".to_string(),
                    ));
                }
                let value_len = u16::from_le_bytes([data[offset], data[offset + 1]]) as usize;
                offset += 2;

                if data.len() < offset + value_len {
                    return Err(BlobDbError::TruncatedCommand(format!(
                        "value needs {} bytes, {} remain",
                        value_len,
                        data.len() - offset
                    )));
                }
                let value = data[offset..offset + value_len].to_vec();

                Ok(BlobCommand::Insert {
                    token,
                    database,
                    key,
                    value,
                })
            }
            COMMAND_DELETE => Ok(BlobCommand::Delete {
                token,
                database,
                key,
            }),
            other => Err(BlobDbError::UnknownCommand(other)),
        }
    }
}

/// A decoded BlobDB response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobResponse {
    pub token: u16,
    pub status: BlobStatus,
}

impl BlobResponse {
    /// Decode a response from its wire payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(BlobDbError::ResponseTooShort(data.len()));
        }

        Ok(BlobResponse {
            token: u16::from_le_bytes([data[0], data[1]]),
            status: BlobStatus::from_u8(data[2])?,
        })
    }

    /// Encode the response into its wire payload
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(3);
        payload.extend_from_slice(&self.token.to_le_bytes());
        payload.push(self.status.code());
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_round_trip() {
        let key = vec![0xAA; 16];
        let value = vec![0x01, 0x02, 0x03, 0x04];
        let command = BlobCommand::insert(BlobDatabase::Notification, key.clone(), value.clone());

        let decoded = BlobCommand::decode(&command.encode().unwrap()).unwrap();
        assert_eq!(decoded.database(), BlobDatabase::Notification);
        assert_eq!(decoded.key(), key.as_slice());
        assert_eq!(decoded.token(), command.token());
        match decoded {
            BlobCommand::Insert { value: v, .. } => assert_eq!(v, value),
            _ => panic!("decoded to wrong variant"),
        }
    }

    #[test]
    fn test_delete_round_trip() {
        let key = vec![0x42; 16];
        let command = BlobCommand::delete(BlobDatabase::Notification, key.clone());

        let decoded = BlobCommand::decode(&command.encode().unwrap()).unwrap();
        assert_eq!(decoded.database(), BlobDatabase::Notification);
        assert_eq!(decoded.key(), key.as_slice());
        assert!(matches!(decoded, BlobCommand::Delete { .. }));
    }

    #[test]
    fn test_insert_wire_layout() {
        let command = BlobCommand::Insert {
            token: 0x1234,
            database: BlobDatabase::Notification,
            key: vec![],
            value: vec![],
        };
        let payload = command.encode().unwrap();
        assert_eq!(payload[0], 0x01); // insert command id
        assert_eq!(payload[1], 0x34); // token low byte first
        assert_eq!(payload[2], 0x12);
        assert_eq!(payload[3], 4); // notification database
        assert_eq!(payload[4], 0); // key length
    }

    #[test]
    fn test_rebind_replaces_only_token() {
        let command = BlobCommand::insert(BlobDatabase::Pin, vec![1, 2, 3], vec![4, 5]);
        let database = command.database();
        let key = command.key().to_vec();

        let rebound = command.rebind(0xBEEF);
        assert_eq!(rebound.token(), 0xBEEF);
        assert_eq!(rebound.database(), database);
        assert_eq!(rebound.key(), key.as_slice());
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        assert!(matches!(
            BlobCommand::decode(&[0x01, 0x00]),
            Err(BlobDbError::CommandTooShort(2))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_key() {
        // Claims a 16-byte key but carries none
        let payload = vec![0x04, 0x00, 0x00, 0x04, 0x10];
        assert!(matches!(
            BlobCommand::decode(&payload),
            Err(BlobDbError::TruncatedCommand(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_command() {
        let payload = vec![0x09, 0x00, 0x00, 0x04, 0x00];
        assert!(matches!(
            BlobCommand::decode(&payload),
            Err(BlobDbError::UnknownCommand(0x09))
        ));
    }

    #[test]
    fn test_response_round_trip() {
        let response = BlobResponse {
            token: 0xCAFE,
            status: BlobStatus::TryLater,
        };
        assert_eq!(BlobResponse::decode(&response.encode()).unwrap(), response);
    }

    #[test]
    fn test_response_rejects_unknown_status() {
        assert!(matches!(
            BlobResponse::decode(&[0x00, 0x00, 0x7F]),
            Err(BlobDbError::UnknownStatus(0x7F))
        ));
    }
}
