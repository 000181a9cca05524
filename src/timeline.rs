//! Timeline record types and device serialization
//!
//! A timeline record is the device-ready form of a notification (or other
//! timeline entry): identity, timing, layout selector, and ordered typed
//! attributes and actions. The external formatting layer delivers records as
//! structured descriptions ([`TimelineAttribute`] / [`TimelineAction`], which
//! also travel as JSON on that channel); this module encodes them into the
//! byte layout the device expects. Multi-byte fields are little-endian, and
//! record identifiers are written as their raw 16 UUID bytes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timeline item flag bits
pub mod flags {
    pub const IS_VISIBLE: u16 = 1 << 0;
    pub const IS_FLOATING: u16 = 1 << 1;
    pub const IS_ALL_DAY: u16 = 1 << 2;
    pub const FROM_WATCH: u16 = 1 << 3;
    pub const FROM_ANCS: u16 = 1 << 4;
    pub const PERSISTENT: u16 = 1 << 5;
}

/// Kind of timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimelineItemType {
    Notification = 1,
    Pin = 2,
    Reminder = 3,
}

/// Action types understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionType {
    AncsDismiss = 0x01,
    Generic = 0x02,
    Response = 0x03,
    Dismiss = 0x04,
    Http = 0x05,
    Snooze = 0x06,
    OpenWatchapp = 0x07,
    Empty = 0x08,
    Remove = 0x09,
    OpenPin = 0x0A,
}

/// Structured attribute description, as delivered by the formatting layer
///
/// Exactly one of the content fields is expected to be set; the precedence
/// when several are present is string, string list, u32, u8.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineAttribute {
    pub id: u8,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub list_of_string: Option<Vec<String>>,
    #[serde(default)]
    pub uint32: Option<u32>,
    #[serde(default)]
    pub uint8: Option<u8>,
    #[serde(default)]
    pub max_length: usize,
}

impl TimelineAttribute {
    /// A plain string attribute
    pub fn string(id: u8, value: impl Into<String>) -> Self {
        TimelineAttribute {
            id,
            string: Some(value.into()),
            ..Default::default()
        }
    }

    /// A u32 attribute
    pub fn uint32(id: u8, value: u32) -> Self {
        TimelineAttribute {
            id,
            uint32: Some(value),
            ..Default::default()
        }
    }

    /// A u8 attribute
    pub fn uint8(id: u8, value: u8) -> Self {
        TimelineAttribute {
            id,
            uint8: Some(value),
            ..Default::default()
        }
    }

    /// Encode the attribute content bytes
    ///
    /// Strings are UTF-8, truncated to `max_length` bytes when a limit is
    /// set (on a character boundary); string lists are joined with a NUL
    /// separator; integers are little-endian.
    pub fn content(&self) -> Vec<u8> {
        if let Some(string) = &self.string {
            let mut value = string.clone();
            if self.max_length > 0 {
                while value.len() > self.max_length {
                    value.pop();
                }
            }
            return value.into_bytes();
        }
        if let Some(list) = &self.list_of_string {
            return list.join("\0").into_bytes();
        }
        if let Some(value) = self.uint32 {
            return value.to_le_bytes().to_vec();
        }
        if let Some(value) = self.uint8 {
            return vec![value];
        }
        Vec::new()
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        let content = self.content();
        out.push(self.id);
        out.extend_from_slice(&(content.len() as u16).to_le_bytes());
        out.extend_from_slice(&content);
    }

    fn encoded_len(&self) -> usize {
        3 + self.content().len()
    }
}

/// Structured action description, as delivered by the formatting layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineAction {
    pub action_id: u8,
    pub action_type: ActionType,
    #[serde(default)]
    pub attributes: Vec<TimelineAttribute>,
}

impl TimelineAction {
    /// A dismiss action with a title attribute
    pub fn dismiss(action_id: u8, title: impl Into<String>) -> Self {
        TimelineAction {
            action_id,
            action_type: ActionType::Dismiss,
            attributes: vec![TimelineAttribute::string(attribute_id::TITLE, title)],
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.action_id);
        out.push(self.action_type as u8);
        out.push(self.attributes.len() as u8);
        for attribute in &self.attributes {
            attribute.encode_into(out);
        }
    }

    fn encoded_len(&self) -> usize {
        3 + self
            .attributes
            .iter()
            .map(TimelineAttribute::encoded_len)
            .sum::<usize>()
    }
}

/// Well-known attribute ids used for notification records
pub mod attribute_id {
    pub const TITLE: u8 = 0x01;
    pub const SUBTITLE: u8 = 0x02;
    pub const BODY: u8 = 0x03;
    pub const TINY_ICON: u8 = 0x04;
    pub const BACKGROUND_COLOR: u8 = 0x1C;
}

/// A complete, device-ready timeline record
///
/// Built once per insert and immutable afterwards; the insert operation owns
/// it until the encoded value is handed to the command codec.
#[derive(Debug, Clone)]
pub struct TimelineItem {
    pub item_id: Uuid,
    pub parent_id: Uuid,
    pub timestamp: u32,
    pub duration: u16,
    pub item_type: TimelineItemType,
    pub flags: u16,
    pub layout: u8,
    pub attributes: Vec<TimelineAttribute>,
    pub actions: Vec<TimelineAction>,
}

impl TimelineItem {
    /// The raw key bytes this record is stored under
    pub fn key(&self) -> [u8; 16] {
        *self.item_id.as_bytes()
    }

    /// Serialize the record into its device byte layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len: usize = self
            .attributes
            .iter()
            .map(TimelineAttribute::encoded_len)
            .sum::<usize>()
            + self
                .actions
                .iter()
                .map(TimelineAction::encoded_len)
                .sum::<usize>();

        let mut out = Vec::with_capacity(42 + payload_len);
        out.extend_from_slice(self.item_id.as_bytes());
        out.extend_from_slice(self.parent_id.as_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.duration.to_le_bytes());
        out.push(self.item_type as u8);
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.push(self.layout);
        out.extend_from_slice(&(payload_len as u16).to_le_bytes());
        out.push(self.attributes.len() as u8);
        out.push(self.actions.len() as u8);

        for attribute in &self.attributes {
            attribute.encode_into(&mut out);
        }
        for action in &self.actions {
            action.encode_into(&mut out);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> TimelineItem {
        TimelineItem {
            item_id: Uuid::from_bytes([0x11; 16]),
            parent_id: Uuid::from_bytes([0x22; 16]),
            timestamp: 0x0102_0304,
            duration: 0x0506,
            item_type: TimelineItemType::Notification,
            flags: 0,
            layout: 1,
            attributes: vec![TimelineAttribute::string(attribute_id::TITLE, "hi")],
            actions: vec![TimelineAction::dismiss(0, "Dismiss")],
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_item().to_bytes();

        assert_eq!(&bytes[0..16], &[0x11; 16]);
        assert_eq!(&bytes[16..32], &[0x22; 16]);
        // timestamp little-endian
        assert_eq!(&bytes[32..36], &[0x04, 0x03, 0x02, 0x01]);
        // duration little-endian
        assert_eq!(&bytes[36..38], &[0x06, 0x05]);
        assert_eq!(bytes[38], 1); // notification type
        assert_eq!(&bytes[39..41], &[0x00, 0x00]); // flags
        assert_eq!(bytes[41], 1); // layout
        assert_eq!(bytes[44], 1); // attribute count
        assert_eq!(bytes[45], 1); // action count
    }

    #[test]
    fn test_payload_size_matches_encoded_payload() {
        let bytes = sample_item().to_bytes();
        let payload_len = u16::from_le_bytes([bytes[42], bytes[43]]) as usize;
        // header is 46 bytes: ids + timing + type + flags + layout +
        // payload size + counts
        assert_eq!(bytes.len(), 46 + payload_len);
    }

    #[test]
    fn test_string_attribute_content() {
        let attribute = TimelineAttribute::string(attribute_id::BODY, "hello");
        assert_eq!(attribute.content(), b"hello".to_vec());
    }

    #[test]
    fn test_string_attribute_truncation() {
        let mut attribute = TimelineAttribute::string(attribute_id::BODY, "hello world");
        attribute.max_length = 5;
        assert_eq!(attribute.content(), b"hello".to_vec());
    }

    #[test]
    fn test_list_attribute_nul_joined() {
        let attribute = TimelineAttribute {
            id: 0x08,
            list_of_string: Some(vec!["Yes".to_string(), "No".to_string()]),
            ..Default::default()
        };
        assert_eq!(attribute.content(), b"Yes\0No".to_vec());
    }

    #[test]
    fn test_uint32_attribute_little_endian() {
        let attribute = TimelineAttribute::uint32(attribute_id::BACKGROUND_COLOR, 0x00AA_BBCC);
        assert_eq!(attribute.content(), vec![0xCC, 0xBB, 0xAA, 0x00]);
    }

    #[test]
    fn test_attribute_wire_framing() {
        let attribute = TimelineAttribute::string(attribute_id::TITLE, "ab");
        let mut out = Vec::new();
        attribute.encode_into(&mut out);
        assert_eq!(out, vec![0x01, 0x02, 0x00, b'a', b'b']);
    }

    #[test]
    fn test_action_wire_framing() {
        let action = TimelineAction::dismiss(3, "Dismiss");
        let mut out = Vec::new();
        action.encode_into(&mut out);
        assert_eq!(out[0], 3); // action id
        assert_eq!(out[1], ActionType::Dismiss as u8);
        assert_eq!(out[2], 1); // one attribute
        assert_eq!(out.len(), action.encoded_len());
    }

    #[test]
    fn test_attribute_json_shape() {
        // The formatting channel ships attributes as camelCase JSON
        let parsed: TimelineAttribute = serde_json::from_str(
            r#"{"id": 3, "string": "body text", "maxLength": 64}"#,
        )
        .unwrap();
        assert_eq!(parsed.id, 3);
        assert_eq!(parsed.string.as_deref(), Some("body text"));
        assert_eq!(parsed.max_length, 64);
    }
}
