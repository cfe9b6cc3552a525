//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Longest queue and queue manager name accepted by a queue manager
pub const MAX_OBJECT_NAME_LENGTH: usize = 48;

/// Longest channel name accepted by a queue manager
pub const MAX_CHANNEL_NAME_LENGTH: usize = 20;

/// Check an MQ object name: non-empty, bounded, and drawn from the MQ name alphabet
pub fn validate_object_name(field: &str, name: &str, max_len: usize) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > max_len {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("must be 1-{} characters", max_len),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '_' | '%'))
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: "only A-Z, a-z, 0-9, '.', '/', '_' and '%' allowed".to_string(),
        });
    }

    Ok(())
}

/// 24-byte message identifier assigned by the queue manager on put
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; MessageId::LENGTH]);

impl MessageId {
    pub const LENGTH: usize = 24;

    /// All-zero identifier; matches nothing
    pub const NONE: Self = Self([0; Self::LENGTH]);

    /// Wrap the `MsgId` field of a message descriptor
    pub const fn from_array(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build an identifier from raw bytes, right-padding with zeros
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.len() > Self::LENGTH {
            return Err(ValidationError::OutOfRange {
                field: "message_id".to_string(),
                message: format!("at most {} bytes, got {}", Self::LENGTH, bytes.len()),
            });
        }

        let mut id = [0; Self::LENGTH];
        id[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(id))
    }

    /// Decode an identifier from its hexadecimal form
    pub fn from_hex(hex_str: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(hex_str).map_err(|e| ValidationError::InvalidFormat {
            field: "message_id".to_string(),
            message: e.to_string(),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Generate the identifier for the `sequence`-th message put on a queue manager.
    ///
    /// Layout follows the queue manager convention: `AMQ ` followed by the
    /// first 12 bytes of the queue manager name, then a big-endian counter.
    pub fn generate(queue_manager: &str, sequence: u64) -> Self {
        let mut id = [b' '; Self::LENGTH];
        id[..4].copy_from_slice(b"AMQ ");
        let name = queue_manager.as_bytes();
        let take = name.len().min(12);
        id[4..4 + take].copy_from_slice(&name[..take]);
        id[16..].copy_from_slice(&sequence.to_be_bytes());
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Lowercase hexadecimal form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageId({})", self.to_hex())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Put time from the message descriptor's `PutDate` (`YYYYMMDD`) and
    /// `PutTime` (`HHMMSSTH`) fields, which the queue manager records in GMT.
    ///
    /// Returns `None` when either field is blank or malformed.
    pub fn from_mqmd(put_date: &str, put_time: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(put_date.trim(), "%Y%m%d").ok()?;
        let put_time = put_time.trim();
        let hms = NaiveTime::parse_from_str(put_time.get(..6)?, "%H%M%S").ok()?;
        let hundredths: u32 = put_time
            .get(6..8)
            .and_then(|th| th.parse().ok())
            .unwrap_or(0);
        let time = hms.with_nanosecond(hundredths * 10_000_000)?;
        Some(Self(Utc.from_utc_datetime(&date.and_time(time))))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Descriptor returned alongside a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub message_id: MessageId,
    pub put_time: Timestamp,
}

/// A message removed from a queue by a get
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub descriptor: MessageDescriptor,
    pub body: Bytes,
}

impl ReceivedMessage {
    /// Number of payload bytes retrieved
    pub fn data_length(&self) -> usize {
        self.body.len()
    }

    /// Payload interpreted as text; invalid UTF-8 sequences are replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn message_id(&self) -> MessageId {
        self.descriptor.message_id
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
