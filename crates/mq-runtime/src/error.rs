//! Error types for MQI operations.
//!
//! Every failed MQI call is described by the verb that failed plus the
//! provider's two-level classification: a broad [`CompletionCode`] and a
//! specific [`ReasonCode`].

use std::fmt;
use thiserror::Error;

/// Broad outcome category of an MQI call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionCode {
    Ok,
    Warning,
    Failed,
}

impl CompletionCode {
    /// Numeric value as reported by the queue manager
    pub fn value(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Failed => 2,
        }
    }

    /// Classify a raw completion code; anything unrecognised counts as failed
    pub fn from_value(value: i32) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Warning,
            _ => Self::Failed,
        }
    }

    /// Symbolic constant name
    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "MQCC_OK",
            Self::Warning => "MQCC_WARNING",
            Self::Failed => "MQCC_FAILED",
        }
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Specific cause of an MQI outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReasonCode(i32);

impl ReasonCode {
    pub const NONE: Self = Self(0);
    pub const CONNECTION_BROKEN: Self = Self(2009);
    pub const HCONN_ERROR: Self = Self(2018);
    pub const HOBJ_ERROR: Self = Self(2019);
    pub const NO_MSG_AVAILABLE: Self = Self(2033);
    pub const OBJECT_IN_USE: Self = Self(2042);
    pub const Q_MGR_NAME_ERROR: Self = Self(2058);
    pub const Q_MGR_NOT_AVAILABLE: Self = Self(2059);
    pub const TRUNCATED_MSG_FAILED: Self = Self(2080);
    pub const UNKNOWN_OBJECT_NAME: Self = Self(2085);
    pub const OBJECT_NAME_ERROR: Self = Self(2152);
    pub const UNEXPECTED_ERROR: Self = Self(2195);
    pub const UOW_NOT_AVAILABLE: Self = Self(2255);
    pub const KEY_REPOSITORY_ERROR: Self = Self(2381);
    pub const SSL_INITIALIZATION_ERROR: Self = Self(2393);
    pub const UNSUPPORTED_CIPHER_SUITE: Self = Self(2400);
    pub const HOST_NOT_AVAILABLE: Self = Self(2538);
    pub const UNKNOWN_CHANNEL_NAME: Self = Self(2540);

    /// Wrap a raw reason code
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Numeric value as reported by the queue manager
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Symbolic constant name, if the code is one this crate knows about
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "MQRC_NONE",
            2009 => "MQRC_CONNECTION_BROKEN",
            2018 => "MQRC_HCONN_ERROR",
            2019 => "MQRC_HOBJ_ERROR",
            2033 => "MQRC_NO_MSG_AVAILABLE",
            2042 => "MQRC_OBJECT_IN_USE",
            2058 => "MQRC_Q_MGR_NAME_ERROR",
            2059 => "MQRC_Q_MGR_NOT_AVAILABLE",
            2080 => "MQRC_TRUNCATED_MSG_FAILED",
            2085 => "MQRC_UNKNOWN_OBJECT_NAME",
            2152 => "MQRC_OBJECT_NAME_ERROR",
            2195 => "MQRC_UNEXPECTED_ERROR",
            2255 => "MQRC_UOW_NOT_AVAILABLE",
            2381 => "MQRC_KEY_REPOSITORY_ERROR",
            2393 => "MQRC_SSL_INITIALIZATION_ERROR",
            2400 => "MQRC_UNSUPPORTED_CIPHER_SUITE",
            2538 => "MQRC_HOST_NOT_AVAILABLE",
            2540 => "MQRC_UNKNOWN_CHANNEL_NAME",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "MQRC_{}", self.0),
        }
    }
}

/// MQI verb that produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Connx,
    Open,
    Get,
    Close,
    Disc,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connx => "MQCONNX",
            Self::Open => "MQOPEN",
            Self::Get => "MQGET",
            Self::Close => "MQCLOSE",
            Self::Disc => "MQDISC",
        };
        f.write_str(name)
    }
}

/// Failure of an MQI call, classified by completion and reason code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{verb}: MQCC = {completion} [{cc}] MQRC = {reason} [{rc}]",
    cc = .completion.value(),
    rc = .reason.value()
)]
pub struct MqError {
    pub verb: Verb,
    pub completion: CompletionCode,
    pub reason: ReasonCode,
}

impl MqError {
    pub fn new(verb: Verb, completion: CompletionCode, reason: ReasonCode) -> Self {
        Self {
            verb,
            completion,
            reason,
        }
    }

    /// Shorthand for a call that completed with `MQCC_FAILED`
    pub fn failed(verb: Verb, reason: ReasonCode) -> Self {
        Self::new(verb, CompletionCode::Failed, reason)
    }

    /// True when a get found nothing to return within its wait interval.
    ///
    /// This is the normal end of a drain, not a fault.
    pub fn is_no_message_available(&self) -> bool {
        self.reason == ReasonCode::NO_MSG_AVAILABLE
    }

    /// Process exit code for this failure: the completion code value
    pub fn exit_code(&self) -> i32 {
        self.completion.value()
    }
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

/// Errors raised while administering an in-memory queue manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("Queue manager not defined: {name}")]
    UnknownQueueManager { name: String },

    #[error("Queue '{queue}' not defined on queue manager {queue_manager}")]
    UnknownQueue {
        queue_manager: String,
        queue: String,
    },

    #[error("Object already defined: {name}")]
    AlreadyDefined { name: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
