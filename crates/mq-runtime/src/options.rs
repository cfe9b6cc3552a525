//! Connect, open and get options.

use crate::message::MessageId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cipher specification used on TLS client channels unless overridden
pub const DEFAULT_CIPHER_SPEC: &str = "TLS_RSA_WITH_AES_128_CBC_SHA256";

// ============================================================================
// Connect Options
// ============================================================================

/// How the application attaches to the queue manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    /// Over a network client channel
    #[default]
    Client,
    /// Through shared memory on the queue manager's host
    Local,
}

/// Whether the TLS handshake requires a client certificate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientAuth {
    /// A certificate is validated if the client presents one
    #[default]
    Optional,
    /// The handshake fails unless the client presents a certificate
    Required,
}

/// Client-side definition of the channel used to reach a queue manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDefinition {
    pub channel_name: String,
    /// Listener address, usually `host(port)` or `host:port`
    pub connection_name: String,
    pub cipher_spec: String,
    pub client_auth: ClientAuth,
}

impl ChannelDefinition {
    /// Create a channel definition with the default cipher spec and optional client auth
    pub fn new(channel_name: impl Into<String>, connection_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            connection_name: connection_name.into(),
            cipher_spec: DEFAULT_CIPHER_SPEC.to_string(),
            client_auth: ClientAuth::Optional,
        }
    }

    /// Set cipher specification
    pub fn with_cipher_spec(mut self, cipher_spec: impl Into<String>) -> Self {
        self.cipher_spec = cipher_spec.into();
        self
    }

    /// Set client certificate requirement
    pub fn with_client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }
}

/// TLS settings for a client connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path stem of the key repository holding trusted and personal certificates
    pub key_repository: String,
}

impl TlsConfig {
    pub fn new(key_repository: impl Into<String>) -> Self {
        Self {
            key_repository: key_repository.into(),
        }
    }
}

/// Everything needed to establish a session with a queue manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub binding: Binding,
    pub client_connection: ChannelDefinition,
    pub tls: TlsConfig,
}

impl ConnectOptions {
    /// Client-binding connection over a TLS channel
    pub fn client(client_connection: ChannelDefinition, tls: TlsConfig) -> Self {
        Self {
            binding: Binding::Client,
            client_connection,
            tls,
        }
    }
}

// ============================================================================
// Open Options
// ============================================================================

/// Identifies the queue to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub object_name: String,
}

impl ObjectDescriptor {
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            object_name: name.into(),
        }
    }
}

/// Access requested when opening a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Only this handle may get messages while it is open
    InputExclusive,
    /// Any number of handles may get messages concurrently
    InputShared,
}

// ============================================================================
// Get Options
// ============================================================================

/// Whether a get participates in a unit of work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Syncpoint {
    /// Message is removed immediately and cannot be rolled back
    #[default]
    No,
    /// Message is removed under a unit of work
    Yes,
}

/// How long a get waits for a suitable message to arrive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitInterval {
    #[default]
    NoWait,
    Millis(u32),
}

impl WaitInterval {
    pub fn as_duration(&self) -> Duration {
        match self {
            Self::NoWait => Duration::ZERO,
            Self::Millis(ms) => Duration::from_millis(u64::from(*ms)),
        }
    }

    /// Interval in milliseconds as carried in the get-message options
    pub fn as_millis(&self) -> u32 {
        match self {
            Self::NoWait => 0,
            Self::Millis(ms) => *ms,
        }
    }
}

/// Which message a get is allowed to return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchOptions {
    /// Next message in queue order
    #[default]
    None,
    /// First message carrying this identifier
    MsgId(MessageId),
}

impl MatchOptions {
    pub fn matches(&self, message_id: &MessageId) -> bool {
        match self {
            Self::None => true,
            Self::MsgId(id) => id == message_id,
        }
    }
}

/// Options controlling a single get
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub syncpoint: Syncpoint,
    pub wait: WaitInterval,
    pub match_options: MatchOptions,
}

impl GetOptions {
    /// Create new get options with defaults (no syncpoint, no wait, no match)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set unit-of-work participation
    pub fn with_syncpoint(mut self, syncpoint: Syncpoint) -> Self {
        self.syncpoint = syncpoint;
        self
    }

    /// Wait up to `ms` milliseconds for a message
    pub fn with_wait_millis(mut self, ms: u32) -> Self {
        self.wait = WaitInterval::Millis(ms);
        self
    }

    /// Only return the message carrying this identifier
    pub fn with_match_msg_id(mut self, message_id: MessageId) -> Self {
        self.match_options = MatchOptions::MsgId(message_id);
        self
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
