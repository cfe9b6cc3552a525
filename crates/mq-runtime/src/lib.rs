//! # MQ Runtime
//!
//! Provider-agnostic message queue interface (MQI) for clients that connect to
//! a queue manager over a client channel and consume messages from its queues.
//!
//! This library provides:
//! - Typed completion/reason codes and a structured [`MqError`]
//! - Object, connect and get descriptors mirroring the MQI verbs
//! - Connector, connection and queue-handle traits that providers implement
//! - An in-memory queue manager provider for tests and local runs
//! - With the `mqi` feature, a provider over the native IBM MQ client
//!
//! ## Module Organization
//!
//! - [`error`] - Completion codes, reason codes and error types
//! - [`message`] - Message identifiers and received message structures
//! - [`options`] - Connect, open and get options
//! - [`client`] - Traits implemented by queue manager providers
//! - [`providers`] - Concrete provider implementations

// Module declarations
pub mod client;
pub mod error;
pub mod message;
pub mod options;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::{Connection, QueueHandle, QueueManagerConnector};
pub use error::{AdminError, CompletionCode, MqError, ReasonCode, ValidationError, Verb};
pub use message::{MessageDescriptor, MessageId, ReceivedMessage, Timestamp};
pub use options::{
    Binding, ChannelDefinition, ClientAuth, ConnectOptions, GetOptions, MatchOptions,
    ObjectDescriptor, OpenMode, Syncpoint, TlsConfig, WaitInterval, DEFAULT_CIPHER_SPEC,
};
pub use providers::{InMemoryConnector, ProviderStats, ServerChannel};

#[cfg(feature = "mqi")]
pub use providers::IbmMqConnector;
