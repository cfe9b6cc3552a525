//! Traits implemented by queue manager providers.
//!
//! A provider hands out a [`Connection`] per successful connect and a
//! [`QueueHandle`] per successful open. Both are released by consuming
//! methods, so a handle cannot be closed twice or used after release.

use crate::error::MqError;
use crate::message::ReceivedMessage;
use crate::options::{ConnectOptions, GetOptions, ObjectDescriptor, OpenMode};
use async_trait::async_trait;

/// Entry point of a provider: establishes sessions with queue managers
#[async_trait]
pub trait QueueManagerConnector: Send + Sync {
    /// Connect to the named queue manager (MQCONNX)
    async fn connect(
        &self,
        queue_manager: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>, MqError>;
}

/// An established session with a queue manager
#[async_trait]
pub trait Connection: Send + Sync {
    /// Name of the queue manager this session is attached to
    fn queue_manager_name(&self) -> &str;

    /// Open a queue (MQOPEN)
    async fn open(
        &self,
        descriptor: &ObjectDescriptor,
        mode: OpenMode,
    ) -> Result<Box<dyn QueueHandle>, MqError>;

    /// End the session (MQDISC); handles still open are closed by the provider
    async fn disconnect(self: Box<Self>) -> Result<(), MqError>;
}

/// An opened queue
#[async_trait]
pub trait QueueHandle: Send + Sync {
    /// Resolved queue name
    fn name(&self) -> &str;

    /// Remove the next suitable message (MQGET), waiting as the options allow
    async fn get(&mut self, options: &GetOptions) -> Result<ReceivedMessage, MqError>;

    /// Close the queue (MQCLOSE) with no close options
    async fn close(self: Box<Self>) -> Result<(), MqError>;
}
