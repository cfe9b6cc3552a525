//! Queue manager provider implementations.
//!
//! This module contains concrete implementations of the `QueueManagerConnector`,
//! `Connection` and `QueueHandle` traits.

#[cfg(feature = "mqi")]
pub mod ibmmq;
pub mod memory;

#[cfg(feature = "mqi")]
pub use ibmmq::{IbmMqConnection, IbmMqConnector, IbmMqQueueHandle};

pub use memory::{
    InMemoryConnection, InMemoryConnector, InMemoryQueueHandle, ProviderStats, ServerChannel,
};
