//! Embedded queue manager used by the `mq-drain` binary.
//!
//! The queue manager, server channel and queue are defined from the same
//! configuration the client connects with, so a run succeeds or fails on the
//! values supplied. Definitions that are rejected are skipped; the client then
//! reports the resulting MQI failure.

use crate::config::DrainConfig;
use mq_runtime::{InMemoryConnector, ServerChannel};
use tracing::{debug, warn};

/// Build an in-memory connector matching `config`, preloaded with `seeds`
pub fn connector_for(config: &DrainConfig, seeds: &[String]) -> InMemoryConnector {
    let connector = InMemoryConnector::new();

    if let Err(e) = connector.define_queue_manager(&config.queue_manager, &config.connection_url) {
        warn!(queue_manager = %config.queue_manager, error = %e, "Queue manager not defined");
        return connector;
    }

    if let Err(e) = connector.define_channel(&config.queue_manager, ServerChannel::new(&config.channel)) {
        warn!(channel = %config.channel, error = %e, "Server channel not defined");
    }

    if let Err(e) = connector.define_queue(&config.queue_manager, &config.queue) {
        warn!(queue = %config.queue, error = %e, "Queue not defined");
        return connector;
    }

    for body in seeds {
        match connector.put_message(&config.queue_manager, &config.queue, body.clone()) {
            Ok(message_id) => {
                debug!(queue = %config.queue, message_id = %message_id, "Seeded message")
            }
            Err(e) => warn!(queue = %config.queue, error = %e, "Seed message rejected"),
        }
    }

    connector
}

/// Seed messages from a file: one message per non-empty line
pub fn read_seed_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "embedded_tests.rs"]
mod tests;
