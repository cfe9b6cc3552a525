//! Common test utilities for mq-drain scenario tests
//!
//! This module provides:
//! - A queue manager fixture matching the default drain configuration
//! - A helper that runs one drain and captures its output lines

use bytes::Bytes;
use mq_drain_cli::{DrainClient, DrainConfig, DrainOptions, DrainReport};
use mq_runtime::{InMemoryConnector, MessageId, QueueManagerConnector, ServerChannel};

pub const QM: &str = "QM1";
pub const QUEUE: &str = "TEST.Q";
pub const CHANNEL: &str = "DEV.APP.SVRCONN";
pub const LISTENER: &str = "localhost(1414)";

/// Configuration a client would read for QM1 / TEST.Q
pub fn drain_config() -> DrainConfig {
    DrainConfig {
        queue_manager: QM.to_string(),
        queue: QUEUE.to_string(),
        channel: CHANNEL.to_string(),
        connection_url: LISTENER.to_string(),
        key_path: "/var/mqm/ssl/key".to_string(),
    }
}

/// Running QM1 with a TLS server channel and an empty TEST.Q
pub fn queue_manager() -> InMemoryConnector {
    let connector = InMemoryConnector::new();
    connector
        .define_queue_manager(QM, LISTENER)
        .expect("Setup: define queue manager");
    connector
        .define_channel(QM, ServerChannel::new(CHANNEL))
        .expect("Setup: define channel");
    connector
        .define_queue(QM, QUEUE)
        .expect("Setup: define queue");
    connector
}

/// Put each body on TEST.Q, returning the assigned message ids
pub fn put_all<B>(connector: &InMemoryConnector, bodies: impl IntoIterator<Item = B>) -> Vec<MessageId>
where
    B: Into<Bytes>,
{
    bodies
        .into_iter()
        .map(|body| {
            connector
                .put_message(QM, QUEUE, body)
                .expect("Setup: put message")
        })
        .collect()
}

/// Captured result of one drain run
pub struct DrainOutcome {
    pub report: DrainReport,
    pub lines: Vec<String>,
}

#[allow(dead_code)]
impl DrainOutcome {
    pub fn count_lines_starting_with(&self, prefix: &str) -> usize {
        self.lines.iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

/// Run one drain against `connector` and capture stdout lines
pub async fn run_drain(
    connector: &dyn QueueManagerConnector,
    config: DrainConfig,
    options: DrainOptions,
) -> DrainOutcome {
    let mut client = DrainClient::new(config, options, Vec::new());
    let report = client
        .run(connector)
        .await
        .expect("Writing to an in-memory buffer cannot fail");
    let output = String::from_utf8(client.into_output()).expect("Output is UTF-8");

    DrainOutcome {
        report,
        lines: output.lines().map(str::to_string).collect(),
    }
}
