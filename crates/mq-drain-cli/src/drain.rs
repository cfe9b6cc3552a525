//! Queue drain pipeline.
//!
//! One run performs connect, open, a receive loop, close and disconnect
//! against a [`QueueManagerConnector`], writing a status line per step to
//! the output sink. Connection failures end the run immediately; later
//! failures are reported but never change the exit code.

use crate::config::DrainConfig;
use mq_runtime::{
    Connection, GetOptions, MessageId, MqError, ObjectDescriptor, OpenMode, QueueHandle,
    QueueManagerConnector, Syncpoint,
};
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Default get wait interval in milliseconds
pub const DEFAULT_WAIT_INTERVAL_MS: u32 = 3000;

/// Receive behaviour for a drain run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainOptions {
    pub wait_interval_ms: u32,
    /// Fetch only the message with this id, with a single get
    pub msg_id: Option<MessageId>,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            wait_interval_ms: DEFAULT_WAIT_INTERVAL_MS,
            msg_id: None,
        }
    }
}

/// Outcome of a drain run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Process exit code: 0, or the completion code of a failed connect
    pub exit_code: i32,
    pub connected: bool,
    pub messages_received: usize,
    /// Last failure printed during the run, excluding an empty queue
    pub last_error: Option<MqError>,
}

impl DrainReport {
    fn new() -> Self {
        Self {
            exit_code: 0,
            connected: false,
            messages_received: 0,
            last_error: None,
        }
    }
}

/// Drains one queue and writes status lines to `out`
pub struct DrainClient<W: Write> {
    config: DrainConfig,
    options: DrainOptions,
    out: W,
}

impl<W: Write> DrainClient<W> {
    pub fn new(config: DrainConfig, options: DrainOptions, out: W) -> Self {
        Self {
            config,
            options,
            out,
        }
    }

    /// Consume the client and return its output sink
    pub fn into_output(self) -> W {
        self.out
    }

    /// Execute one drain run.
    ///
    /// Only failures writing to the output sink are returned as errors; MQI
    /// failures are printed and recorded in the report.
    pub async fn run(&mut self, connector: &dyn QueueManagerConnector) -> io::Result<DrainReport> {
        let mut report = DrainReport::new();
        let queue_manager = self.config.queue_manager.clone();

        info!(
            queue_manager = %queue_manager,
            queue = %self.config.queue,
            channel = %self.config.channel,
            connection_url = %self.config.connection_url,
            "Connecting to queue manager"
        );

        let connection = match connector
            .connect(&queue_manager, &self.config.connect_options())
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                writeln!(self.out, "Connection to {} failed.", queue_manager)?;
                writeln!(self.out, "{}", e)?;
                writeln!(self.out, "Done.")?;
                report.exit_code = e.exit_code();
                report.last_error = Some(e);
                return Ok(report);
            }
        };
        report.connected = true;

        let session = self.drain_session(connection.as_ref(), &mut report).await;

        if let Err(e) = connection.disconnect().await {
            warn!(queue_manager = %queue_manager, error = %e, "Disconnect failed");
        } else {
            debug!(queue_manager = %queue_manager, "Disconnected");
        }

        session?;
        writeln!(self.out, "Done.")?;

        info!(
            queue_manager = %queue_manager,
            messages = report.messages_received,
            exit_code = report.exit_code,
            "Drain finished"
        );
        Ok(report)
    }

    async fn drain_session(
        &mut self,
        connection: &dyn Connection,
        report: &mut DrainReport,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "Connection to {} succeeded.",
            connection.queue_manager_name()
        )?;

        let descriptor = ObjectDescriptor::queue(&self.config.queue);
        let mut handle = match connection.open(&descriptor, OpenMode::InputExclusive).await {
            Ok(handle) => handle,
            Err(e) => {
                writeln!(self.out, "{}", e)?;
                report.last_error = Some(e);
                return Ok(());
            }
        };
        writeln!(self.out, "Opened queue {}", handle.name())?;

        let received = self.receive_loop(handle.as_mut(), report).await;

        let queue = handle.name().to_string();
        if let Err(e) = handle.close().await {
            warn!(queue = %queue, error = %e, "Close failed");
        } else {
            debug!(queue = %queue, "Closed queue");
        }

        received
    }

    async fn receive_loop(
        &mut self,
        handle: &mut dyn QueueHandle,
        report: &mut DrainReport,
    ) -> io::Result<()> {
        let mut more = true;

        while more {
            let mut options = GetOptions::new()
                .with_syncpoint(Syncpoint::No)
                .with_wait_millis(self.options.wait_interval_ms);

            if let Some(msg_id) = self.options.msg_id {
                writeln!(self.out, "Setting Match Option for MsgId")?;
                options = options.with_match_msg_id(msg_id);
                more = false;
            }

            match handle.get(&options).await {
                Ok(message) => {
                    debug!(
                        queue = %handle.name(),
                        message_id = %message.message_id(),
                        put_time = %message.descriptor.put_time,
                        length = message.data_length(),
                        "Got message"
                    );
                    writeln!(
                        self.out,
                        "Got message of length {}: {}",
                        message.data_length(),
                        message.text().trim()
                    )?;
                    report.messages_received += 1;
                }
                Err(e) if e.is_no_message_available() => {
                    debug!(queue = %handle.name(), "Queue drained");
                    break;
                }
                Err(e) => {
                    writeln!(self.out, "{}", e)?;
                    report.last_error = Some(e);
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
