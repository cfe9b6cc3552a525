//! In-memory queue manager provider for testing and local runs.
//!
//! This module provides a queue manager that lives inside the process and
//! follows the MQI rules a drain client depends on:
//! - Connect checks the queue manager, listener, channel and TLS settings
//! - Exclusive-input opens lock out every other input handle
//! - Gets are FIFO, optionally matched by message id, and can wait for a
//!   message to be put
//! - Stopping a queue manager breaks every connection to it
//!
//! Failures carry the same completion and reason codes a real queue manager
//! would report, so callers can branch on them without knowing the provider.

use crate::client::{Connection, QueueHandle, QueueManagerConnector};
use crate::error::{AdminError, MqError, ReasonCode, Verb};
use crate::message::{
    validate_object_name, MessageDescriptor, MessageId, ReceivedMessage, Timestamp,
    MAX_CHANNEL_NAME_LENGTH, MAX_OBJECT_NAME_LENGTH,
};
use crate::options::{
    Binding, ClientAuth, ConnectOptions, GetOptions, MatchOptions, ObjectDescriptor, OpenMode,
    Syncpoint, DEFAULT_CIPHER_SPEC,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Shared state behind every connector, connection and handle clone
struct ProviderStorage {
    queue_managers: HashMap<String, InMemoryQueueManager>,
    stats: ProviderStats,
    next_object_handle: u64,
}

impl ProviderStorage {
    fn new() -> Self {
        Self {
            queue_managers: HashMap::new(),
            stats: ProviderStats::default(),
            next_object_handle: 0,
        }
    }

    fn queue_manager_mut(&mut self, name: &str) -> Result<&mut InMemoryQueueManager, AdminError> {
        self.queue_managers
            .get_mut(name)
            .ok_or_else(|| AdminError::UnknownQueueManager {
                name: name.to_string(),
            })
    }
}

struct InMemoryQueueManager {
    name: String,
    listener: String,
    running: bool,
    channels: HashMap<String, ServerChannel>,
    queues: HashMap<String, InMemoryQueue>,
    /// Live connection tags
    connections: HashSet<Uuid>,
    /// Last sequence number used for a generated message id
    next_sequence: u64,
}

impl InMemoryQueueManager {
    fn new(name: &str, listener: &str) -> Self {
        Self {
            name: name.to_string(),
            listener: listener.to_string(),
            running: true,
            channels: HashMap::new(),
            queues: HashMap::new(),
            connections: HashSet::new(),
            next_sequence: 0,
        }
    }
}

struct InMemoryQueue {
    /// Messages in put order
    messages: VecDeque<StoredMessage>,
    /// Open handles keyed by object handle number
    open_handles: HashMap<u64, OpenHandle>,
    /// Signalled on every put and when the queue manager stops
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            open_handles: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Whether an open in `mode` clashes with handles already open
    fn conflicts_with(&self, mode: OpenMode) -> bool {
        match mode {
            OpenMode::InputExclusive => !self.open_handles.is_empty(),
            OpenMode::InputShared => self
                .open_handles
                .values()
                .any(|handle| handle.mode == OpenMode::InputExclusive),
        }
    }

    /// Remove the first message the match options accept
    fn take_matching(&mut self, match_options: &MatchOptions) -> Option<StoredMessage> {
        let position = self
            .messages
            .iter()
            .position(|message| match_options.matches(&message.message_id))?;
        self.messages.remove(position)
    }
}

struct OpenHandle {
    connection_id: Uuid,
    mode: OpenMode,
}

struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    put_time: Timestamp,
}

fn read(storage: &RwLock<ProviderStorage>) -> RwLockReadGuard<'_, ProviderStorage> {
    storage.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(storage: &RwLock<ProviderStorage>) -> RwLockWriteGuard<'_, ProviderStorage> {
    storage.write().unwrap_or_else(PoisonError::into_inner)
}

/// Look up the queue manager behind a connection, checking the session is still usable
fn live_queue_manager<'a>(
    queue_managers: &'a mut HashMap<String, InMemoryQueueManager>,
    queue_manager: &str,
    connection_id: &Uuid,
    verb: Verb,
) -> Result<&'a mut InMemoryQueueManager, MqError> {
    let qm = queue_managers
        .get_mut(queue_manager)
        .filter(|qm| qm.running)
        .ok_or_else(|| MqError::failed(verb, ReasonCode::CONNECTION_BROKEN))?;

    if !qm.connections.contains(connection_id) {
        return Err(MqError::failed(verb, ReasonCode::HCONN_ERROR));
    }

    Ok(qm)
}

// ============================================================================
// Public Administration Types
// ============================================================================

/// Server-connection channel accepted by an in-memory queue manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerChannel {
    pub name: String,
    pub cipher_spec: String,
    pub client_auth: ClientAuth,
}

impl ServerChannel {
    /// TLS channel using the default cipher spec with optional client auth
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cipher_spec: DEFAULT_CIPHER_SPEC.to_string(),
            client_auth: ClientAuth::Optional,
        }
    }

    pub fn with_cipher_spec(mut self, cipher_spec: impl Into<String>) -> Self {
        self.cipher_spec = cipher_spec.into();
        self
    }

    pub fn with_client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }
}

/// Counters of MQI calls served by a connector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderStats {
    pub connect_attempts: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub handles_opened: u64,
    /// Explicit closes plus handles released by disconnect
    pub handles_closed: u64,
    pub get_calls: u64,
}

// ============================================================================
// InMemoryConnector
// ============================================================================

/// In-memory queue manager provider
#[derive(Clone)]
pub struct InMemoryConnector {
    storage: Arc<RwLock<ProviderStorage>>,
}

impl InMemoryConnector {
    /// Create a provider with no queue managers defined
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(ProviderStorage::new())),
        }
    }

    /// Define a running queue manager listening on `listener`
    pub fn define_queue_manager(&self, name: &str, listener: &str) -> Result<(), AdminError> {
        validate_object_name("queue_manager", name, MAX_OBJECT_NAME_LENGTH)?;

        let mut storage = write(&self.storage);
        if storage.queue_managers.contains_key(name) {
            return Err(AdminError::AlreadyDefined {
                name: name.to_string(),
            });
        }
        storage
            .queue_managers
            .insert(name.to_string(), InMemoryQueueManager::new(name, listener));

        debug!(queue_manager = %name, listener = %listener, "Defined queue manager");
        Ok(())
    }

    /// Define a server-connection channel on a queue manager
    pub fn define_channel(&self, queue_manager: &str, channel: ServerChannel) -> Result<(), AdminError> {
        validate_object_name("channel", &channel.name, MAX_CHANNEL_NAME_LENGTH)?;

        let mut storage = write(&self.storage);
        let qm = storage.queue_manager_mut(queue_manager)?;
        if qm.channels.contains_key(&channel.name) {
            return Err(AdminError::AlreadyDefined { name: channel.name });
        }

        debug!(
            queue_manager = %queue_manager,
            channel = %channel.name,
            cipher_spec = %channel.cipher_spec,
            client_auth = ?channel.client_auth,
            "Defined channel"
        );
        qm.channels.insert(channel.name.clone(), channel);
        Ok(())
    }

    /// Define an empty local queue
    pub fn define_queue(&self, queue_manager: &str, queue: &str) -> Result<(), AdminError> {
        validate_object_name("queue", queue, MAX_OBJECT_NAME_LENGTH)?;

        let mut storage = write(&self.storage);
        let qm = storage.queue_manager_mut(queue_manager)?;
        if qm.queues.contains_key(queue) {
            return Err(AdminError::AlreadyDefined {
                name: queue.to_string(),
            });
        }
        qm.queues.insert(queue.to_string(), InMemoryQueue::new());

        debug!(queue_manager = %queue_manager, queue = %queue, "Defined queue");
        Ok(())
    }

    /// Put a message on a queue, waking any get waiting on it
    pub fn put_message(
        &self,
        queue_manager: &str,
        queue: &str,
        body: impl Into<Bytes>,
    ) -> Result<MessageId, AdminError> {
        let mut storage = write(&self.storage);
        let qm = storage.queue_manager_mut(queue_manager)?;
        if !qm.queues.contains_key(queue) {
            return Err(unknown_queue(queue_manager, queue));
        }

        qm.next_sequence += 1;
        let message_id = MessageId::generate(&qm.name, qm.next_sequence);
        let target = qm
            .queues
            .get_mut(queue)
            .ok_or_else(|| unknown_queue(queue_manager, queue))?;

        target.messages.push_back(StoredMessage {
            message_id,
            body: body.into(),
            put_time: Timestamp::now(),
        });
        target.notify.notify_waiters();

        debug!(
            queue_manager = %queue_manager,
            queue = %queue,
            message_id = %message_id,
            depth = target.messages.len(),
            "Put message"
        );
        Ok(message_id)
    }

    /// Stop a queue manager, breaking every connection and handle attached to it
    pub fn stop_queue_manager(&self, queue_manager: &str) -> Result<(), AdminError> {
        let mut storage = write(&self.storage);
        let qm = storage.queue_manager_mut(queue_manager)?;
        qm.running = false;
        qm.connections.clear();
        for queue in qm.queues.values_mut() {
            queue.open_handles.clear();
            queue.notify.notify_waiters();
        }

        debug!(queue_manager = %queue_manager, "Stopped queue manager");
        Ok(())
    }

    /// Number of messages currently on a queue
    pub fn queue_depth(&self, queue_manager: &str, queue: &str) -> Result<usize, AdminError> {
        let storage = read(&self.storage);
        let qm = storage
            .queue_managers
            .get(queue_manager)
            .ok_or_else(|| AdminError::UnknownQueueManager {
                name: queue_manager.to_string(),
            })?;
        qm.queues
            .get(queue)
            .map(|q| q.messages.len())
            .ok_or_else(|| unknown_queue(queue_manager, queue))
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> ProviderStats {
        read(&self.storage).stats
    }
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_queue(queue_manager: &str, queue: &str) -> AdminError {
    AdminError::UnknownQueue {
        queue_manager: queue_manager.to_string(),
        queue: queue.to_string(),
    }
}

/// Run the connect-time checks and register a new connection tag
fn admit_connection(
    queue_managers: &mut HashMap<String, InMemoryQueueManager>,
    queue_manager: &str,
    options: &ConnectOptions,
) -> Result<Uuid, MqError> {
    let fail = |reason: ReasonCode| MqError::failed(Verb::Connx, reason);

    if validate_object_name("queue_manager", queue_manager, MAX_OBJECT_NAME_LENGTH).is_err() {
        return Err(fail(ReasonCode::Q_MGR_NAME_ERROR));
    }

    let qm = queue_managers
        .get_mut(queue_manager)
        .filter(|qm| qm.running)
        .ok_or_else(|| fail(ReasonCode::Q_MGR_NOT_AVAILABLE))?;

    // Only client channels reach an in-process queue manager.
    if options.binding != Binding::Client {
        return Err(fail(ReasonCode::Q_MGR_NOT_AVAILABLE));
    }

    let requested = &options.client_connection;
    if requested.connection_name != qm.listener {
        return Err(fail(ReasonCode::HOST_NOT_AVAILABLE));
    }

    let channel = qm
        .channels
        .get(&requested.channel_name)
        .ok_or_else(|| fail(ReasonCode::UNKNOWN_CHANNEL_NAME))?;

    if options.tls.key_repository.is_empty() {
        return Err(fail(ReasonCode::KEY_REPOSITORY_ERROR));
    }
    if requested.cipher_spec.is_empty() {
        return Err(fail(ReasonCode::UNSUPPORTED_CIPHER_SUITE));
    }
    if requested.cipher_spec != channel.cipher_spec {
        return Err(fail(ReasonCode::SSL_INITIALIZATION_ERROR));
    }
    // A client that only optionally presents a certificate cannot satisfy a
    // channel that demands one.
    if channel.client_auth == ClientAuth::Required && requested.client_auth == ClientAuth::Optional {
        return Err(fail(ReasonCode::SSL_INITIALIZATION_ERROR));
    }

    let connection_id = Uuid::new_v4();
    qm.connections.insert(connection_id);
    Ok(connection_id)
}

#[async_trait]
impl QueueManagerConnector for InMemoryConnector {
    async fn connect(
        &self,
        queue_manager: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>, MqError> {
        let mut guard = write(&self.storage);
        let storage = &mut *guard;
        storage.stats.connect_attempts += 1;

        let connection_id = match admit_connection(&mut storage.queue_managers, queue_manager, options) {
            Ok(id) => id,
            Err(e) => {
                debug!(queue_manager = %queue_manager, error = %e, "Connect refused");
                return Err(e);
            }
        };
        storage.stats.connections_opened += 1;

        debug!(
            queue_manager = %queue_manager,
            connection_id = %connection_id,
            channel = %options.client_connection.channel_name,
            "Connected"
        );
        Ok(Box::new(InMemoryConnection {
            storage: Arc::clone(&self.storage),
            queue_manager: queue_manager.to_string(),
            connection_id,
        }))
    }
}

// ============================================================================
// InMemoryConnection
// ============================================================================

/// Session with an in-memory queue manager
pub struct InMemoryConnection {
    storage: Arc<RwLock<ProviderStorage>>,
    queue_manager: String,
    connection_id: Uuid,
}

#[async_trait]
impl Connection for InMemoryConnection {
    fn queue_manager_name(&self) -> &str {
        &self.queue_manager
    }

    async fn open(
        &self,
        descriptor: &ObjectDescriptor,
        mode: OpenMode,
    ) -> Result<Box<dyn QueueHandle>, MqError> {
        let mut guard = write(&self.storage);
        let storage = &mut *guard;
        let qm = live_queue_manager(
            &mut storage.queue_managers,
            &self.queue_manager,
            &self.connection_id,
            Verb::Open,
        )?;

        let name = &descriptor.object_name;
        if validate_object_name("queue", name, MAX_OBJECT_NAME_LENGTH).is_err() {
            return Err(MqError::failed(Verb::Open, ReasonCode::OBJECT_NAME_ERROR));
        }
        let queue = qm
            .queues
            .get_mut(name)
            .ok_or_else(|| MqError::failed(Verb::Open, ReasonCode::UNKNOWN_OBJECT_NAME))?;
        if queue.conflicts_with(mode) {
            return Err(MqError::failed(Verb::Open, ReasonCode::OBJECT_IN_USE));
        }

        storage.next_object_handle += 1;
        let object_handle = storage.next_object_handle;
        queue.open_handles.insert(
            object_handle,
            OpenHandle {
                connection_id: self.connection_id,
                mode,
            },
        );
        let notify = Arc::clone(&queue.notify);
        storage.stats.handles_opened += 1;

        debug!(
            queue_manager = %self.queue_manager,
            queue = %name,
            object_handle,
            mode = ?mode,
            "Opened queue"
        );
        Ok(Box::new(InMemoryQueueHandle {
            storage: Arc::clone(&self.storage),
            queue_manager: self.queue_manager.clone(),
            queue_name: name.clone(),
            connection_id: self.connection_id,
            object_handle,
            notify,
        }))
    }

    async fn disconnect(self: Box<Self>) -> Result<(), MqError> {
        let mut guard = write(&self.storage);
        let storage = &mut *guard;
        let qm = live_queue_manager(
            &mut storage.queue_managers,
            &self.queue_manager,
            &self.connection_id,
            Verb::Disc,
        )?;

        qm.connections.remove(&self.connection_id);
        let mut released = 0;
        for queue in qm.queues.values_mut() {
            let before = queue.open_handles.len();
            queue
                .open_handles
                .retain(|_, handle| handle.connection_id != self.connection_id);
            released += before - queue.open_handles.len();
        }
        storage.stats.connections_closed += 1;
        storage.stats.handles_closed += released as u64;

        debug!(
            queue_manager = %self.queue_manager,
            connection_id = %self.connection_id,
            released_handles = released,
            "Disconnected"
        );
        Ok(())
    }
}

// ============================================================================
// InMemoryQueueHandle
// ============================================================================

/// Open queue on an in-memory queue manager
pub struct InMemoryQueueHandle {
    storage: Arc<RwLock<ProviderStorage>>,
    queue_manager: String,
    queue_name: String,
    connection_id: Uuid,
    object_handle: u64,
    notify: Arc<Notify>,
}

impl InMemoryQueueHandle {
    /// Remove a matching message if one is on the queue right now
    fn try_take(&self, match_options: &MatchOptions) -> Result<Option<ReceivedMessage>, MqError> {
        let mut guard = write(&self.storage);
        let qm = live_queue_manager(
            &mut guard.queue_managers,
            &self.queue_manager,
            &self.connection_id,
            Verb::Get,
        )?;
        let queue = qm
            .queues
            .get_mut(&self.queue_name)
            .filter(|queue| queue.open_handles.contains_key(&self.object_handle))
            .ok_or_else(|| MqError::failed(Verb::Get, ReasonCode::HOBJ_ERROR))?;

        Ok(queue.take_matching(match_options).map(|stored| ReceivedMessage {
            descriptor: MessageDescriptor {
                message_id: stored.message_id,
                put_time: stored.put_time,
            },
            body: stored.body,
        }))
    }
}

#[async_trait]
impl QueueHandle for InMemoryQueueHandle {
    fn name(&self) -> &str {
        &self.queue_name
    }

    async fn get(&mut self, options: &GetOptions) -> Result<ReceivedMessage, MqError> {
        write(&self.storage).stats.get_calls += 1;

        // No units of work here: every get is destructive and final.
        if options.syncpoint == Syncpoint::Yes {
            return Err(MqError::failed(Verb::Get, ReasonCode::UOW_NOT_AVAILABLE));
        }

        let deadline = Instant::now() + options.wait.as_duration();
        loop {
            // Register interest before looking so a put in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_take(&options.match_options)? {
                debug!(
                    queue = %self.queue_name,
                    message_id = %message.message_id(),
                    length = message.data_length(),
                    "Got message"
                );
                return Ok(message);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(MqError::failed(Verb::Get, ReasonCode::NO_MSG_AVAILABLE));
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), MqError> {
        let mut guard = write(&self.storage);
        let storage = &mut *guard;
        let qm = live_queue_manager(
            &mut storage.queue_managers,
            &self.queue_manager,
            &self.connection_id,
            Verb::Close,
        )?;

        let removed = qm
            .queues
            .get_mut(&self.queue_name)
            .and_then(|queue| queue.open_handles.remove(&self.object_handle));
        if removed.is_none() {
            return Err(MqError::failed(Verb::Close, ReasonCode::HOBJ_ERROR));
        }
        storage.stats.handles_closed += 1;

        debug!(
            queue_manager = %self.queue_manager,
            queue = %self.queue_name,
            object_handle = self.object_handle,
            "Closed queue"
        );
        Ok(())
    }
}
