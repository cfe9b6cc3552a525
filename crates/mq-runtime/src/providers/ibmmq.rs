//! IBM MQ provider over the native MQI client library.
//!
//! Compiled with the `mqi` feature, which links the vendor client through
//! `libmqm-sys`. Connections use client bindings with the channel definition
//! and key repository taken from [`ConnectOptions`], so no `MQSERVER` or
//! client channel table is consulted.
//!
//! MQI calls block (a get may wait for the whole wait interval), so each one
//! runs on tokio's blocking pool. Connections are made with
//! `MQCNO_HANDLE_SHARE_BLOCK` so the handles may be used from whichever pool
//! thread picks up the next call.

use crate::client::{Connection, QueueHandle, QueueManagerConnector};
use crate::error::{CompletionCode, MqError, ReasonCode, Verb};
use crate::message::{MessageDescriptor, MessageId, ReceivedMessage, Timestamp};
use crate::options::{
    Binding, ClientAuth, ConnectOptions, GetOptions, MatchOptions, ObjectDescriptor, OpenMode,
    Syncpoint, WaitInterval,
};
use async_trait::async_trait;
use bytes::Bytes;
use libmqm_sys::function::Mqi;
use libmqm_sys::lib as sys;
use libmqm_sys::link::LinkedMq;
use std::ptr;
use tracing::{debug, warn};

/// Starting get buffer; grown to the reported length on truncation
const INITIAL_BUFFER_LENGTH: usize = 64 * 1024;

const MQ: LinkedMq = LinkedMq;

// ============================================================================
// Structure mapping
// ============================================================================

/// Copy `value` into a fixed-length MQCHAR field, blank padded and truncated
fn fill_mqchar(field: &mut [sys::MQCHAR], value: &str) {
    let bytes = value.bytes().chain(std::iter::repeat(b' '));
    for (slot, byte) in field.iter_mut().zip(bytes) {
        *slot = byte as sys::MQCHAR;
    }
}

/// Read a fixed-length MQCHAR field, dropping trailing blanks and NULs
fn mqchar_to_string(field: &[sys::MQCHAR]) -> String {
    let bytes: Vec<u8> = field.iter().map(|c| *c as u8).collect();
    String::from_utf8_lossy(&bytes)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

fn client_auth_value(client_auth: ClientAuth) -> sys::MQLONG {
    match client_auth {
        ClientAuth::Optional => sys::MQSCA_OPTIONAL as sys::MQLONG,
        ClientAuth::Required => sys::MQSCA_REQUIRED as sys::MQLONG,
    }
}

/// MQCNO with the MQCD and MQSCO it points at
struct ConnectBlock {
    cno: sys::MQCNO,
    cd: Box<sys::MQCD>,
    sco: Box<sys::MQSCO>,
}

impl ConnectBlock {
    fn new(options: &ConnectOptions) -> Self {
        let channel = &options.client_connection;

        let mut cd = Box::new(sys::MQCD::default());
        cd.Version = sys::MQCD_VERSION_7 as sys::MQLONG;
        cd.ChannelType = sys::MQCHT_CLNTCONN as sys::MQLONG;
        cd.TransportType = sys::MQXPT_TCP as sys::MQLONG;
        fill_mqchar(&mut cd.ChannelName, &channel.channel_name);
        fill_mqchar(&mut cd.ConnectionName, &channel.connection_name);
        fill_mqchar(&mut cd.SSLCipherSpec, &channel.cipher_spec);
        cd.SSLClientAuth = client_auth_value(channel.client_auth);

        let mut sco = Box::new(sys::MQSCO::default());
        fill_mqchar(&mut sco.KeyRepository, &options.tls.key_repository);

        let mut cno = sys::MQCNO::default();
        cno.Version = sys::MQCNO_VERSION_4 as sys::MQLONG;
        cno.Options = sys::MQCNO_HANDLE_SHARE_BLOCK as sys::MQLONG;
        cno.Options |= match options.binding {
            Binding::Client => sys::MQCNO_CLIENT_BINDING as sys::MQLONG,
            Binding::Local => sys::MQCNO_LOCAL_BINDING as sys::MQLONG,
        };

        Self { cno, cd, sco }
    }

    fn is_client(&self) -> bool {
        self.cno.Options & sys::MQCNO_CLIENT_BINDING as sys::MQLONG != 0
    }

    /// MQCNO ready for MQCONNX; only valid while `self` is borrowed
    fn as_mut_ptr(&mut self) -> sys::PMQCNO {
        if self.is_client() {
            self.cno.ClientConnPtr = ptr::addr_of_mut!(*self.cd).cast();
            self.cno.SSLConfigPtr = ptr::addr_of_mut!(*self.sco).cast();
        }
        ptr::addr_of_mut!(self.cno)
    }
}

fn open_options(mode: OpenMode) -> sys::MQLONG {
    let input = match mode {
        OpenMode::InputExclusive => sys::MQOO_INPUT_EXCLUSIVE,
        OpenMode::InputShared => sys::MQOO_INPUT_SHARED,
    };
    (input | sys::MQOO_FAIL_IF_QUIESCING) as sys::MQLONG
}

fn queue_descriptor(descriptor: &ObjectDescriptor) -> sys::MQOD {
    let mut od = sys::MQOD::default();
    od.Version = sys::MQOD_VERSION_3 as sys::MQLONG;
    od.ObjectType = sys::MQOT_Q as sys::MQLONG;
    fill_mqchar(&mut od.ObjectName, &descriptor.object_name);
    od
}

fn get_message_options(options: &GetOptions) -> sys::MQGMO {
    let mut gmo = sys::MQGMO::default();
    gmo.Version = sys::MQGMO_VERSION_2 as sys::MQLONG;

    let syncpoint = match options.syncpoint {
        Syncpoint::No => sys::MQGMO_NO_SYNCPOINT,
        Syncpoint::Yes => sys::MQGMO_SYNCPOINT,
    };
    let wait = match options.wait {
        WaitInterval::NoWait => sys::MQGMO_NO_WAIT,
        WaitInterval::Millis(_) => sys::MQGMO_WAIT,
    };
    gmo.Options = (syncpoint | wait | sys::MQGMO_FAIL_IF_QUIESCING) as sys::MQLONG;
    gmo.WaitInterval = options.wait.as_millis() as sys::MQLONG;

    // Version 2 defaults to matching on MsgId and CorrelId, so clear it
    gmo.MatchOptions = match options.match_options {
        MatchOptions::None => sys::MQMO_NONE as sys::MQLONG,
        MatchOptions::MsgId(_) => sys::MQMO_MATCH_MSG_ID as sys::MQLONG,
    };
    gmo
}

fn message_descriptor(match_options: &MatchOptions) -> sys::MQMD {
    let mut md = sys::MQMD::default();
    if let MatchOptions::MsgId(id) = match_options {
        md.MsgId = *id.as_bytes();
    }
    md
}

fn received_message(md: &sys::MQMD, body: Vec<u8>) -> ReceivedMessage {
    let put_date = mqchar_to_string(&md.PutDate);
    let put_time = Timestamp::from_mqmd(&put_date, &mqchar_to_string(&md.PutTime))
        .unwrap_or_else(Timestamp::now);

    ReceivedMessage {
        descriptor: MessageDescriptor {
            message_id: MessageId::from_array(md.MsgId),
            put_time,
        },
        body: Bytes::from(body),
    }
}

/// Map an MQI outcome to a result. Warnings are logged and treated as success.
fn check(verb: Verb, cc: sys::MQLONG, rc: sys::MQLONG) -> Result<(), MqError> {
    match CompletionCode::from_value(cc) {
        CompletionCode::Ok => Ok(()),
        CompletionCode::Warning => {
            warn!(verb = %verb, reason = %ReasonCode::new(rc), "MQI call completed with a warning");
            Ok(())
        }
        completion @ CompletionCode::Failed => {
            Err(MqError::new(verb, completion, ReasonCode::new(rc)))
        }
    }
}

/// Run a blocking MQI call on the blocking pool
async fn blocking<T, F>(verb: Verb, call: F) -> Result<T, MqError>
where
    F: FnOnce() -> Result<T, MqError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await.unwrap_or_else(|e| {
        warn!(verb = %verb, error = %e, "MQI call did not complete");
        Err(MqError::failed(verb, ReasonCode::UNEXPECTED_ERROR))
    })
}

// ============================================================================
// MQI verbs
// ============================================================================

fn connect_blocking(
    queue_manager: &str,
    options: &ConnectOptions,
) -> Result<sys::MQHCONN, MqError> {
    let mut block = ConnectBlock::new(options);
    let mut name: sys::MQCHAR48 = [0; 48];
    fill_mqchar(&mut name, queue_manager);

    let mut hconn = sys::MQHC_UNUSABLE_HCONN as sys::MQHCONN;
    let mut cc: sys::MQLONG = 0;
    let mut rc: sys::MQLONG = 0;
    // SAFETY: every pointer refers to a live local or to the boxed MQCD/MQSCO
    // owned by `block`, which outlives the call.
    unsafe {
        MQ.MQCONNX(
            name.as_mut_ptr(),
            block.as_mut_ptr(),
            &mut hconn,
            &mut cc,
            &mut rc,
        );
    }
    check(Verb::Connx, cc, rc)?;
    debug!(
        queue_manager,
        channel = %mqchar_to_string(&block.cd.ChannelName),
        key_repository = %mqchar_to_string(&block.sco.KeyRepository),
        "Connected"
    );
    Ok(hconn)
}

fn open_blocking(
    hconn: sys::MQHCONN,
    descriptor: &ObjectDescriptor,
    mode: OpenMode,
) -> Result<(sys::MQHOBJ, String), MqError> {
    let mut od = queue_descriptor(descriptor);
    let mut hobj = sys::MQHO_UNUSABLE_HOBJ as sys::MQHOBJ;
    let mut cc: sys::MQLONG = 0;
    let mut rc: sys::MQLONG = 0;
    // SAFETY: `od`, `hobj` and the code outputs are live locals.
    unsafe {
        MQ.MQOPEN(
            hconn,
            ptr::addr_of_mut!(od).cast(),
            open_options(mode),
            &mut hobj,
            &mut cc,
            &mut rc,
        );
    }
    check(Verb::Open, cc, rc)?;

    let resolved = mqchar_to_string(&od.ResolvedQName);
    let name = if resolved.is_empty() {
        descriptor.object_name.clone()
    } else {
        resolved
    };
    Ok((hobj, name))
}

fn get_blocking(
    hconn: sys::MQHCONN,
    hobj: sys::MQHOBJ,
    options: &GetOptions,
) -> Result<ReceivedMessage, MqError> {
    let mut buffer = vec![0u8; INITIAL_BUFFER_LENGTH];

    loop {
        let mut md = message_descriptor(&options.match_options);
        let mut gmo = get_message_options(options);
        let buffer_length = sys::MQLONG::try_from(buffer.len()).unwrap_or(sys::MQLONG::MAX);
        let mut data_length: sys::MQLONG = 0;
        let mut cc: sys::MQLONG = 0;
        let mut rc: sys::MQLONG = 0;
        // SAFETY: `buffer_length` never exceeds the allocation behind `buffer`.
        unsafe {
            MQ.MQGET(
                hconn,
                hobj,
                ptr::addr_of_mut!(md).cast(),
                ptr::addr_of_mut!(gmo).cast(),
                buffer_length,
                buffer.as_mut_ptr().cast(),
                &mut data_length,
                &mut cc,
                &mut rc,
            );
        }

        let data_length = usize::try_from(data_length).unwrap_or(0);
        if ReasonCode::new(rc) == ReasonCode::TRUNCATED_MSG_FAILED && data_length > buffer.len() {
            debug!(length = data_length, "Growing get buffer");
            buffer.resize(data_length, 0);
            continue;
        }
        check(Verb::Get, cc, rc)?;

        buffer.truncate(data_length);
        return Ok(received_message(&md, buffer));
    }
}

fn close_blocking(hconn: sys::MQHCONN, mut hobj: sys::MQHOBJ) -> Result<(), MqError> {
    let mut cc: sys::MQLONG = 0;
    let mut rc: sys::MQLONG = 0;
    // SAFETY: `hobj` and the code outputs are live locals.
    unsafe {
        MQ.MQCLOSE(hconn, &mut hobj, sys::MQCO_NONE as sys::MQLONG, &mut cc, &mut rc);
    }
    check(Verb::Close, cc, rc)
}

fn disconnect_blocking(mut hconn: sys::MQHCONN) -> Result<(), MqError> {
    let mut cc: sys::MQLONG = 0;
    let mut rc: sys::MQLONG = 0;
    // SAFETY: `hconn` and the code outputs are live locals.
    unsafe {
        MQ.MQDISC(&mut hconn, &mut cc, &mut rc);
    }
    check(Verb::Disc, cc, rc)
}

// ============================================================================
// Provider
// ============================================================================

/// Connects to queue managers through the native MQI client
#[derive(Debug, Clone, Copy, Default)]
pub struct IbmMqConnector;

impl IbmMqConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueueManagerConnector for IbmMqConnector {
    async fn connect(
        &self,
        queue_manager: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>, MqError> {
        let name = queue_manager.to_string();
        let options = options.clone();
        let hconn = blocking(Verb::Connx, move || connect_blocking(&name, &options)).await?;

        Ok(Box::new(IbmMqConnection {
            queue_manager: queue_manager.to_string(),
            hconn,
        }))
    }
}

/// Session with a queue manager, identified by its connection handle
#[derive(Debug)]
pub struct IbmMqConnection {
    queue_manager: String,
    hconn: sys::MQHCONN,
}

#[async_trait]
impl Connection for IbmMqConnection {
    fn queue_manager_name(&self) -> &str {
        &self.queue_manager
    }

    async fn open(
        &self,
        descriptor: &ObjectDescriptor,
        mode: OpenMode,
    ) -> Result<Box<dyn QueueHandle>, MqError> {
        let hconn = self.hconn;
        let descriptor = descriptor.clone();
        let (hobj, name) =
            blocking(Verb::Open, move || open_blocking(hconn, &descriptor, mode)).await?;
        debug!(queue = %name, ?mode, "Opened queue");

        Ok(Box::new(IbmMqQueueHandle { hconn, hobj, name }))
    }

    async fn disconnect(self: Box<Self>) -> Result<(), MqError> {
        let hconn = self.hconn;
        blocking(Verb::Disc, move || disconnect_blocking(hconn)).await
    }
}

/// Queue opened on an [`IbmMqConnection`]
#[derive(Debug)]
pub struct IbmMqQueueHandle {
    hconn: sys::MQHCONN,
    hobj: sys::MQHOBJ,
    name: String,
}

#[async_trait]
impl QueueHandle for IbmMqQueueHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&mut self, options: &GetOptions) -> Result<ReceivedMessage, MqError> {
        let (hconn, hobj) = (self.hconn, self.hobj);
        let options = options.clone();
        blocking(Verb::Get, move || get_blocking(hconn, hobj, &options)).await
    }

    async fn close(self: Box<Self>) -> Result<(), MqError> {
        let (hconn, hobj) = (self.hconn, self.hobj);
        blocking(Verb::Close, move || close_blocking(hconn, hobj)).await
    }
}

#[cfg(test)]
#[path = "ibmmq_tests.rs"]
mod tests;
