//! Tests for the in-memory queue manager provider.

use super::*;
use crate::error::ValidationError;
use crate::options::{ChannelDefinition, TlsConfig};
use std::time::Duration;

const QM: &str = "QM1";
const LISTENER: &str = "localhost(1414)";
const CHANNEL: &str = "DEV.APP.SVRCONN";
const QUEUE: &str = "TEST.Q";

/// Queue manager QM1 with one TLS channel and one empty queue
fn connector() -> InMemoryConnector {
    let connector = InMemoryConnector::new();
    connector.define_queue_manager(QM, LISTENER).unwrap();
    connector
        .define_channel(QM, ServerChannel::new(CHANNEL))
        .unwrap();
    connector.define_queue(QM, QUEUE).unwrap();
    connector
}

fn connect_options() -> ConnectOptions {
    ConnectOptions::client(
        ChannelDefinition::new(CHANNEL, LISTENER),
        TlsConfig::new("/var/mqm/ssl/key"),
    )
}

async fn connect(connector: &InMemoryConnector) -> Box<dyn Connection> {
    connector
        .connect(QM, &connect_options())
        .await
        .expect("Setup: connect should succeed")
}

async fn connect_error(
    connector: &InMemoryConnector,
    queue_manager: &str,
    options: &ConnectOptions,
) -> MqError {
    match connector.connect(queue_manager, options).await {
        Ok(_) => panic!("Expected connect to {} to fail", queue_manager),
        Err(e) => e,
    }
}

async fn open_error(connection: &dyn Connection, queue: &str, mode: OpenMode) -> MqError {
    match connection.open(&ObjectDescriptor::queue(queue), mode).await {
        Ok(_) => panic!("Expected open of {} to fail", queue),
        Err(e) => e,
    }
}

// ============================================================================
// Connect
// ============================================================================

mod connect {
    use super::*;

    #[tokio::test]
    async fn test_connect_succeeds_with_matching_channel() {
        let connector = connector();

        let connection = connect(&connector).await;

        assert_eq!(connection.queue_manager_name(), QM);
        let stats = connector.stats();
        assert_eq!(stats.connect_attempts, 1);
        assert_eq!(stats.connections_opened, 1);
    }

    #[tokio::test]
    async fn test_empty_queue_manager_name_is_name_error() {
        let connector = connector();

        let error = connect_error(&connector, "", &connect_options()).await;

        assert_eq!(error.verb, Verb::Connx);
        assert_eq!(error.reason, ReasonCode::Q_MGR_NAME_ERROR);
        assert_eq!(error.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_unknown_queue_manager_is_not_available() {
        let connector = connector();

        let error = connect_error(&connector, "QM2", &connect_options()).await;

        assert_eq!(error.reason, ReasonCode::Q_MGR_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_stopped_queue_manager_is_not_available() {
        let connector = connector();
        connector.stop_queue_manager(QM).unwrap();

        let error = connect_error(&connector, QM, &connect_options()).await;

        assert_eq!(error.reason, ReasonCode::Q_MGR_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_local_binding_is_refused() {
        let connector = connector();
        let mut options = connect_options();
        options.binding = Binding::Local;

        let error = connect_error(&connector, QM, &options).await;

        assert_eq!(error.reason, ReasonCode::Q_MGR_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_wrong_listener_is_host_not_available() {
        let connector = connector();
        let options = ConnectOptions::client(
            ChannelDefinition::new(CHANNEL, "otherhost(1414)"),
            TlsConfig::new("/var/mqm/ssl/key"),
        );

        let error = connect_error(&connector, QM, &options).await;

        assert_eq!(error.reason, ReasonCode::HOST_NOT_AVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_rejected() {
        let connector = connector();
        let options = ConnectOptions::client(
            ChannelDefinition::new("NO.SUCH.CHANNEL", LISTENER),
            TlsConfig::new("/var/mqm/ssl/key"),
        );

        let error = connect_error(&connector, QM, &options).await;

        assert_eq!(error.reason, ReasonCode::UNKNOWN_CHANNEL_NAME);
    }

    #[tokio::test]
    async fn test_missing_key_repository_is_rejected() {
        let connector = connector();
        let options = ConnectOptions::client(
            ChannelDefinition::new(CHANNEL, LISTENER),
            TlsConfig::new(""),
        );

        let error = connect_error(&connector, QM, &options).await;

        assert_eq!(error.reason, ReasonCode::KEY_REPOSITORY_ERROR);
    }

    #[tokio::test]
    async fn test_empty_cipher_spec_is_unsupported() {
        let connector = connector();
        let mut options = connect_options();
        options.client_connection.cipher_spec = String::new();

        let error = connect_error(&connector, QM, &options).await;

        assert_eq!(error.reason, ReasonCode::UNSUPPORTED_CIPHER_SUITE);
    }

    #[tokio::test]
    async fn test_cipher_mismatch_fails_tls_initialization() {
        let connector = connector();
        let options = ConnectOptions::client(
            ChannelDefinition::new(CHANNEL, LISTENER)
                .with_cipher_spec("TLS_AES_256_GCM_SHA384"),
            TlsConfig::new("/var/mqm/ssl/key"),
        );

        let error = connect_error(&connector, QM, &options).await;

        assert_eq!(error.reason, ReasonCode::SSL_INITIALIZATION_ERROR);
    }

    #[tokio::test]
    async fn test_required_client_auth_needs_client_certificate() {
        let connector = connector();
        connector
            .define_channel(
                QM,
                ServerChannel::new("STRICT.SVRCONN").with_client_auth(ClientAuth::Required),
            )
            .unwrap();

        let optional = ConnectOptions::client(
            ChannelDefinition::new("STRICT.SVRCONN", LISTENER),
            TlsConfig::new("/var/mqm/ssl/key"),
        );
        let error = connect_error(&connector, QM, &optional).await;
        assert_eq!(error.reason, ReasonCode::SSL_INITIALIZATION_ERROR);

        let mut required = optional.clone();
        required.client_connection.client_auth = ClientAuth::Required;
        assert!(connector.connect(QM, &required).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_attempts_are_counted_but_not_opened() {
        let connector = connector();

        let _ = connect_error(&connector, "QM2", &connect_options()).await;

        let stats = connector.stats();
        assert_eq!(stats.connect_attempts, 1);
        assert_eq!(stats.connections_opened, 0);
    }
}

// ============================================================================
// Open
// ============================================================================

mod open {
    use super::*;

    #[tokio::test]
    async fn test_open_exclusive_returns_resolved_name() {
        let connector = connector();
        let connection = connect(&connector).await;

        let handle = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await
            .unwrap();

        assert_eq!(handle.name(), QUEUE);
        assert_eq!(connector.stats().handles_opened, 1);
    }

    #[tokio::test]
    async fn test_unknown_queue_is_unknown_object_name() {
        let connector = connector();
        let connection = connect(&connector).await;

        let error = open_error(connection.as_ref(), "NO.SUCH.Q", OpenMode::InputExclusive).await;

        assert_eq!(error.verb, Verb::Open);
        assert_eq!(error.reason, ReasonCode::UNKNOWN_OBJECT_NAME);
    }

    #[tokio::test]
    async fn test_invalid_queue_name_is_object_name_error() {
        let connector = connector();
        let connection = connect(&connector).await;

        let error = open_error(connection.as_ref(), "", OpenMode::InputExclusive).await;

        assert_eq!(error.reason, ReasonCode::OBJECT_NAME_ERROR);
    }

    #[tokio::test]
    async fn test_exclusive_input_locks_out_other_input_handles() {
        let connector = connector();
        let first = connect(&connector).await;
        let second = connect(&connector).await;

        let _held = first
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await
            .unwrap();

        let exclusive = open_error(second.as_ref(), QUEUE, OpenMode::InputExclusive).await;
        let shared = open_error(second.as_ref(), QUEUE, OpenMode::InputShared).await;

        assert_eq!(exclusive.reason, ReasonCode::OBJECT_IN_USE);
        assert_eq!(shared.reason, ReasonCode::OBJECT_IN_USE);
    }

    #[tokio::test]
    async fn test_shared_input_blocks_exclusive_but_not_shared() {
        let connector = connector();
        let connection = connect(&connector).await;

        let _first = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputShared)
            .await
            .unwrap();
        let second = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputShared)
            .await;
        let exclusive = open_error(connection.as_ref(), QUEUE, OpenMode::InputExclusive).await;

        assert!(second.is_ok());
        assert_eq!(exclusive.reason, ReasonCode::OBJECT_IN_USE);
    }

    #[tokio::test]
    async fn test_close_releases_exclusive_lock() {
        let connector = connector();
        let connection = connect(&connector).await;
        let handle = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await
            .unwrap();

        handle.close().await.unwrap();
        let reopened = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await;

        assert!(reopened.is_ok());
        assert_eq!(connector.stats().handles_closed, 1);
    }
}

// ============================================================================
// Get
// ============================================================================

mod get {
    use super::*;

    async fn open_queue(connector: &InMemoryConnector) -> (Box<dyn Connection>, Box<dyn QueueHandle>) {
        let connection = connect(connector).await;
        let handle = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await
            .expect("Setup: open should succeed");
        (connection, handle)
    }

    #[tokio::test]
    async fn test_get_returns_messages_in_put_order() {
        let connector = connector();
        let first_id = connector.put_message(QM, QUEUE, "hello").unwrap();
        connector.put_message(QM, QUEUE, "world  ").unwrap();
        let (_connection, mut handle) = open_queue(&connector).await;

        let first = handle.get(&GetOptions::new()).await.unwrap();
        let second = handle.get(&GetOptions::new()).await.unwrap();

        assert_eq!(first.body, Bytes::from_static(b"hello"));
        assert_eq!(first.message_id(), first_id);
        assert_eq!(second.data_length(), 7);
        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_without_wait_on_empty_queue_reports_no_message() {
        let connector = connector();
        let (_connection, mut handle) = open_queue(&connector).await;

        let error = handle.get(&GetOptions::new()).await.unwrap_err();

        assert_eq!(error.verb, Verb::Get);
        assert!(error.is_no_message_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_waits_full_interval_before_reporting_no_message() {
        let connector = connector();
        let (_connection, mut handle) = open_queue(&connector).await;
        let started = Instant::now();

        let error = handle
            .get(&GetOptions::new().with_wait_millis(3000))
            .await
            .unwrap_err();

        assert!(error.is_no_message_available());
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_during_wait_wakes_get() {
        let connector = connector();
        let (_connection, mut handle) = open_queue(&connector).await;
        let started = Instant::now();

        let options = GetOptions::new().with_wait_millis(3000);

        let (result, _) = tokio::join!(
            handle.get(&options),
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                connector.put_message(QM, QUEUE, "late").unwrap();
            }
        );

        let message = result.unwrap();
        assert_eq!(message.text(), "late");
        assert!(started.elapsed() < Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_wakes_every_waiting_shared_handle() {
        let connector = connector();
        let connection = connect(&connector).await;
        let descriptor = ObjectDescriptor::queue(QUEUE);
        let mut filtered = connection
            .open(&descriptor, OpenMode::InputShared)
            .await
            .unwrap();
        let mut unfiltered = connection
            .open(&descriptor, OpenMode::InputShared)
            .await
            .unwrap();

        let by_id = GetOptions::new()
            .with_wait_millis(3000)
            .with_match_msg_id(MessageId::from_hex("ab").unwrap());
        let any = GetOptions::new().with_wait_millis(3000);

        let (filtered_result, unfiltered_result, _) = tokio::join!(
            filtered.get(&by_id),
            unfiltered.get(&any),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                connector.put_message(QM, QUEUE, "x").unwrap();
            }
        );

        assert!(filtered_result.unwrap_err().is_no_message_available());
        assert_eq!(unfiltered_result.unwrap().text(), "x");
        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_match_by_message_id_skips_other_messages() {
        let connector = connector();
        connector.put_message(QM, QUEUE, "first").unwrap();
        let wanted = connector.put_message(QM, QUEUE, "second").unwrap();
        let (_connection, mut handle) = open_queue(&connector).await;

        let message = handle
            .get(&GetOptions::new().with_match_msg_id(wanted))
            .await
            .unwrap();

        assert_eq!(message.text(), "second");
        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_match_by_unknown_message_id_reports_no_message() {
        let connector = connector();
        connector.put_message(QM, QUEUE, "first").unwrap();
        let (_connection, mut handle) = open_queue(&connector).await;

        let error = handle
            .get(&GetOptions::new().with_match_msg_id(MessageId::generate("QM9", 99)))
            .await
            .unwrap_err();

        assert!(error.is_no_message_available());
        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_syncpoint_get_is_not_supported() {
        let connector = connector();
        connector.put_message(QM, QUEUE, "kept").unwrap();
        let (_connection, mut handle) = open_queue(&connector).await;

        let error = handle
            .get(&GetOptions::new().with_syncpoint(Syncpoint::Yes))
            .await
            .unwrap_err();

        assert_eq!(error.reason, ReasonCode::UOW_NOT_AVAILABLE);
        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_queue_manager_breaks_waiting_get() {
        let connector = connector();
        let (_connection, mut handle) = open_queue(&connector).await;

        let options = GetOptions::new().with_wait_millis(3000);

        let (result, _) = tokio::join!(
            handle.get(&options),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                connector.stop_queue_manager(QM).unwrap();
            }
        );

        assert_eq!(result.unwrap_err().reason, ReasonCode::CONNECTION_BROKEN);
    }

    #[tokio::test]
    async fn test_get_calls_are_counted() {
        let connector = connector();
        connector.put_message(QM, QUEUE, "one").unwrap();
        let (_connection, mut handle) = open_queue(&connector).await;

        let _ = handle.get(&GetOptions::new()).await;
        let _ = handle.get(&GetOptions::new()).await;

        assert_eq!(connector.stats().get_calls, 2);
    }
}

// ============================================================================
// Close and Disconnect
// ============================================================================

mod release {
    use super::*;

    #[tokio::test]
    async fn test_disconnect_releases_handles_left_open() {
        let connector = connector();
        let first = connect(&connector).await;
        let handle = first
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await
            .unwrap();

        first.disconnect().await.unwrap();
        let second = connect(&connector).await;
        let reopened = second
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await;

        assert!(reopened.is_ok());
        let stats = connector.stats();
        assert_eq!(stats.connections_closed, 1);
        assert_eq!(stats.handles_closed, 1);

        let error = handle.close().await.unwrap_err();
        assert_eq!(error.reason, ReasonCode::HCONN_ERROR);
    }

    #[tokio::test]
    async fn test_disconnect_after_stop_reports_broken_connection() {
        let connector = connector();
        let connection = connect(&connector).await;
        connector.stop_queue_manager(QM).unwrap();

        let error = connection.disconnect().await.unwrap_err();

        assert_eq!(error.verb, Verb::Disc);
        assert_eq!(error.reason, ReasonCode::CONNECTION_BROKEN);
    }

    #[tokio::test]
    async fn test_close_after_stop_reports_broken_connection() {
        let connector = connector();
        let connection = connect(&connector).await;
        let handle = connection
            .open(&ObjectDescriptor::queue(QUEUE), OpenMode::InputExclusive)
            .await
            .unwrap();
        connector.stop_queue_manager(QM).unwrap();

        let error = handle.close().await.unwrap_err();

        assert_eq!(error.verb, Verb::Close);
        assert_eq!(error.reason, ReasonCode::CONNECTION_BROKEN);
    }
}

// ============================================================================
// Administration
// ============================================================================

mod administration {
    use super::*;

    #[test]
    fn test_duplicate_definitions_are_rejected() {
        let connector = connector();

        assert!(matches!(
            connector.define_queue_manager(QM, LISTENER),
            Err(AdminError::AlreadyDefined { .. })
        ));
        assert!(matches!(
            connector.define_channel(QM, ServerChannel::new(CHANNEL)),
            Err(AdminError::AlreadyDefined { .. })
        ));
        assert!(matches!(
            connector.define_queue(QM, QUEUE),
            Err(AdminError::AlreadyDefined { .. })
        ));
    }

    #[test]
    fn test_definitions_on_unknown_queue_manager_fail() {
        let connector = InMemoryConnector::new();

        assert_eq!(
            connector.define_queue("QM9", QUEUE),
            Err(AdminError::UnknownQueueManager {
                name: "QM9".to_string()
            })
        );
        assert!(connector
            .define_channel("QM9", ServerChannel::new(CHANNEL))
            .is_err());
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let connector = InMemoryConnector::new();

        assert!(matches!(
            connector.define_queue_manager("", LISTENER),
            Err(AdminError::Validation(ValidationError::Required { .. }))
        ));
        connector.define_queue_manager(QM, LISTENER).unwrap();
        assert!(connector
            .define_channel(QM, ServerChannel::new("A.CHANNEL.NAME.OVER.20"))
            .is_err());
        assert!(connector.define_queue(QM, "BAD QUEUE").is_err());
    }

    #[test]
    fn test_put_to_unknown_queue_fails() {
        let connector = connector();

        let result = connector.put_message(QM, "NO.SUCH.Q", "x");

        assert_eq!(
            result,
            Err(AdminError::UnknownQueue {
                queue_manager: QM.to_string(),
                queue: "NO.SUCH.Q".to_string()
            })
        );
    }

    #[test]
    fn test_put_assigns_distinct_message_ids() {
        let connector = connector();

        let first = connector.put_message(QM, QUEUE, "a").unwrap();
        let second = connector.put_message(QM, QUEUE, "b").unwrap();

        assert_ne!(first, second);
        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let connector = connector();
        let clone = connector.clone();

        clone.put_message(QM, QUEUE, "shared").unwrap();

        assert_eq!(connector.queue_depth(QM, QUEUE).unwrap(), 1);
    }
}
