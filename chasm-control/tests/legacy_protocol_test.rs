//! Integration tests for the legacy protocol generation
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unreachable
)]

mod support;

use chasm_control::{
    CheckType, ControlClient, ControlConfig, ControlError, DualStack, HostCheckReport,
    HostGroupConfig, Mode, ProtocolGeneration, Reason, WorkState,
};
use pretty_assertions::assert_eq;
use support::fixture_daemon::{BASE_TIME_MS, CHECK_INFO, DB_GROUP, FixtureDaemon, WEB_GROUP, WEB_HOSTS};

async fn start() -> (FixtureDaemon, ControlClient) {
    let daemon = FixtureDaemon::builder().legacy().build().await;
    let mut config = ControlConfig::with_socket(daemon.socket_path());
    config.generation = ProtocolGeneration::Legacy;
    let client = ControlClient::new(config).expect("Failed to build client");
    (daemon, client)
}

#[tokio::test]
async fn test_counters() {
    let (daemon, client) = start().await;

    assert_eq!(client.generation(), ProtocolGeneration::Legacy);
    assert_eq!(client.work_queue_info().await.unwrap(), 3);
    assert_eq!(client.schedule_queue_info().await.unwrap(), 11);

    let threads = client.thread_info().await.unwrap();
    assert_eq!((threads.total, threads.idle), (8, 2));

    // Commands go out bare, with no version prefix
    assert_eq!(
        daemon.commands().await,
        vec!["workqueueinfo", "schdqueueinfo", "threadinfo"]
    );
    // One packet per command, no length prefix
    assert_eq!(
        daemon.request_packets().await,
        vec![vec![13], vec![13], vec![10]]
    );
}

#[tokio::test]
async fn test_lists() {
    let (_daemon, client) = start().await;

    assert_eq!(client.host_group_list().await.unwrap(), vec![WEB_GROUP, DB_GROUP]);
    assert_eq!(client.host_list(WEB_GROUP).await.unwrap(), WEB_HOSTS.to_vec());
    assert!(client.host_list(DB_GROUP).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_host_check_summary() {
    let (_daemon, client) = start().await;

    let report = client.host_check(WEB_GROUP, WEB_HOSTS[0]).await.unwrap();
    let HostCheckReport::Summary(Some(summary)) = report else {
        panic!("expected a legacy summary, got {report:?}");
    };

    assert_eq!(summary.errnum, 0);
    assert_eq!(summary.status, 1);
    assert_eq!(summary.reason, Reason::Success);
    assert_eq!(summary.connect_time, 20);
    assert_eq!(summary.smoothed_connect_time, 22);
    assert_eq!(summary.total_time, 45);
    assert_eq!(
        summary.status_time.timestamp_millis(),
        i64::try_from(BASE_TIME_MS).unwrap()
    );

    let unchecked = client.host_check(WEB_GROUP, WEB_HOSTS[1]).await.unwrap();
    assert_eq!(unchecked, HostCheckReport::Summary(None));
}

#[tokio::test]
async fn test_host_sched_info_reads_trailing_records() {
    let (_daemon, client) = start().await;

    let info = client
        .host_sched_info(WEB_GROUP, WEB_HOSTS[0])
        .await
        .unwrap();

    assert_eq!(info.v4.as_ref().unwrap().state, WorkState::Queued);
    assert_eq!(info.v6.as_ref().unwrap().state, WorkState::Inactive);

    assert_eq!(info.hosts.len(), 2);
    assert_eq!(info.hosts[0].address.to_string(), "127.0.0.1");
    assert_eq!(info.hosts[0].state, WorkState::Queued);
    assert_eq!(info.hosts[1].address.to_string(), "::1");
    assert_eq!(info.hosts[1].state, WorkState::Failed);
}

#[tokio::test]
async fn test_host_group_params() {
    let (_daemon, client) = start().await;

    let config = client.host_group_params(WEB_GROUP).await.unwrap().unwrap();
    assert_eq!(
        config,
        HostGroupConfig {
            group_name: WEB_GROUP.to_string(),
            check_type: CheckType::Http,
            port: 80,
            dual_stack: DualStack::V4Only,
            smoothing_window: 5,
            max_flaps: 3,
            flap_threshold: 4,
            num_check_retries: 2,
            check_retry_delay: 5,
            group_threshold: 50,
            slow_threshold: 1_000,
            check_timeout: 2_000,
            check_ttl: 60_000,
            mode: Some(Mode::GroupRtLocalRr),
            passthrough_info: 0,
            check_info: CHECK_INFO.to_string(),
            hosts: Vec::new(),
            host_groups: Vec::new(),
            remote_check_type: 0,
            distributed_fallback: 0,
            measurement_options: 0,
            remote_check: String::new(),
        }
    );

    assert!(
        client
            .host_group_params("missing.example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_current_only_commands_unsupported() {
    let (daemon, client) = start().await;

    assert!(matches!(
        client.clear_transaction().await,
        Err(ControlError::Unsupported {
            verb: "cleartransation",
            generation: ProtocolGeneration::Legacy
        })
    ));
    assert!(matches!(
        client.reload(None).await,
        Err(ControlError::Unsupported { .. })
    ));
    assert!(matches!(
        client.commit_with_fresh_hash().await,
        Err(ControlError::Unsupported { .. })
    ));

    assert_eq!(daemon.connection_count(), 0);
}
