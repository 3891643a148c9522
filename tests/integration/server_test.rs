// tests/integration/server_test.rs

use super::test_helpers::TestMaster;
use quillmaster::core::MasterError;
use quillmaster::core::lifecycle::LifecycleState;
use quillmaster::core::transport::MasterProxy;
use quillmaster::server::supervise;
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_failed_catalog_keeps_master_serving_until_shutdown() {
    let test = TestMaster::build(
        |c| c.failing(MasterError::IoString("sys catalog unreadable".to_string())),
        |_| {},
    );
    test.master.start_async().await.unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let supervisor = supervise(&test.master, async {
        let _ = stop_rx.await;
    });
    tokio::pin!(supervisor);

    // The catalog fails right away, yet the supervisor keeps running.
    let still_running = tokio::time::timeout(Duration::from_millis(300), &mut supervisor).await;
    assert!(still_running.is_err());
    assert!(test.master.wait_for_catalog_init(None).await.is_err());
    assert_eq!(test.master.state(), LifecycleState::Running);

    let proxy = MasterProxy::new(test.rpc_host_port(), Duration::from_secs(2));
    let response = proxy.get_master_registration().await.unwrap();
    assert!(response.error.is_none());
    assert!(response.registration.is_some());

    stop_tx.send(()).unwrap();
    supervisor.await;
    assert_eq!(test.master.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_shutdown_before_catalog_init_finishes() {
    let test = TestMaster::build(|c| c.gated(), |_| {});
    test.master.start_async().await.unwrap();

    let supervisor = supervise(&test.master, async {});
    let catalog = test.catalog.clone();
    // The init task is never cancelled mid-flight, so let it finish once
    // shutdown has begun.
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        catalog.release_init();
    });

    tokio::time::timeout(Duration::from_secs(5), supervisor)
        .await
        .unwrap();
    release.await.unwrap();
    assert_eq!(test.master.state(), LifecycleState::Stopped);
}
