// tests/integration/web_test.rs

use super::test_helpers::{
    MockCatalog, TestMaster, http_get, https_get, test_config, use_test_tls,
};
use quillmaster::core::instance::InstanceMetadata;
use quillmaster::core::protocol::HostPort;
use quillmaster::core::registration::RegistrationDescriptor;
use quillmaster::core::{Master, MasterError};
use reqwest::StatusCode;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_registration_endpoint_serves_descriptor() {
    let test = TestMaster::started().await;
    let response = http_get(test.http_addr(), "/api/v1/registration").await;
    assert_eq!(response.status(), StatusCode::OK);

    let served: RegistrationDescriptor = response.json().await.unwrap();
    assert_eq!(served, test.master.get_registration().unwrap());
    assert!(!served.https_enabled);

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_masters_endpoint_lists_self() {
    let test = TestMaster::started().await;
    let response = http_get(test.http_addr(), "/api/v1/masters").await;
    assert_eq!(response.status(), StatusCode::OK);

    let value: serde_json::Value = response.json().await.unwrap();
    let masters = value["masters"].as_array().unwrap();
    assert_eq!(masters.len(), 1);
    assert_eq!(
        masters[0]["instance_id"]["permanent_uuid"],
        test.master.instance().uuid()
    );
    assert_eq!(masters[0]["role"], "LEADER");

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let test = TestMaster::started().await;

    let response = http_get(test.http_addr(), "/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = http_get(test.http_addr(), "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("quillmaster_lifecycle_state")
    );

    let response = http_get(test.http_addr(), "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_https_endpoint_serves_registration() {
    let test = TestMaster::build(|c| c, use_test_tls);
    test.master
        .start(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    let registration = test.master.get_registration().unwrap();
    assert!(registration.https_enabled);
    assert_eq!(registration.http_addresses.len(), 1);

    let response = https_get(test.http_addr(), "/api/v1/registration").await;
    assert_eq!(response.status(), StatusCode::OK);
    let served: RegistrationDescriptor = response.json().await.unwrap();
    assert_eq!(served, registration);

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_silent_tls_client_does_not_block_others() {
    let test = TestMaster::build(|c| c, use_test_tls);
    test.master
        .start(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    // Connects but never starts the handshake.
    let _silent = tokio::net::TcpStream::connect(test.http_addr())
        .await
        .unwrap();

    let response = tokio::time::timeout(
        Duration::from_secs(3),
        https_get(test.http_addr(), "/healthz"),
    )
    .await
    .expect("HTTPS request was held up by an idle connection");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_disabled_webserver_publishes_no_http_addresses() {
    let test = TestMaster::build(|c| c, |config| config.webserver.enabled = false);
    test.master
        .start(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    let registration = test.master.get_registration().unwrap();
    assert!(registration.http_addresses.is_empty());
    assert!(!registration.https_enabled);
    assert!(test.master.http_addresses().is_err());

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_advertised_addresses_override_bound_ones() {
    let test = TestMaster::build(
        |c| c,
        |config| {
            config.rpc_advertised_addresses =
                vec![HostPort::new("master-1.example", 7051)];
        },
    );
    test.master
        .start(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    let registration = test.master.get_registration().unwrap();
    assert_eq!(registration.rpc_addresses.len(), 1);
    assert_eq!(registration.rpc_addresses[0].host, "master-1.example");
    assert_eq!(registration.rpc_addresses[0].port, 7051);

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_tls_material_fails_init() {
    let mut bogus = tempfile::NamedTempFile::new().unwrap();
    writeln!(bogus, "not a pem file").unwrap();
    let path = bogus.path().display().to_string();

    let data_dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config(&data_dir);
    config.webserver.tls_cert_path = Some(path.clone());
    config.webserver.tls_key_path = Some(path);

    let instance = InstanceMetadata::load_or_create(data_dir.path()).unwrap();
    let catalog = Arc::new(MockCatalog::new(instance.instance.clone()));
    let master = Master::new(config, instance, catalog);
    let err = master.init().unwrap_err();
    assert!(matches!(err, MasterError::InvalidConfig(_)));
    assert!(err.to_string().contains("No certificates found"));
}
