// tests/integration/rpc_test.rs

use super::test_helpers::{TestMaster, init_tracing};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use quillmaster::core::MasterError;
use quillmaster::core::protocol::frame::{self, rpc_codec};
use quillmaster::core::protocol::messages::{
    MASTER_SERVICE, PING, PingRequest, PingResponse, RpcReply, RpcRequest, RpcResponse,
};
use quillmaster::core::protocol::{HostPort, PeerRole};
use quillmaster::core::transport::{MasterProxy, RpcServer, RpcService};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

struct EchoService;

#[async_trait]
impl RpcService for EchoService {
    fn service_name(&self) -> &'static str {
        "echo"
    }

    async fn handle(&self, method: &str, payload: &[u8]) -> Result<Vec<u8>, MasterError> {
        match method {
            "Echo" => Ok(payload.to_vec()),
            other => Err(MasterError::NotFound(format!("unknown method '{other}'"))),
        }
    }
}

async fn serving_echo_server() -> (RpcServer, HostPort) {
    init_tracing();
    let server = RpcServer::new(vec![HostPort::new("127.0.0.1", 0)]).unwrap();
    server.register_service(Arc::new(EchoService)).unwrap();
    server.bind().await.unwrap();
    server.serve().unwrap();
    let addr = HostPort::from_socket_addr(server.bound_addresses().unwrap()[0]);
    (server, addr)
}

#[tokio::test]
async fn test_unknown_service_and_method_are_remote_errors() {
    let (server, addr) = serving_echo_server().await;
    let proxy = MasterProxy::new(addr, Duration::from_secs(2));

    let echoed: String = proxy
        .call("echo", "Echo", &"hello".to_string())
        .await
        .unwrap();
    assert_eq!(echoed, "hello");

    let err = proxy
        .call::<_, String>("nope", "Echo", &"x".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, MasterError::ServiceUnavailable(_)));

    let err = proxy
        .call::<_, String>("echo", "Shout", &"x".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, MasterError::NotFound(_)));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_calls_after_deregistration_are_service_unavailable() {
    let (server, addr) = serving_echo_server().await;
    let proxy = MasterProxy::new(addr, Duration::from_secs(2));

    server.unregister_all_services();
    assert!(server.registered_services().is_empty());
    let err = proxy
        .call::<_, String>("echo", "Echo", &"x".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, MasterError::ServiceUnavailable(_)));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_server_phases_are_enforced() {
    let server = RpcServer::new(vec![HostPort::new("127.0.0.1", 0)]).unwrap();
    assert!(matches!(
        server.bound_addresses(),
        Err(MasterError::NotReady(_))
    ));
    assert!(matches!(server.serve(), Err(MasterError::IllegalState(_))));

    server.register_service(Arc::new(EchoService)).unwrap();
    assert!(matches!(
        server.register_service(Arc::new(EchoService)),
        Err(MasterError::IllegalState(_))
    ));

    server.bind().await.unwrap();
    assert!(matches!(
        server.bind().await,
        Err(MasterError::IllegalState(_))
    ));
    server.serve().unwrap();

    let err = server
        .register_service(Arc::new(EchoService))
        .unwrap_err();
    assert!(matches!(err, MasterError::IllegalState(_)));

    server.shutdown().await.unwrap();
    // A second shutdown is a no-op.
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_empty_bind_list_is_rejected() {
    assert!(matches!(
        RpcServer::new(vec![]),
        Err(MasterError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_connection_carries_many_requests() {
    let test = TestMaster::started().await;
    let stream = TcpStream::connect(test.rpc_addr()).await.unwrap();
    let mut framed = Framed::new(stream, rpc_codec());

    for call_id in [11u64, 12, 13] {
        let request = RpcRequest {
            call_id,
            service: MASTER_SERVICE.to_string(),
            method: PING.to_string(),
            payload: frame::encode(&PingRequest {}).unwrap(),
        };
        framed
            .send(Bytes::from(frame::encode(&request).unwrap()))
            .await
            .unwrap();
        let reply = framed.next().await.unwrap().unwrap();
        let response: RpcResponse = frame::decode(&reply).unwrap();
        assert_eq!(response.call_id, call_id);
        match response.reply {
            RpcReply::Ok(bytes) => {
                let _: PingResponse = frame::decode(&bytes).unwrap();
            }
            RpcReply::Err(e) => panic!("unexpected remote error: {e}"),
        }
    }

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_master_services_after_shutdown_are_unreachable() {
    let test = TestMaster::started().await;
    let proxy = MasterProxy::new(test.rpc_host_port(), Duration::from_millis(500));
    proxy.ping().await.unwrap();

    test.master.shutdown().await;
    assert!(proxy.ping().await.is_err());
}

#[tokio::test]
async fn test_consensus_state_reports_role_and_leadership() {
    let test = TestMaster::started().await;
    let proxy = MasterProxy::new(test.rpc_host_port(), Duration::from_secs(2));

    let state = proxy.get_consensus_state().await.unwrap();
    assert_eq!(state.instance_id.permanent_uuid, test.master.instance().uuid());
    assert_eq!(state.role, PeerRole::Follower);
    assert!(state.leader_status.is_some());

    test.catalog.become_leader();
    let state = proxy.get_consensus_state().await.unwrap();
    assert_eq!(state.role, PeerRole::Leader);
    assert!(state.leader_status.is_none());

    test.master.shutdown().await;
}

#[tokio::test]
async fn test_tablet_copy_waits_for_catalog() {
    let test = TestMaster::build(|c| c.gated(), |_| {});
    test.master.start_async().await.unwrap();
    let proxy = MasterProxy::new(test.rpc_host_port(), Duration::from_secs(2));

    let err = proxy.begin_tablet_copy_session("peer-1").await.unwrap_err();
    assert!(matches!(err, MasterError::NotReady(_)));

    test.catalog.release_init();
    test.master
        .wait_for_catalog_init(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    let session = proxy.begin_tablet_copy_session("peer-1").await.unwrap();
    assert_eq!(session.session_id.len(), 32);
    assert_eq!(session.source.permanent_uuid, test.master.instance().uuid());

    test.master.shutdown().await;
}
