//! End-to-end tests for the relay gateway.
//!
//! A fake upstream server and a fake client talk through a real `Gateway`
//! bound on loopback.

mod common;

use bytes::BytesMut;
use common::FramedPeer;
use mcshim::config::ListenConfig;
use mcshim::intercept::{HandlerRegistry, KindFilter, KindTag};
use mcshim::network::{Gateway, Handshake};
use mcshim::proxy::ProxyDeps;
use mcshim::scheduler::{DeferredTaskScheduler, spawn_tick_task};
use mcshim_proto::wire::put_string;
use mcshim_proto::{FieldAccessor, OutboundMessage, ProtocolVersion, tables};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A running gateway in front of an upstream listener the test controls.
struct Relay {
    gateway: SocketAddr,
    upstream: TcpListener,
    shutdown: CancellationToken,
}

impl Relay {
    async fn start(registry: Arc<HandlerRegistry>) -> Self {
        tables::init().expect("built-in tables");
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listen = ListenConfig {
            address: "127.0.0.1:0".parse().unwrap(),
            upstream: upstream.local_addr().unwrap(),
        };

        let shutdown = CancellationToken::new();
        let (scheduler, driver) = DeferredTaskScheduler::new();
        spawn_tick_task(driver, Duration::from_millis(50), shutdown.child_token());

        let gateway = Gateway::bind(&listen, 16, ProxyDeps::new(registry, scheduler))
            .await
            .unwrap();
        let addr = gateway.local_addr().unwrap();
        tokio::spawn(gateway.run(shutdown.child_token()));

        Self {
            gateway: addr,
            upstream,
            shutdown,
        }
    }

    /// Connect a client, send its handshake, and accept the upstream side.
    async fn connect(&self, protocol: i32, next_state: i32) -> (FramedPeer, FramedPeer) {
        let mut client = FramedPeer::connect(self.gateway).await.unwrap();
        let handshake = Handshake {
            protocol,
            address: "localhost".into(),
            port: 25565,
            next_state,
        };
        client.send_frame(handshake.encode()).await.unwrap();

        let (stream, _) = self.upstream.accept().await.unwrap();
        let mut server = FramedPeer::new(stream);
        let relayed = Handshake::parse(&server.recv_frame().await.unwrap()).unwrap();
        assert_eq!(relayed, handshake);
        (client, server)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Run login start / login success between the two peers.
async fn login(client: &mut FramedPeer, server: &mut FramedPeer, name: &str) -> Uuid {
    let mut start = BytesMut::new();
    put_string(&mut start, name);
    client.send_packet(0x00, &start).await.unwrap();
    let (id, _) = server.recv_packet().await.unwrap();
    assert_eq!(id, 0x00);

    let uuid = Uuid::from_u128(0x1234_5678);
    let mut success = BytesMut::new();
    put_string(&mut success, &uuid.hyphenated().to_string());
    put_string(&mut success, name);
    server.send_packet(0x02, &success).await.unwrap();
    let (id, _) = client.recv_packet().await.unwrap();
    assert_eq!(id, 0x02);
    uuid
}

fn frame_of(msg: &OutboundMessage) -> bytes::Bytes {
    let mut frame = BytesMut::new();
    msg.encode(&mut frame);
    frame.freeze()
}

fn censoring_registry() -> Arc<HandlerRegistry> {
    let registry = Arc::new(HandlerRegistry::new());
    registry.register("censor", KindFilter::only(KindTag::Chat), |ctx| {
        Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, "***"))?)
    });
    registry
}

#[tokio::test]
async fn test_play_chat_rewritten() {
    let relay = Relay::start(censoring_registry()).await;
    let (mut client, mut server) = relay.connect(340, 2).await;
    login(&mut client, &mut server, "Steve").await;

    tables::init().unwrap();
    let acc = FieldAccessor::for_version(ProtocolVersion::V1_12_R1).unwrap();
    server
        .send_frame(frame_of(&acc.chat(r#"{"text":"hunter2"}"#, 0)))
        .await
        .unwrap();

    let frame = client.recv_frame().await.unwrap();
    let msg = OutboundMessage::decode(ProtocolVersion::V1_12_R1, frame).unwrap();
    assert_eq!(acc.read_plain_text(&msg).unwrap(), "***");
    assert_eq!(acc.read_chat_position(&msg).unwrap(), 0);

    // Serverbound chat is never touched.
    let mut chat = BytesMut::new();
    put_string(&mut chat, "hello");
    client.send_packet(0x02, &chat).await.unwrap();
    let (id, body) = server.recv_packet().await.unwrap();
    assert_eq!(id, 0x02);
    assert_eq!(&body[..], &chat[..]);
}

#[tokio::test]
async fn test_uninteresting_play_packets_pass_through() {
    let relay = Relay::start(censoring_registry()).await;
    let (mut client, mut server) = relay.connect(47, 2).await;
    login(&mut client, &mut server, "Alex").await;

    // 1.8 Keep Alive.
    server.send_packet(0x00, &[0x2A]).await.unwrap();
    let (id, body) = client.recv_packet().await.unwrap();
    assert_eq!(id, 0x00);
    assert_eq!(&body[..], &[0x2A]);
}

#[tokio::test]
async fn test_status_request_relayed_raw() {
    let relay = Relay::start(censoring_registry()).await;
    let (mut client, mut server) = relay.connect(340, 1).await;

    client.send_packet(0x00, &[]).await.unwrap();
    let (id, _) = server.recv_packet().await.unwrap();
    assert_eq!(id, 0x00);

    let mut response = BytesMut::new();
    put_string(&mut response, r#"{"description":{"text":"A Minecraft Server"}}"#);
    server.send_packet(0x00, &response).await.unwrap();
    let (id, body) = client.recv_packet().await.unwrap();
    assert_eq!(id, 0x00);
    assert_eq!(&body[..], &response[..]);
}

#[tokio::test]
async fn test_unsupported_version_not_intercepted() {
    let relay = Relay::start(censoring_registry()).await;
    let (mut client, mut server) = relay.connect(404, 2).await;
    login(&mut client, &mut server, "Notch").await;

    // Same packet id as 1.12 chat; without interception the body is intact.
    let mut body = BytesMut::new();
    put_string(&mut body, r#"{"text":"hunter2"}"#);
    body.extend_from_slice(&[0]);
    server.send_packet(0x0F, &body).await.unwrap();
    let (id, relayed) = client.recv_packet().await.unwrap();
    assert_eq!(id, 0x0F);
    assert_eq!(&relayed[..], &body[..]);
}

#[tokio::test]
async fn test_encryption_request_ends_session() {
    let relay = Relay::start(Arc::new(HandlerRegistry::new())).await;
    let (mut client, mut server) = relay.connect(110, 2).await;

    let mut start = BytesMut::new();
    put_string(&mut start, "Steve");
    client.send_packet(0x00, &start).await.unwrap();
    server.recv_packet().await.unwrap();

    let mut request = BytesMut::new();
    put_string(&mut request, "");
    server.send_packet(0x01, &request).await.unwrap();

    assert!(client.closed(Duration::from_secs(5)).await);
}
