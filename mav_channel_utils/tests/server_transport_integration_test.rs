// mav_channel_utils/tests/server_transport_integration_test.rs

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{info, LevelFilter};
use mav_channel_utils::client::transport::{connect_tcp, WsClientConnection};
use mav_channel_utils::server::transport::ServerTransport;
use mav_channel_utils::{ChannelError, MavChannel, MavPacket, TcpChannel};
use mavlink::common::{
    MavCmd, MavMessage, COMMAND_LONG_DATA, HEARTBEAT_DATA, MISSION_COUNT_DATA,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

const WAIT: Duration = Duration::from_secs(5);

fn init_test_logger() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Info)
        .is_test(true)
        .try_init();
}

fn arm_command() -> MavPacket {
    MavPacket::from_ids(
        255,
        190,
        MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            command: MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            param1: 1.0,
            target_system: 1,
            target_component: 1,
            ..Default::default()
        }),
    )
}

fn heartbeat() -> MavPacket {
    MavPacket::from_ids(1, 1, MavMessage::HEARTBEAT(HEARTBEAT_DATA::default()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tcp_channel_exchanges_packets_both_ways() {
    init_test_logger();

    let (listener, addr) = ServerTransport::bind("127.0.0.1:0".parse().expect("addr"))
        .await
        .expect("bind");
    let accept = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.expect("accept");
        TcpChannel::with_peer(stream, peer)
    });

    let client = connect_tcp(addr).await.expect("connect");
    let server = timeout(WAIT, accept).await.expect("accept timed out").expect("join");
    info!("[Test] {} <-> {}", client.describe(), server.describe());

    client.send_message(arm_command()).await.expect("client send");
    let received = timeout(WAIT, server.receive_message())
        .await
        .expect("server receive timed out")
        .expect("server receive")
        .expect("packet");
    assert_eq!(received, arm_command());

    server.send_message(heartbeat()).await.expect("server send");
    let received = timeout(WAIT, client.receive_message())
        .await
        .expect("client receive timed out")
        .expect("client receive")
        .expect("packet");
    assert_eq!(received.name(), "HEARTBEAT");
}

#[tokio::test]
async fn test_tcp_channel_reassembles_fragmented_frames() {
    init_test_logger();

    let (listener, addr) = ServerTransport::bind("127.0.0.1:0".parse().expect("addr"))
        .await
        .expect("bind");

    let writer = tokio::spawn(async move {
        let mut raw = TcpStream::connect(addr).await.expect("connect");
        let mut bytes = arm_command().encode().expect("encode");
        bytes.extend(
            MavPacket::from_ids(
                255,
                190,
                MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
                    count: 2,
                    target_system: 1,
                    target_component: 1,
                    ..Default::default()
                }),
            )
            .encode()
            .expect("encode"),
        );
        // The first write ends in the middle of the second frame.
        let split = bytes.len() - 4;
        raw.write_all(&bytes[..split]).await.expect("write head");
        raw.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;
        raw.write_all(&bytes[split..]).await.expect("write tail");
        raw
    });

    let (stream, peer) = listener.accept().await.expect("accept");
    let server = TcpChannel::with_peer(stream, peer);

    let first = timeout(WAIT, server.receive_message())
        .await
        .expect("timed out")
        .expect("receive")
        .expect("packet");
    let second = timeout(WAIT, server.receive_message())
        .await
        .expect("timed out")
        .expect("receive")
        .expect("packet");
    assert_eq!(first.name(), "COMMAND_LONG");
    assert_eq!(second.name(), "MISSION_COUNT");

    drop(writer.await.expect("join"));
}

#[tokio::test]
async fn test_tcp_channel_reports_peer_disconnect_as_closed() {
    init_test_logger();

    let (listener, addr) = ServerTransport::bind("127.0.0.1:0".parse().expect("addr"))
        .await
        .expect("bind");
    let client = TcpStream::connect(addr).await.expect("connect");
    let (stream, peer) = listener.accept().await.expect("accept");
    let server = TcpChannel::with_peer(stream, peer);

    drop(client);
    let err = timeout(WAIT, server.receive_message())
        .await
        .expect("timed out")
        .unwrap_err();
    assert!(err.is_fatal(), "unexpected error: {err}");
}

/// Echoes every binary message back, the way a gateway session would answer.
async fn run_echo_server(listener: tokio::net::TcpListener) {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws_stream = accept_async(stream).await.expect("handshake");
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            TungsteniteMessage::Binary(bytes) => {
                if ws_stream.send(TungsteniteMessage::Binary(bytes)).await.is_err() {
                    break;
                }
            }
            TungsteniteMessage::Close(_) => break,
            _ => {}
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ws_client_round_trip_through_echo_server() {
    init_test_logger();

    let (listener, addr) = ServerTransport::bind("127.0.0.1:0".parse().expect("addr"))
        .await
        .expect("bind");
    let server = tokio::spawn(run_echo_server(listener));

    let mut client = WsClientConnection::connect(&format!("ws://{}/ws", addr))
        .await
        .expect("connect");

    client.send_packet(&arm_command()).await.expect("send command");
    // Two frames in a single binary message.
    let mut batch = heartbeat().encode().expect("encode");
    batch.extend(heartbeat().encode().expect("encode"));
    client.send_raw(batch).await.expect("send batch");

    let mut names = Vec::new();
    for _ in 0..3 {
        let packet = timeout(WAIT, client.receive_packet())
            .await
            .expect("timed out")
            .expect("connection open")
            .expect("packet");
        names.push(packet.name());
    }
    assert_eq!(names, vec!["COMMAND_LONG", "HEARTBEAT", "HEARTBEAT"]);

    client.close().await.expect("close");
    let _ = timeout(WAIT, server).await;
}

#[tokio::test]
async fn test_ws_client_rejects_bad_url() {
    let result = WsClientConnection::connect("not a url").await;
    assert!(matches!(result, Err(ChannelError::InvalidUrl(_))));
}
