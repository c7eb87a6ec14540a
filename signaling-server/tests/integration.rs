use std::net::TcpListener;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use peer_signal::mock::MockEngine;
use peer_signal::{
    IceCandidate, Negotiation, NegotiationConfig, PeerClient, PeerId, Phase, Role,
    SessionDescription, SignalMessage,
};
use peer_signal_server::error::{CLOSE_DUPLICATE_IDENTITY, CLOSE_SESSION_FULL};
use peer_signal_server::{router, Relay, RelayMode, ServerState};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PATIENCE: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

fn spawn_relay(mode: RelayMode) -> (String, Relay) {
    spawn_relay_with_idle_timeout(mode, None)
}

fn spawn_relay_with_idle_timeout(
    mode: RelayMode,
    idle_timeout: Option<Duration>,
) -> (String, Relay) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let relay = Relay::new(mode);
    let app = router::create(ServerState::new(relay.clone(), idle_timeout));
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);

    (format!("ws://127.0.0.1:{port}/ws"), relay)
}

async fn wait_for_peers(relay: &Relay, count: usize) {
    timeout(PATIENCE, async {
        while relay.registry().len().await != count {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peers never registered");
}

async fn connect_as(url: &str, uuid: &str) -> Socket {
    let (socket, _) = connect_async(format!("{url}?uuid={uuid}").as_str())
        .await
        .expect("failed to connect to relay");
    socket
}

async fn next_text(socket: &mut Socket) -> String {
    loop {
        match timeout(PATIENCE, socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return text,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

async fn assert_quiet(socket: &mut Socket) {
    assert!(
        timeout(QUIET, socket.next()).await.is_err(),
        "unexpected frame"
    );
}

async fn close_code(socket: &mut Socket) -> u16 {
    match timeout(PATIENCE, socket.next()).await {
        Ok(Some(Ok(Message::Close(Some(frame))))) => frame.code.into(),
        other => panic!("expected a close frame, got {other:?}"),
    }
}

fn offer_frame(uuid: &str) -> String {
    SignalMessage::description(PeerId::new(uuid.to_owned()), SessionDescription::offer("v=0"))
        .encode()
        .unwrap()
}

#[tokio::test]
async fn offer_reaches_only_the_other_peer() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);
    let mut a = connect_as(&url, "aaa").await;
    let mut b = connect_as(&url, "bbb").await;
    wait_for_peers(&relay, 2).await;

    let frame = offer_frame("aaa");
    a.send(Message::Text(frame.clone())).await.unwrap();

    assert_eq!(next_text(&mut b).await, frame);
    assert_quiet(&mut a).await;
}

#[tokio::test]
async fn broadcast_fans_out_to_all_but_the_sender() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);
    let mut sender = connect_as(&url, "p0").await;
    let mut receivers = Vec::new();
    for i in 1..4 {
        receivers.push(connect_as(&url, &format!("p{i}")).await);
    }
    wait_for_peers(&relay, 4).await;

    let frame = offer_frame("p0");
    sender.send(Message::Text(frame.clone())).await.unwrap();
    for receiver in &mut receivers {
        assert_eq!(next_text(receiver).await, frame);
    }
    assert_quiet(&mut sender).await;
}

#[tokio::test]
async fn bad_frames_are_dropped_without_closing() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);
    let mut a = connect_as(&url, "aaa").await;
    let mut b = connect_as(&url, "bbb").await;
    wait_for_peers(&relay, 2).await;

    a.send(Message::Text("not json".to_owned())).await.unwrap();
    a.send(Message::Text(r#"{"uuid":"aaa"}"#.to_owned()))
        .await
        .unwrap();
    // identity mismatch with the one announced on connect
    a.send(Message::Text(offer_frame("bbb"))).await.unwrap();
    let frame = offer_frame("aaa");
    a.send(Message::Text(frame.clone())).await.unwrap();

    assert_eq!(next_text(&mut b).await, frame);
    assert_eq!(relay.stats().await.dropped_frames, 3);
    assert_eq!(relay.registry().len().await, 2);
}

#[tokio::test]
async fn payloads_peers_cannot_parse_are_still_relayed() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);
    let mut a = connect_as(&url, "aaa").await;
    let mut b = connect_as(&url, "bbb").await;
    wait_for_peers(&relay, 2).await;

    let frames = [
        r#"{"sdp":{"type":"pranswer","sdp":"v=0"},"uuid":"aaa"}"#,
        r#"{"ice":{"candidate":"c","sdpMid":0},"uuid":"aaa"}"#,
        r#"{"ice":{"candidate":"c","sdpMLineIndex":70000},"uuid":"aaa"}"#,
    ];
    for frame in frames {
        a.send(Message::Text(frame.to_owned())).await.unwrap();
        assert_eq!(next_text(&mut b).await, frame);
    }

    let stats = relay.stats().await;
    assert_eq!(stats.dropped_frames, 0);
    assert_eq!((stats.other_descriptions, stats.candidates), (1, 2));
}

#[tokio::test]
async fn silent_peer_is_closed_after_idle_timeout() {
    let (url, relay) =
        spawn_relay_with_idle_timeout(RelayMode::Broadcast, Some(Duration::from_millis(200)));
    let mut silent = connect_as(&url, "aaa").await;

    assert_eq!(close_code(&mut silent).await, u16::from(CloseCode::Away));
    wait_for_peers(&relay, 0).await;
    assert!(matches!(
        timeout(PATIENCE, silent.next()).await,
        Ok(None | Some(Err(_)))
    ));
}

#[tokio::test]
async fn duplicate_identity_is_refused() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);
    let _a = connect_as(&url, "aaa").await;
    wait_for_peers(&relay, 1).await;

    let mut impostor = connect_as(&url, "aaa").await;
    assert_eq!(close_code(&mut impostor).await, CLOSE_DUPLICATE_IDENTITY);
    assert_eq!(relay.registry().len().await, 1);
}

#[tokio::test]
async fn targeted_mode_refuses_a_third_peer() {
    let (url, relay) = spawn_relay(RelayMode::Targeted);
    let _a = connect_as(&url, "aaa").await;
    let _b = connect_as(&url, "bbb").await;
    wait_for_peers(&relay, 2).await;

    let mut c = connect_as(&url, "ccc").await;
    assert_eq!(close_code(&mut c).await, CLOSE_SESSION_FULL);
}

#[tokio::test]
async fn disconnect_unregisters_the_peer() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);
    let mut a = connect_as(&url, "aaa").await;
    let _b = connect_as(&url, "bbb").await;
    wait_for_peers(&relay, 2).await;

    a.close(None).await.unwrap();
    wait_for_peers(&relay, 1).await;
    assert_eq!(
        relay.registry().identities().await,
        [PeerId::new("bbb".to_owned())]
    );
}

#[tokio::test]
async fn peers_negotiate_through_the_relay() {
    let (url, relay) = spawn_relay(RelayMode::Broadcast);

    let caller = Negotiation::new(
        PeerId::new("aaa".to_owned()),
        MockEngine::new("caller"),
        NegotiationConfig::default(),
    );
    let callee = Negotiation::reactive(
        PeerId::new("bbb".to_owned()),
        MockEngine::new("callee"),
        NegotiationConfig::default(),
    );
    let mut caller = PeerClient::connect(&url, caller).await.unwrap();
    let mut callee = PeerClient::connect(&url, callee).await.unwrap();
    wait_for_peers(&relay, 2).await;

    // the callee's engine discovers a candidate before any offer exists
    let (callee_candidates_tx, mut callee_candidates) = mpsc::unbounded_channel();
    callee_candidates_tx
        .send(IceCandidate::new("callee-host"))
        .unwrap();
    let (_caller_candidates_tx, mut caller_candidates) = mpsc::unbounded_channel();

    let callee = tokio::spawn(async move {
        while callee.negotiation().phase() != Phase::Connected {
            callee.step(&mut callee_candidates).await.unwrap();
        }
        callee
    });

    let caller = tokio::spawn(async move {
        while caller.negotiation().pending_candidates().is_empty() {
            caller.step(&mut caller_candidates).await.unwrap();
        }
        caller.start_as_caller().await.unwrap();
        while caller.negotiation().phase() != Phase::Connected {
            caller.step(&mut caller_candidates).await.unwrap();
        }
        caller
    });

    let caller = timeout(PATIENCE, caller).await.unwrap().unwrap();
    let callee = timeout(PATIENCE, callee).await.unwrap().unwrap();

    assert_eq!(caller.negotiation().role(), Role::Caller);
    assert_eq!(callee.negotiation().role(), Role::Callee);
    assert_eq!(
        caller.negotiation().engine().applied_candidates(),
        ["callee-host"]
    );
    assert_eq!(
        callee
            .negotiation()
            .engine()
            .remote_description()
            .map(|d| d.sdp.as_str()),
        Some("offer from caller")
    );

    let stats = relay.stats().await;
    assert_eq!((stats.offers, stats.answers, stats.candidates), (1, 1, 1));
}
