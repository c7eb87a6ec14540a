use std::borrow::Cow;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use peer_signal_protocol::{Envelope, PeerId};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::registry::Outbox;
use crate::relay::Relay;

/// Serve one peer connection until it closes.
///
/// `claimed` is the identity the peer announced on upgrade. Without one the relay
/// makes one up for bookkeeping, and frames are then routed regardless of their `uuid`.
pub async fn peer_connected(
    ws: WebSocket,
    relay: Relay,
    claimed: Option<PeerId>,
    idle_timeout: Option<Duration>,
) {
    let enforce_identity = claimed.is_some();
    let identity = claimed.unwrap_or_else(PeerId::random);

    let (mut peer_ws_tx, mut peer_ws_rx) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel();

    if let Err(err) = relay.admit(identity.clone(), tx.clone()).await {
        warn!("rejecting peer {}: {}", identity, err);
        let close = Message::Close(err.close_code().map(|code| CloseFrame {
            code,
            reason: Cow::Owned(err.to_string()),
        }));
        if let Err(err) = peer_ws_tx.send(close).await {
            debug!("failed to send close frame to {}: {}", identity, err);
        }
        return;
    }
    info!("peer connected: {}", identity);

    let mut rx = UnboundedReceiverStream::new(rx);
    let writer_identity = identity.clone();
    let mut writer = tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            if let Err(err) = peer_ws_tx.send(message).await {
                error!("websocket send error (id={}): {}", writer_identity, err);
                break;
            }
        }
    });

    let reader = read_frames(
        &identity,
        enforce_identity,
        &mut peer_ws_rx,
        &relay,
        &tx,
        idle_timeout,
    );
    tokio::select! {
        () = reader => {}
        _ = &mut writer => {
            warn!("writer for {} stopped, closing the connection", identity);
        }
    }

    // the writer flushes whatever is queued, then ends with the last outbox handle
    relay.leave(&identity).await;
    drop(tx);
    info!("peer disconnected: {}", identity);
}

async fn read_frames(
    identity: &PeerId,
    enforce_identity: bool,
    peer_ws_rx: &mut SplitStream<WebSocket>,
    relay: &Relay,
    outbox: &Outbox,
    idle_timeout: Option<Duration>,
) {
    loop {
        let next = match idle_timeout {
            Some(limit) => {
                if let Ok(next) = timeout(limit, peer_ws_rx.next()).await {
                    next
                } else {
                    info!("peer {} idle for {:?}, closing", identity, limit);
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: Cow::Borrowed("idle timeout"),
                    }));
                    if outbox.send(close).is_err() {
                        debug!("writer for {} already stopped", identity);
                    }
                    return;
                }
            }
            None => peer_ws_rx.next().await,
        };

        let msg = match next {
            None => return,
            Some(Ok(msg)) => msg,
            Some(Err(err)) => {
                warn!("websocket error (id={}): {}", identity, err);
                return;
            }
        };

        match msg {
            Message::Text(text) => peer_message(identity, enforce_identity, &text, relay).await,
            Message::Binary(_) => {
                warn!("dropping binary frame from {}", identity);
                relay.record_dropped_frame();
            }
            Message::Close(_) => return,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

async fn peer_message(identity: &PeerId, enforce_identity: bool, frame: &str, relay: &Relay) {
    let envelope = match Envelope::decode(frame) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("dropping frame from {}: {}", identity, err);
            relay.record_dropped_frame();
            return;
        }
    };
    if enforce_identity && envelope.uuid != *identity {
        warn!(
            "dropping frame from {} claiming to come from {}",
            identity, envelope.uuid
        );
        relay.record_dropped_frame();
        return;
    }
    relay.route(identity, &envelope, frame).await;
}
