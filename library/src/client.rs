use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use peer_signal_protocol::{IceCandidate, SignalMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::engine::TransportEngine;
use crate::negotiation::Negotiation;

const DEADLINE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a single [`PeerClient::step`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Step {
    /// Something was processed, keep stepping
    Continue,
    /// The relay closed the connection
    Closed,
}

/// Connection of one [`Negotiation`] to a signaling relay.
///
/// Inbound frames are fed to the negotiation and its replies sent back,
/// candidates discovered locally by the engine are forwarded as they appear.
pub struct PeerClient<E> {
    negotiation: Negotiation<E>,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    deadline: Interval,
}

impl<E: TransportEngine> PeerClient<E> {
    /// Dial the relay at `relay_url`, announcing the negotiation's identity.
    ///
    /// # Errors
    /// This function errs if the `WebSocket` handshake with the relay fails.
    pub async fn connect(relay_url: &str, negotiation: Negotiation<E>) -> anyhow::Result<Self> {
        let separator = if relay_url.contains('?') { '&' } else { '?' };
        let url = format!("{relay_url}{separator}uuid={}", negotiation.local_id());
        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect to signaling relay on {relay_url}"))?;
        info!("{} connected to signaling relay", negotiation.local_id());

        let mut deadline = interval(DEADLINE_CHECK_INTERVAL);
        deadline.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            negotiation,
            stream,
            deadline,
        })
    }

    /// The negotiation driven by this client.
    pub fn negotiation(&self) -> &Negotiation<E> {
        &self.negotiation
    }

    /// Mutable access, e.g. to reset a failed session.
    pub fn negotiation_mut(&mut self) -> &mut Negotiation<E> {
        &mut self.negotiation
    }

    /// Create the local offer and send it to the relay.
    ///
    /// # Errors
    /// Negotiation refused to start or the frame could not be sent.
    pub async fn start_as_caller(&mut self) -> anyhow::Result<()> {
        let offer = self.negotiation.start()?;
        self.send(&offer).await
    }

    /// Wait for the next inbound frame, local candidate or deadline tick and process it.
    ///
    /// # Errors
    /// Only transport failures of the relay connection, negotiation failures are logged
    /// and leave the session `Failed`.
    pub async fn step(
        &mut self,
        local_candidates: &mut mpsc::UnboundedReceiver<IceCandidate>,
    ) -> anyhow::Result<Step> {
        tokio::select! {
            frame = self.stream.next() => match frame {
                None => Ok(Step::Closed),
                Some(Err(err)) => Err(err).context("signaling relay connection failed"),
                Some(Ok(Message::Text(text))) => {
                    self.on_frame(&text).await?;
                    Ok(Step::Continue)
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(
                        "{}: relay closed the connection: {:?}",
                        self.negotiation.local_id(),
                        frame
                    );
                    Ok(Step::Closed)
                }
                Some(Ok(other)) => {
                    debug!("{}: ignoring non-text frame {:?}", self.negotiation.local_id(), other);
                    Ok(Step::Continue)
                }
            },
            Some(candidate) = local_candidates.recv() => {
                let message = self.negotiation.local_candidate(candidate);
                self.send(&message).await?;
                Ok(Step::Continue)
            }
            _ = self.deadline.tick() => {
                if let Err(err) = self.negotiation.check_deadline(Instant::now()) {
                    error!("{}: {}", self.negotiation.local_id(), err);
                }
                Ok(Step::Continue)
            }
        }
    }

    /// Step until the relay closes the connection, handing the negotiation back.
    ///
    /// # Errors
    /// Transport failures of the relay connection.
    pub async fn run(
        mut self,
        mut local_candidates: mpsc::UnboundedReceiver<IceCandidate>,
    ) -> anyhow::Result<Negotiation<E>> {
        while self.step(&mut local_candidates).await? == Step::Continue {}
        Ok(self.negotiation)
    }

    /// Close the relay connection.
    ///
    /// # Errors
    /// The close frame could not be sent.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn on_frame(&mut self, text: &str) -> anyhow::Result<()> {
        let message = match SignalMessage::decode(text) {
            Ok(message) => message,
            Err(err) => {
                warn!("{}: dropping frame: {}", self.negotiation.local_id(), err);
                return Ok(());
            }
        };
        match self.negotiation.handle(message) {
            Ok(replies) => {
                for reply in replies {
                    self.send(&reply).await?;
                }
            }
            Err(err) => error!("{}: {}", self.negotiation.local_id(), err),
        }
        Ok(())
    }

    async fn send(&mut self, message: &SignalMessage) -> anyhow::Result<()> {
        let frame = message.encode()?;
        self.stream
            .send(Message::Text(frame))
            .await
            .context("failed to send frame to signaling relay")
    }
}
