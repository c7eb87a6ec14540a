use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use log::{debug, warn};
use peer_signal_protocol::{Envelope, FrameKind, PeerId};
use serde::Serialize;

use crate::error::Result;
use crate::registry::{Outbox, Registry};

/// Participants allowed at once in targeted mode.
pub const PAIRWISE_CAPACITY: usize = 2;

/// How the relay picks recipients.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Every frame goes to every other connected peer.
    #[default]
    Broadcast,
    /// Strictly two participants, a third connection is refused.
    Targeted,
}

#[derive(Debug, Default)]
struct Counters {
    offers: AtomicU64,
    answers: AtomicU64,
    other_descriptions: AtomicU64,
    candidates: AtomicU64,
    dropped_frames: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Snapshot of routing counters, served on `/stats`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelayStats {
    pub mode: RelayMode,
    pub connected: usize,
    pub offers: u64,
    pub answers: u64,
    pub other_descriptions: u64,
    pub candidates: u64,
    pub dropped_frames: u64,
    pub delivery_failures: u64,
}

/// Forwards signaling frames between the peers in its [`Registry`].
#[derive(Debug, Clone)]
pub struct Relay {
    registry: Registry,
    mode: RelayMode,
    counters: Arc<Counters>,
}

impl Relay {
    pub fn new(mode: RelayMode) -> Self {
        Self {
            registry: Registry::default(),
            mode,
            counters: Arc::default(),
        }
    }

    pub const fn mode(&self) -> RelayMode {
        self.mode
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a freshly accepted connection according to the relay mode.
    pub async fn admit(&self, identity: PeerId, outbox: Outbox) -> Result<()> {
        match self.mode {
            RelayMode::Broadcast => self.registry.register(identity, outbox).await,
            RelayMode::Targeted => {
                self.registry
                    .register_bounded(identity, outbox, PAIRWISE_CAPACITY)
                    .await
            }
        }
    }

    pub async fn leave(&self, identity: &PeerId) -> bool {
        self.registry.unregister(identity).await
    }

    /// Forward `frame`, the original text behind `envelope`, from the connection `sender`.
    ///
    /// Neither the sending connection nor any connection registered under the
    /// envelope's `uuid` receives it. Targets whose outbox is closed are evicted,
    /// the sender is not told. Returns the number of peers the frame was handed to.
    pub async fn route(&self, sender: &PeerId, envelope: &Envelope, frame: &str) -> usize {
        let counter = match envelope.kind {
            FrameKind::Offer => &self.counters.offers,
            FrameKind::Answer => &self.counters.answers,
            FrameKind::OtherDescription => &self.counters.other_descriptions,
            FrameKind::Candidate => &self.counters.candidates,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for (identity, outbox) in self.registry.targets(sender).await {
            if identity == envelope.uuid {
                continue;
            }
            if outbox.send(Message::Text(frame.to_owned())).is_ok() {
                delivered += 1;
            } else {
                warn!("delivery to {} failed, dropping the connection", identity);
                self.counters
                    .delivery_failures
                    .fetch_add(1, Ordering::Relaxed);
                self.registry.evict(&identity, &outbox).await;
            }
        }
        debug!(
            "{:?} from {} (uuid {}) delivered to {} peers",
            envelope.kind, sender, envelope.uuid,
            delivered
        );
        delivered
    }

    /// Count a frame that was dropped before routing.
    pub fn record_dropped_frame(&self) {
        self.counters.dropped_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            mode: self.mode,
            connected: self.registry.len().await,
            offers: self.counters.offers.load(Ordering::Relaxed),
            answers: self.counters.answers.load(Ordering::Relaxed),
            other_descriptions: self.counters.other_descriptions.load(Ordering::Relaxed),
            candidates: self.counters.candidates.load(Ordering::Relaxed),
            dropped_frames: self.counters.dropped_frames.load(Ordering::Relaxed),
            delivery_failures: self.counters.delivery_failures.load(Ordering::Relaxed),
        }
    }
}
