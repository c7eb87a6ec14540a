use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use peer_signal_protocol::{
    IceCandidate, Payload, PeerId, SdpType, SessionDescription, SignalMessage,
};

use crate::candidates::CandidateBuffer;
use crate::engine::TransportEngine;
use crate::error::{NegotiationError, Result};
use crate::glare::{self, GlareOutcome};

const DEFAULT_MAX_PENDING_CANDIDATES: usize = 64;
const DEFAULT_CANDIDATE_WAIT: Duration = Duration::from_secs(30);

/// Which side of the offer/answer exchange this peer plays.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    /// No offer sent or received yet
    Undetermined,
    /// Sent the offer
    Caller,
    /// Answered the remote offer
    Callee,
}

/// Negotiation progress of a single peer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// Fresh session, may start an offer
    Idle,
    /// Session created in reaction to the remote side, waiting for its offer
    RoleUndetermined,
    /// Local offer is being created and applied
    LocalOfferPending,
    /// Local offer sent, waiting for the answer
    AwaitingAnswer,
    /// Remote offer is being applied
    ReceivedOffer,
    /// Local answer produced
    AnswerSent,
    /// Both descriptions set
    Connected,
    /// Engine rejected something, nothing is processed until reset
    Failed,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Self::Idle => "idle",
            Self::RoleUndetermined => "role-undetermined",
            Self::LocalOfferPending => "local-offer-pending",
            Self::AwaitingAnswer => "awaiting-answer",
            Self::ReceivedOffer => "received-offer",
            Self::AnswerSent => "answer-sent",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Limits on candidates waiting for a remote description.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct NegotiationConfig {
    /// Fail the session when more candidates than this are pending, `None` for no limit.
    pub max_pending_candidates: Option<usize>,
    /// Fail the session when a candidate waits longer than this, `None` for no limit.
    pub candidate_wait: Option<Duration>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_pending_candidates: Some(DEFAULT_MAX_PENDING_CANDIDATES),
            candidate_wait: Some(DEFAULT_CANDIDATE_WAIT),
        }
    }
}

/// One peer's local view of a pairwise negotiation.
///
/// Owned by exactly one task. Inbound messages go through [`Negotiation::handle`],
/// which returns the messages to send back through the relay.
#[derive(Debug)]
pub struct Negotiation<E> {
    local_id: PeerId,
    remote_id: Option<PeerId>,
    role: Role,
    phase: Phase,
    local_description_set: bool,
    remote_description_set: bool,
    pending: CandidateBuffer,
    config: NegotiationConfig,
    engine: E,
}

impl<E: TransportEngine> Negotiation<E> {
    /// Session that may become the caller through [`Negotiation::start`].
    pub fn new(local_id: PeerId, engine: E, config: NegotiationConfig) -> Self {
        Self::with_phase(local_id, engine, config, Phase::Idle)
    }

    /// Session created for a peer that only reacts to the remote side.
    pub fn reactive(local_id: PeerId, engine: E, config: NegotiationConfig) -> Self {
        Self::with_phase(local_id, engine, config, Phase::RoleUndetermined)
    }

    fn with_phase(local_id: PeerId, engine: E, config: NegotiationConfig, phase: Phase) -> Self {
        Self {
            local_id,
            remote_id: None,
            role: Role::Undetermined,
            phase,
            local_description_set: false,
            remote_description_set: false,
            pending: CandidateBuffer::new(config.max_pending_candidates),
            config,
            engine,
        }
    }

    /// Identity this session signs its messages with.
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Identity of the counterpart, bound on the first message received from it.
    pub fn remote_id(&self) -> Option<&PeerId> {
        self.remote_id.as_ref()
    }

    /// Current role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a local description has been applied.
    pub fn local_description_set(&self) -> bool {
        self.local_description_set
    }

    /// Whether a remote description has been applied.
    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// Remote candidates waiting for a remote description.
    pub fn pending_candidates(&self) -> &CandidateBuffer {
        &self.pending
    }

    /// The transport engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the transport engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Act as the caller: create and apply a local offer and return it for sending.
    ///
    /// # Errors
    /// [`NegotiationError::InvalidState`] unless the session is idle,
    /// [`NegotiationError::Engine`] if the engine refuses, which also fails the session.
    pub fn start(&mut self) -> Result<SignalMessage> {
        if !matches!(self.phase, Phase::Idle | Phase::RoleUndetermined) {
            return Err(NegotiationError::InvalidState {
                action: "start an offer",
                phase: self.phase,
            });
        }
        self.role = Role::Caller;
        self.transition(Phase::LocalOfferPending);
        let offer = self.engine_call("create an offer", E::create_offer)?;
        self.engine_call("set the local offer", |engine| {
            engine.set_local_description(&offer)
        })?;
        self.local_description_set = true;
        self.transition(Phase::AwaitingAnswer);
        Ok(SignalMessage::description(self.local_id.clone(), offer))
    }

    /// Process one inbound message and return what has to be sent in reply.
    ///
    /// Own messages echoed back by a broadcast relay, messages from a third peer and
    /// anything arriving on a failed session are ignored.
    ///
    /// # Errors
    /// Engine failures and candidate buffer overflow, the session is `Failed` afterwards.
    pub fn handle(&mut self, message: SignalMessage) -> Result<Vec<SignalMessage>> {
        let kind = message.kind();
        if message.uuid == self.local_id {
            return Ok(Vec::new());
        }
        if self.phase == Phase::Failed {
            warn!(
                "{}: ignoring {:?} from {} on failed session",
                self.local_id, kind, message.uuid
            );
            return Ok(Vec::new());
        }
        match self.remote_id {
            Some(ref remote) if *remote != message.uuid => {
                warn!(
                    "{}: ignoring {:?} from {}, already negotiating with {}",
                    self.local_id, kind, message.uuid, remote
                );
                return Ok(Vec::new());
            }
            Some(_) => {}
            None => self.remote_id = Some(message.uuid.clone()),
        }

        let SignalMessage { payload, uuid } = message;
        match payload {
            Payload::Candidate(candidate) => {
                self.remote_candidate(candidate)?;
                Ok(Vec::new())
            }
            Payload::Description(description) => match description.sdp_type {
                SdpType::Offer => self.remote_offer(&uuid, description),
                SdpType::Answer => {
                    self.remote_answer(description)?;
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Wrap a candidate the engine discovered locally for sending, in any phase.
    pub fn local_candidate(&self, candidate: IceCandidate) -> SignalMessage {
        SignalMessage::candidate(self.local_id.clone(), candidate)
    }

    /// Fail the session when buffered candidates have waited too long for a remote description.
    ///
    /// # Errors
    /// [`NegotiationError::CandidateTimeout`] once the configured wait is exceeded.
    pub fn check_deadline(&mut self, now: Instant) -> Result<()> {
        let Some(window) = self.config.candidate_wait else {
            return Ok(());
        };
        if self.phase == Phase::Failed || self.remote_description_set {
            return Ok(());
        }
        match self.pending.oldest_wait(now) {
            Some(waited) if waited > window => {
                Err(self.fail(NegotiationError::CandidateTimeout(window)))
            }
            _ => Ok(()),
        }
    }

    /// Return to `Idle` with a fresh engine, handing back the previous one.
    pub fn reset(&mut self, engine: E) -> E {
        info!("{}: resetting session from {}", self.local_id, self.phase);
        self.remote_id = None;
        self.role = Role::Undetermined;
        self.local_description_set = false;
        self.remote_description_set = false;
        self.pending.clear();
        self.transition(Phase::Idle);
        std::mem::replace(&mut self.engine, engine)
    }

    fn remote_offer(
        &mut self,
        remote: &PeerId,
        offer: SessionDescription,
    ) -> Result<Vec<SignalMessage>> {
        if self.phase == Phase::AwaitingAnswer {
            match glare::resolve(&self.local_id, remote) {
                GlareOutcome::Stand => {
                    info!(
                        "{}: glare with {}, keeping own offer",
                        self.local_id, remote
                    );
                    return Ok(Vec::new());
                }
                GlareOutcome::Yield => {
                    info!(
                        "{}: glare with {}, dropping own offer",
                        self.local_id, remote
                    );
                    self.engine_call("roll back the local offer", E::rollback)?;
                    self.local_description_set = false;
                }
            }
        }
        self.role = Role::Callee;

        self.transition(Phase::ReceivedOffer);
        self.engine_call("set the remote offer", |engine| {
            engine.set_remote_description(&offer)
        })?;
        self.remote_description_set = true;
        self.drain_pending()?;

        let answer = self.engine_call("create an answer", E::create_answer)?;
        self.engine_call("set the local answer", |engine| {
            engine.set_local_description(&answer)
        })?;
        self.local_description_set = true;
        self.transition(Phase::AnswerSent);
        self.transition(Phase::Connected);
        Ok(vec![SignalMessage::description(
            self.local_id.clone(),
            answer,
        )])
    }

    fn remote_answer(&mut self, answer: SessionDescription) -> Result<()> {
        if self.phase != Phase::AwaitingAnswer {
            warn!(
                "{}: ignoring answer from {:?} while {}",
                self.local_id, self.remote_id, self.phase
            );
            return Ok(());
        }
        self.engine_call("set the remote answer", |engine| {
            engine.set_remote_description(&answer)
        })?;
        self.remote_description_set = true;
        self.drain_pending()?;
        self.transition(Phase::Connected);
        Ok(())
    }

    fn remote_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if self.remote_description_set {
            return self.engine_call("add a remote candidate", |engine| {
                engine.add_ice_candidate(&candidate)
            });
        }
        if let Err(err) = self.pending.push(candidate, Instant::now()) {
            return Err(self.fail(err));
        }
        debug!(
            "{}: buffered candidate, {} pending until remote description",
            self.local_id,
            self.pending.len()
        );
        Ok(())
    }

    fn drain_pending(&mut self) -> Result<()> {
        let pending = self.pending.drain();
        if !pending.is_empty() {
            debug!(
                "{}: applying {} buffered candidates",
                self.local_id,
                pending.len()
            );
        }
        for candidate in pending {
            self.engine_call("add a buffered candidate", |engine| {
                engine.add_ice_candidate(&candidate)
            })?;
        }
        Ok(())
    }

    fn engine_call<T>(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&mut E) -> anyhow::Result<T>,
    ) -> Result<T> {
        call(&mut self.engine)
            .map_err(|source| {
                self.fail(NegotiationError::Engine { operation, source })
            })
    }

    fn fail(&mut self, err: NegotiationError) -> NegotiationError {
        error!("{}: negotiation failed: {}", self.local_id, err);
        self.pending.clear();
        self.transition(Phase::Failed);
        err
    }

    fn transition(&mut self, next: Phase) {
        debug!("{}: {} -> {}", self.local_id, self.phase, next);
        self.phase = next;
    }
}
