use std::collections::VecDeque;
use std::time::{Duration, Instant};

use peer_signal_protocol::IceCandidate;

use crate::error::NegotiationError;

/// Remote candidates received before the remote description, in arrival order.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    queue: VecDeque<(IceCandidate, Instant)>,
    capacity: Option<usize>,
}

impl CandidateBuffer {
    /// Buffer holding at most `capacity` candidates, unbounded on `None`.
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Append a candidate received at `at`.
    ///
    /// # Errors
    /// [`NegotiationError::CandidateOverflow`] when the buffer is full,
    /// the candidate is not stored.
    pub fn push(&mut self, candidate: IceCandidate, at: Instant) -> Result<(), NegotiationError> {
        if let Some(capacity) = self.capacity {
            if self.queue.len() >= capacity {
                return Err(NegotiationError::CandidateOverflow { capacity });
            }
        }
        self.queue.push_back((candidate, at));
        Ok(())
    }

    /// Take every buffered candidate, oldest first.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.queue.drain(..).map(|(candidate, _)| candidate).collect()
    }

    /// How long the oldest candidate has been waiting at `now`.
    #[must_use]
    pub fn oldest_wait(&self, now: Instant) -> Option<Duration> {
        self.queue
            .front()
            .map(|(_, at)| now.saturating_duration_since(*at))
    }

    /// Candidates currently waiting.
    pub fn iter(&self) -> impl Iterator<Item = &IceCandidate> {
        self.queue.iter().map(|(candidate, _)| candidate)
    }

    /// Number of candidates waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything without applying it.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
