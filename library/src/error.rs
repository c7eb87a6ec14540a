use std::time::Duration;

use thiserror::Error;

use crate::negotiation::Phase;

/// Reasons a negotiation session can fail or refuse an operation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The transport engine rejected a description or candidate.
    #[error("transport engine failed to {operation}: {source:#}")]
    Engine {
        /// What the session asked the engine to do
        operation: &'static str,
        /// Error reported by the engine
        #[source]
        source: anyhow::Error,
    },

    /// Too many candidates arrived before any remote description.
    #[error("{capacity} candidates already pending without a remote description")]
    CandidateOverflow {
        /// Configured buffer capacity
        capacity: usize,
    },

    /// Buffered candidates waited longer than allowed for a remote description.
    #[error("remote description did not arrive within {0:?}")]
    CandidateTimeout(Duration),

    /// The requested operation does not apply in the current phase.
    #[error("cannot {action} while {phase}")]
    InvalidState {
        /// Operation that was attempted
        action: &'static str,
        /// Phase the session was in
        phase: Phase,
    },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, NegotiationError>;
