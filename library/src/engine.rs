use peer_signal_protocol::{IceCandidate, SessionDescription};

/// Seam to the engine performing the actual connectivity work (ICE, DTLS, media, data).
///
/// A [`Negotiation`](crate::Negotiation) calls these in protocol order and treats every
/// error as fatal for the session. Descriptions and candidates are opaque to the caller.
pub trait TransportEngine {
    /// Produce a local offer.
    ///
    /// # Errors
    /// Any engine failure, the session moves to `Failed`.
    fn create_offer(&mut self) -> anyhow::Result<SessionDescription>;

    /// Produce a local answer to the remote offer that was just applied.
    ///
    /// # Errors
    /// Any engine failure, the session moves to `Failed`.
    fn create_answer(&mut self) -> anyhow::Result<SessionDescription>;

    /// Apply a description produced locally.
    ///
    /// # Errors
    /// Malformed or incompatible description.
    fn set_local_description(&mut self, description: &SessionDescription) -> anyhow::Result<()>;

    /// Apply a description received from the remote peer.
    ///
    /// # Errors
    /// Malformed or incompatible description.
    fn set_remote_description(&mut self, description: &SessionDescription)
        -> anyhow::Result<()>;

    /// Apply a remote candidate. Only called once a remote description is set.
    ///
    /// # Errors
    /// Candidate rejected by the engine.
    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> anyhow::Result<()>;

    /// Discard an outstanding local offer, used when yielding on glare.
    ///
    /// # Errors
    /// Engine could not return to a stable state.
    fn rollback(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
