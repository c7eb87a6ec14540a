/*!
Tie-break for two peers offering at the same time.

Both sides evaluate [`resolve`] on the same pair of identities, taken from the messages
they already exchanged, and reach mirrored outcomes without any extra coordination.
*/

use peer_signal_protocol::PeerId;

/// What a peer with an outstanding offer does with a competing remote offer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GlareOutcome {
    /// Drop the local offer and answer the remote one.
    Yield,
    /// Ignore the remote offer and keep waiting for an answer.
    Stand,
}

/// The peer whose identity is bytewise smaller yields.
#[must_use]
pub fn resolve(local: &PeerId, remote: &PeerId) -> GlareOutcome {
    if local.as_bytes() < remote.as_bytes() {
        GlareOutcome::Yield
    } else {
        GlareOutcome::Stand
    }
}
