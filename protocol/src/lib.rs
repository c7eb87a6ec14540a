/*!
Helper crate that declares the types shared between [peer-signal](../peer_signal/index.html)
peers and the [peer-signal-server](../peer_signal_server/index.html) relay.

Every frame on the wire is a single JSON object carrying either a session description
or a connectivity candidate, together with the identity of the peer that produced it.
*/

#![warn(missing_docs)]

use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod envelope;
mod message;

pub use envelope::{Envelope, FrameKind};
pub use message::{
    DecodeError, IceCandidate, Payload, SdpType, SessionDescription, SignalKind, SignalMessage,
};

/// Unique identifier of a peer, generated once per process or session start.
///
/// Identities are compared as byte sequences, which is what glare resolution relies on,
/// so the derived `Ord` on the inner string is the ordering peers agree on.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap String into a `PeerId` `struct`
    #[must_use]
    pub const fn new(inner: String) -> Self {
        Self(inner)
    }

    /// Generate a fresh random identity rendered as a canonical UUID string.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Return reference to the underlying string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes of the identity, in the order used for tie-breaking.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Acquire the underlying type
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for PeerId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
