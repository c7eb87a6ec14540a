use peer_signal_protocol::PeerId;
use thiserror::Error;

/// Close code sent to a peer whose identity is already connected.
pub const CLOSE_DUPLICATE_IDENTITY: u16 = 4409;
/// Close code sent to a peer joining a full pairwise session.
pub const CLOSE_SESSION_FULL: u16 = 4429;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("peer {0} is already connected")]
    DuplicateIdentity(PeerId),

    #[error("session already has {capacity} participants")]
    SessionFull { capacity: usize },

    #[error("peer {0} is not connected")]
    NotFound(PeerId),
}

impl RelayError {
    /// WebSocket close code reported to a peer refused on admission.
    ///
    /// `None` for errors that never end a connection.
    pub const fn close_code(&self) -> Option<u16> {
        match *self {
            Self::DuplicateIdentity(_) => Some(CLOSE_DUPLICATE_IDENTITY),
            Self::SessionFull { .. } => Some(CLOSE_SESSION_FULL),
            Self::NotFound(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
