/*!
This crate drives one peer's side of an offer/answer negotiation carried over a
[peer-signal-server](https://docs.rs/peer-signal-server) relay.

# Overview

Each peer owns a single [`Negotiation`] that tracks whether it is the caller or the callee,
which descriptions have been set and which remote candidates are still waiting for a
remote description. The actual connectivity work is done by a [`TransportEngine`]
implementation supplied by the user, this crate never looks inside descriptions or candidates.

When both peers offer at the same time, the [`glare`] policy decides deterministically
which side yields, so the pair converges without another round-trip.

[`PeerClient`] connects a `Negotiation` to a relay over `WebSocket`.
*/

#![allow(clippy::module_name_repetitions)]
// clippy WARN level lints
#![warn(
    missing_docs,
    clippy::pedantic,
    clippy::dbg_macro,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::map_err_ignore,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unreachable
)]
// clippy DENY level lints, they always have a quick fix that should be preferred
#![deny(
    clippy::wildcard_imports,
    clippy::multiple_inherent_impl,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::self_named_module_files,
    clippy::str_to_string,
    clippy::string_add,
    clippy::string_to_string,
    clippy::unnecessary_self_imports,
    clippy::verbose_file_reads
)]

mod candidates;
mod client;
mod engine;
mod error;
pub mod glare;
pub mod mock;
mod negotiation;

pub use candidates::CandidateBuffer;
pub use client::{PeerClient, Step};
pub use engine::TransportEngine;
pub use error::{NegotiationError, Result};
pub use negotiation::{Negotiation, NegotiationConfig, Phase, Role};
pub use peer_signal_protocol::{
    IceCandidate, Payload, PeerId, SdpType, SessionDescription, SignalKind, SignalMessage,
};
