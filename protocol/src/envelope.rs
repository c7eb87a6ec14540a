/*!
Routing view of a signaling frame.

The relay needs the sender identity and which payload slot is filled, nothing else.
Payload contents stay opaque here so peers can extend descriptions and candidates
without the relay rejecting their frames.
*/

use serde::Deserialize;
use serde_json::Value;

use crate::message::DecodeError;
use crate::PeerId;

/// What an [`Envelope`] carries, as far as routing counters care.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FrameKind {
    /// `sdp` with `type: offer`
    Offer,
    /// `sdp` with `type: answer`
    Answer,
    /// `sdp` with any other or missing `type`
    OtherDescription,
    /// `ice`
    Candidate,
}

/// A frame reduced to its sender and payload kind.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    /// Identity the frame claims to come from
    pub uuid: PeerId,
    /// Payload classification
    pub kind: FrameKind,
}

impl Envelope {
    /// Parse a text frame, checking only `uuid` and that exactly one of `sdp`/`ice` is set.
    ///
    /// # Errors
    /// Fails when the frame is not a JSON object, lacks `uuid`,
    /// or carries neither or both payloads.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(frame)?)
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    sdp: Option<Value>,
    #[serde(default)]
    ice: Option<Value>,
    uuid: PeerId,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = &'static str;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let kind = match (raw.sdp, raw.ice) {
            (Some(sdp), None) => match sdp.get("type").and_then(Value::as_str) {
                Some("offer") => FrameKind::Offer,
                Some("answer") => FrameKind::Answer,
                _ => FrameKind::OtherDescription,
            },
            (None, Some(_)) => FrameKind::Candidate,
            (Some(_), Some(_)) => return Err("frame carries both `sdp` and `ice`"),
            (None, None) => return Err("frame carries neither `sdp` nor `ice`"),
        };
        Ok(Self {
            uuid: raw.uuid,
            kind,
        })
    }
}
