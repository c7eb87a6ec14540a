/*!
Signaling frames exchanged between peers through the relay.

Peers decode frames strictly into [`SignalMessage`]. The relay reads them through the
looser [`Envelope`](crate::Envelope) and passes the text along untouched.
*/

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PeerId;

/// Role of a session description in the offer/answer exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Proposal sent by the initiating peer
    Offer,
    /// Reply of the responding peer
    Answer,
}

impl Display for SdpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Offer => write!(f, "offer"),
            Self::Answer => write!(f, "answer"),
        }
    }
}

/// Opaque session description, `sdp` is never inspected by this crate.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Offer or answer
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// Raw description text as produced by the transport engine
    pub sdp: String,
}

impl SessionDescription {
    /// Description with the `offer` role
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Description with the `answer` role
    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One connectivity candidate in the shape browsers and most engines emit.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate line
    pub candidate: String,
    /// Media stream identification tag
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description the candidate belongs to
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
    /// ICE username fragment, when the engine provides one
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Candidate with only the candidate line set
    #[must_use]
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Exactly one kind of negotiation payload carried by a [`SignalMessage`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Payload {
    /// Session description, offer or answer
    Description(SessionDescription),
    /// Single connectivity candidate
    Candidate(IceCandidate),
}

/// Coarse classification of a message, all the relay needs to know about it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SignalKind {
    /// `sdp` frame with `type: offer`
    Offer,
    /// `sdp` frame with `type: answer`
    Answer,
    /// `ice` frame
    Candidate,
}

/// A frame sent by one peer and relayed to the others.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignal", into = "RawSignal")]
pub struct SignalMessage {
    /// What is being signaled
    pub payload: Payload,
    /// Identity of the peer that produced the message
    pub uuid: PeerId,
}

/// Failure to turn a frame into a [`SignalMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame is not valid JSON or does not match the message shape
    #[error("malformed signal frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl SignalMessage {
    /// Message carrying a session description.
    #[must_use]
    pub const fn description(uuid: PeerId, description: SessionDescription) -> Self {
        Self {
            payload: Payload::Description(description),
            uuid,
        }
    }

    /// Message carrying a connectivity candidate.
    #[must_use]
    pub const fn candidate(uuid: PeerId, candidate: IceCandidate) -> Self {
        Self {
            payload: Payload::Candidate(candidate),
            uuid,
        }
    }

    /// Classify the message without looking into its payload.
    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        match self.payload {
            Payload::Description(SessionDescription {
                sdp_type: SdpType::Offer,
                ..
            }) => SignalKind::Offer,
            Payload::Description(SessionDescription {
                sdp_type: SdpType::Answer,
                ..
            }) => SignalKind::Answer,
            Payload::Candidate(_) => SignalKind::Candidate,
        }
    }

    /// Parse a single text frame.
    ///
    /// # Errors
    /// Fails when the frame is not JSON, lacks `uuid`,
    /// or carries neither or both of `sdp` and `ice`.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Render the message as a text frame.
    ///
    /// # Errors
    /// Serialization of these types does not fail in practice,
    /// the error is surfaced rather than unwrapped.
    pub fn encode(&self) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// On-the-wire shape, both payload slots optional.
#[derive(Serialize, Deserialize)]
struct RawSignal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sdp: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ice: Option<IceCandidate>,
    uuid: PeerId,
}

impl TryFrom<RawSignal> for SignalMessage {
    type Error = &'static str;

    fn try_from(raw: RawSignal) -> Result<Self, Self::Error> {
        let payload = match (raw.sdp, raw.ice) {
            (Some(sdp), None) => Payload::Description(sdp),
            (None, Some(ice)) => Payload::Candidate(ice),
            (Some(_), Some(_)) => return Err("frame carries both `sdp` and `ice`"),
            (None, None) => return Err("frame carries neither `sdp` nor `ice`"),
        };
        Ok(Self {
            payload,
            uuid: raw.uuid,
        })
    }
}

impl From<SignalMessage> for RawSignal {
    fn from(message: SignalMessage) -> Self {
        let (sdp, ice) = match message.payload {
            Payload::Description(sdp) => (Some(sdp), None),
            Payload::Candidate(ice) => (None, Some(ice)),
        };
        Self {
            sdp,
            ice,
            uuid: message.uuid,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_offer_frame() {
        let frame = r#"{"sdp":{"type":"offer","sdp":"v=0\r\n"},"uuid":"aaa"}"#;
        let message = SignalMessage::decode(frame).unwrap();
        assert_eq!(message.kind(), SignalKind::Offer);
        assert_eq!(message.uuid.as_str(), "aaa");
        assert_eq!(
            message.payload,
            Payload::Description(SessionDescription::offer("v=0\r\n"))
        );
    }

    #[test]
    fn decodes_candidate_frame_with_browser_fields() {
        let frame = r#"{
            "ice": {
                "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host",
                "sdpMid": "0",
                "sdpMLineIndex": 0,
                "usernameFragment": null
            },
            "uuid": "bbb",
            "extra": true
        }"#;
        let message = SignalMessage::decode(frame).unwrap();
        assert_eq!(message.kind(), SignalKind::Candidate);
        let Payload::Candidate(candidate) = message.payload else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(candidate.sdp_m_line_index, Some(0));
        assert_eq!(candidate.username_fragment, None);
    }

    #[test]
    fn null_payload_counts_as_absent() {
        let frame = r#"{"sdp":null,"ice":{"candidate":"c"},"uuid":"ccc"}"#;
        let message = SignalMessage::decode(frame).unwrap();
        assert_eq!(message.kind(), SignalKind::Candidate);
    }

    #[test]
    fn rejects_frames_without_exactly_one_payload() {
        assert!(SignalMessage::decode(r#"{"uuid":"aaa"}"#).is_err());
        assert!(SignalMessage::decode(
            r#"{"sdp":{"type":"answer","sdp":""},"ice":{"candidate":""},"uuid":"aaa"}"#
        )
        .is_err());
    }

    #[test]
    fn rejects_missing_uuid_and_garbage() {
        assert!(SignalMessage::decode(r#"{"sdp":{"type":"offer","sdp":""}}"#).is_err());
        assert!(SignalMessage::decode("not json").is_err());
        let rollback = r#"{"sdp":{"type":"rollback","sdp":""},"uuid":"a"}"#;
        assert!(SignalMessage::decode(rollback).is_err());
    }

    #[test]
    fn encodes_only_present_payload() {
        let message =
            SignalMessage::candidate(PeerId::new("ddd".to_owned()), IceCandidate::new("c"));
        let frame = message.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["uuid"], "ddd");
        assert_eq!(value["ice"]["candidate"], "c");
        assert!(value.get("sdp").is_none());
        assert_eq!(SignalMessage::decode(&frame).unwrap(), message);
    }
}
