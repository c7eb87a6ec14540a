//! In-memory transport engine for tests and simulations.
//!
//! Produces deterministic descriptions tagged with a label and records every call,
//! so tests can assert on what a [`Negotiation`](crate::Negotiation) asked of its engine.

use anyhow::bail;
use peer_signal_protocol::{IceCandidate, SessionDescription};

use crate::engine::TransportEngine;

/// Call recorded by [`MockEngine`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EngineCall {
    /// `create_offer`
    CreateOffer,
    /// `create_answer`
    CreateAnswer,
    /// `set_local_description` with the given description
    SetLocal(SessionDescription),
    /// `set_remote_description` with the given description
    SetRemote(SessionDescription),
    /// `add_ice_candidate` with the given candidate
    AddCandidate(IceCandidate),
    /// `rollback`
    Rollback,
}

/// Engine that accepts everything unless told to reject one operation.
#[derive(Debug, Default)]
pub struct MockEngine {
    label: String,
    calls: Vec<EngineCall>,
    reject: Option<&'static str>,
}

impl MockEngine {
    /// Engine whose descriptions mention `label`.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            calls: Vec::new(),
            reject: None,
        }
    }

    /// Make one operation fail, using the operation names `"create_offer"`,
    /// `"create_answer"`, `"set_local_description"`, `"set_remote_description"`,
    /// `"add_ice_candidate"` or `"rollback"`.
    #[must_use]
    pub fn rejecting(mut self, operation: &'static str) -> Self {
        self.reject = Some(operation);
        self
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Candidate lines applied so far, in order.
    #[must_use]
    pub fn applied_candidates(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match *call {
                EngineCall::AddCandidate(ref candidate) => Some(candidate.candidate.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Most recently applied remote description.
    #[must_use]
    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.calls.iter().rev().find_map(|call| match *call {
            EngineCall::SetRemote(ref description) => Some(description),
            _ => None,
        })
    }

    fn check(&self, operation: &'static str) -> anyhow::Result<()> {
        if self.reject == Some(operation) {
            bail!("{operation} rejected by mock engine {}", self.label);
        }
        Ok(())
    }
}

impl TransportEngine for MockEngine {
    fn create_offer(&mut self) -> anyhow::Result<SessionDescription> {
        self.check("create_offer")?;
        self.calls.push(EngineCall::CreateOffer);
        Ok(SessionDescription::offer(format!("offer from {}", self.label)))
    }

    fn create_answer(&mut self) -> anyhow::Result<SessionDescription> {
        self.check("create_answer")?;
        self.calls.push(EngineCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("answer from {}", self.label)))
    }

    fn set_local_description(&mut self, description: &SessionDescription) -> anyhow::Result<()> {
        self.check("set_local_description")?;
        self.calls.push(EngineCall::SetLocal(description.clone()));
        Ok(())
    }

    fn set_remote_description(
        &mut self,
        description: &SessionDescription,
    ) -> anyhow::Result<()> {
        self.check("set_remote_description")?;
        self.calls.push(EngineCall::SetRemote(description.clone()));
        Ok(())
    }

    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> anyhow::Result<()> {
        self.check("add_ice_candidate")?;
        self.calls.push(EngineCall::AddCandidate(candidate.clone()));
        Ok(())
    }

    fn rollback(&mut self) -> anyhow::Result<()> {
        self.check("rollback")?;
        self.calls.push(EngineCall::Rollback);
        Ok(())
    }
}
