//! Per-clause audit state machine.
//!
//! ```text
//! INIT ──start──▶ CRITIC_EVAL ──evaluated──▶ REFLECTOR_VERIFY ──accept───▶ ACCEPTED
//!                      ▲                          │  ──escalate─▶ ESCALATED
//!                      │                          │
//!              RETRY_CRITIC_EVAL ◀────retry───────┘
//!
//! any non-terminal state ──cancel──▶ CANCELLED
//! ```
//!
//! Every legal move is listed in [`AuditState::transition`]; anything else is
//! a [`TransitionError`].

use crate::policy::RetryDecision;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Where a clause audit currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditState {
    Init,
    CriticEval,
    ReflectorVerify,
    RetryCriticEval,
    Accepted,
    Escalated,
    Cancelled,
}

/// Input that moves the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    Start,
    /// The critic returned a finding (of any status).
    Evaluated,
    /// The retry policy ruled on a verification result.
    Decided(RetryDecision),
    /// Cancellation or the clause deadline fired.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid audit transition: {from} on {event:?}")]
pub struct TransitionError {
    pub from: AuditState,
    pub event: AuditEvent,
}

impl AuditState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Escalated | Self::Cancelled)
    }

    /// States in which the critic is (re)invoked.
    pub fn is_critic_eval(&self) -> bool {
        matches!(self, Self::CriticEval | Self::RetryCriticEval)
    }

    /// Apply one event.
    pub fn transition(self, event: AuditEvent) -> Result<AuditState, TransitionError> {
        use AuditEvent::*;
        use AuditState::*;

        let next = match (self, event) {
            (Init, Start) => CriticEval,
            (CriticEval | RetryCriticEval, Evaluated) => ReflectorVerify,
            (ReflectorVerify, Decided(RetryDecision::Accept)) => Accepted,
            (ReflectorVerify, Decided(RetryDecision::Retry)) => RetryCriticEval,
            (ReflectorVerify, Decided(RetryDecision::Escalate)) => Escalated,
            (from, Cancel) if !from.is_terminal() => Cancelled,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for AuditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::CriticEval => "CRITIC_EVAL",
            Self::ReflectorVerify => "REFLECTOR_VERIFY",
            Self::RetryCriticEval => "RETRY_CRITIC_EVAL",
            Self::Accepted => "ACCEPTED",
            Self::Escalated => "ESCALATED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}
