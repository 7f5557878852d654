//! Validation errors reported to callers of the ledger.
//!
//! These are non-fatal: the ledger is left untouched whenever one is
//! returned. Failures of external collaborators never surface here; they
//! are logged and swallowed by the notification layer.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::engine::activation::Requirement;
use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown user: {0}")]
    UnknownUser(UserId),

    #[error("user {0} cannot refer themselves")]
    SelfReferral(UserId),

    #[error("trading requirements not met: {}", describe_unmet(.unmet))]
    ActivationRequirementsUnmet { unmet: Vec<Requirement> },

    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("no attempts left today for game {0}")]
    NoAttemptsLeft(String),

    #[error("{0} is not an admin")]
    NotAdmin(String),

    #[error("no announcement session open for admin {0}")]
    NoActiveSession(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
}

fn describe_unmet(unmet: &[Requirement]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
