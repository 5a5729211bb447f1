// Transaction assembly and relay submission.

pub mod assembler;
pub mod submitter;

pub use assembler::{AssembledTransaction, TransactionAssembler};
pub use submitter::RelaySubmitter;

use crate::error::ArbError;

/// Lifecycle of one execution attempt. Phases advance strictly forward;
/// a failed attempt lands in a terminal phase and a fresh attempt starts
/// over from `Assembling`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptPhase {
    Assembling,
    Guarding,
    Finalizing,
    Submitting,
    Confirmed,
    Rejected,
    Expired,
}

impl AttemptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptPhase::Confirmed | AttemptPhase::Rejected | AttemptPhase::Expired
        )
    }

    /// Terminal phase corresponding to a failed attempt
    pub fn from_failure(err: &ArbError) -> Self {
        match err {
            ArbError::Expired => AttemptPhase::Expired,
            _ => AttemptPhase::Rejected,
        }
    }
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AttemptPhase::Assembling => "assembling",
            AttemptPhase::Guarding => "guarding",
            AttemptPhase::Finalizing => "finalizing",
            AttemptPhase::Submitting => "submitting",
            AttemptPhase::Confirmed => "confirmed",
            AttemptPhase::Rejected => "rejected",
            AttemptPhase::Expired => "expired",
        };
        f.write_str(label)
    }
}
