//! Stalemate detection and turn assignment.
//!
//! Turn assignment is a single total decision table over
//! `(requested_round, log_len)`:
//!
//! ```text
//! requested_round > 3 && log_len >= 6  → Arbiter   (stalemate, overrides parity)
//! requested_round odd                  → Sentinel
//! requested_round even                 → Governor
//! ```

use serde::{Deserialize, Serialize};

use super::state::AgentRole;

/// A round number must exceed this before a stalemate can be declared.
pub const STALEMATE_AFTER_ROUND: u32 = 3;
/// Minimum number of logged rounds for a stalemate.
pub const STALEMATE_MIN_LOG_LEN: usize = 6;

/// Why an agent was chosen for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnAssignment {
    /// Odd round, normal rotation.
    Sentinel,
    /// Even round, normal rotation.
    Governor,
    /// Stalemate detected, rotation overridden.
    Escalated { round: u32, log_len: usize },
}

impl TurnAssignment {
    pub fn agent(self) -> AgentRole {
        match self {
            Self::Sentinel => AgentRole::Sentinel,
            Self::Governor => AgentRole::Governor,
            Self::Escalated { .. } => AgentRole::Arbiter,
        }
    }

    pub fn is_stalemate(self) -> bool {
        matches!(self, Self::Escalated { .. })
    }
}

impl std::fmt::Display for TurnAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sentinel => write!(f, "rotation (odd round) → Sentinel"),
            Self::Governor => write!(f, "rotation (even round) → Governor"),
            Self::Escalated { round, log_len } => write!(
                f,
                "stalemate (round {} with {} logged rounds) → Arbiter",
                round, log_len
            ),
        }
    }
}

/// Pure stalemate predicate.
pub struct StalemateDetector;

impl StalemateDetector {
    pub fn is_stalemate(requested_round: u32, log_len: usize) -> bool {
        requested_round > STALEMATE_AFTER_ROUND && log_len >= STALEMATE_MIN_LOG_LEN
    }

    /// Decide who speaks. Same inputs always yield the same agent.
    pub fn assign(requested_round: u32, log_len: usize) -> TurnAssignment {
        if Self::is_stalemate(requested_round, log_len) {
            TurnAssignment::Escalated {
                round: requested_round,
                log_len,
            }
        } else if requested_round % 2 == 1 {
            TurnAssignment::Sentinel
        } else {
            TurnAssignment::Governor
        }
    }
}

/// Shorthand for `StalemateDetector::assign(..).agent()`.
pub fn assign_turn(requested_round: u32, log_len: usize) -> AgentRole {
    StalemateDetector::assign(requested_round, log_len).agent()
}
