//! Negotiation state — agents, rounds, policy levels, and session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::sentiment::SentimentAccumulator;

/// Persona taking a turn in the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Advocates the reporting party's position.
    Sentinel,
    /// Advocates the administrative position.
    Governor,
    /// Neutral synthesizer invoked on stalemate.
    Arbiter,
}

impl AgentRole {
    /// Whether rounds by this agent move a running score.
    pub fn is_scored(self) -> bool {
        !matches!(self, Self::Arbiter)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sentinel => write!(f, "Sentinel"),
            Self::Governor => write!(f, "Governor"),
            Self::Arbiter => write!(f, "Arbiter"),
        }
    }
}

/// Budget available for implementing a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
    Restricted,
    Low,
    Medium,
    High,
    Unlimited,
}

impl BudgetLevel {
    pub const ALL: [BudgetLevel; 5] = [
        Self::Restricted,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Unlimited,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unlimited => "unlimited",
        }
    }
}

impl Default for BudgetLevel {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BudgetLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownBudgetLevel(s.to_string()))
    }
}

/// How urgently a grievance must be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Normal,
    High,
    Critical,
}

impl UrgencyLevel {
    pub const ALL: [UrgencyLevel; 4] = [Self::Low, Self::Normal, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        Self::Normal
    }
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UrgencyLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownUrgencyLevel(s.to_string()))
    }
}

/// One turn of the negotiation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    /// Round number (1-indexed).
    pub round: u32,
    /// Agent that spoke this round.
    pub agent: AgentRole,
    /// Argument or synthesis text.
    pub message: String,
    /// Score adjustment for the speaking side, in [-10, 10].
    pub sentiment_shift: i32,
    /// When the round was produced.
    pub timestamp: DateTime<Utc>,
}

/// Derived lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Sentinel and Governor are still alternating.
    Negotiating,
    /// An Arbiter round exists but no consensus has been committed.
    Stalemate,
    /// A consensus is committed. Re-entrant through finalize.
    Finalized,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negotiating => write!(f, "negotiating"),
            Self::Stalemate => write!(f, "stalemate"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// A grievance under deliberation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationSession {
    /// Externally assigned identifier.
    pub id: String,
    /// Subject of deliberation.
    pub grievance_text: String,
    /// Ordered, append-only round history.
    pub round_log: Vec<Round>,
    /// Cached sum of Sentinel shifts.
    pub sentinel_score: i64,
    /// Cached sum of Governor shifts.
    pub governor_score: i64,
    pub budget_level: BudgetLevel,
    pub urgency_level: UrgencyLevel,
    /// Set only by a finalize or Arbiter commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_consensus: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NegotiationSession {
    /// Create an empty session with default policy levels.
    pub fn new(id: &str, grievance_text: &str) -> Self {
        Self {
            id: id.to_string(),
            grievance_text: grievance_text.to_string(),
            round_log: Vec::new(),
            sentinel_score: 0,
            governor_score: 0,
            budget_level: BudgetLevel::default(),
            urgency_level: UrgencyLevel::default(),
            final_consensus: None,
            created_at: Utc::now(),
        }
    }

    /// Set the initial policy levels.
    pub fn with_levels(mut self, budget: BudgetLevel, urgency: UrgencyLevel) -> Self {
        self.budget_level = budget;
        self.urgency_level = urgency;
        self
    }

    /// Number the next round must carry.
    pub fn next_round(&self) -> u32 {
        self.round_log.len() as u32 + 1
    }

    /// Append a round, enforcing contiguous numbering, and refresh cached scores.
    pub fn push_round(&mut self, round: Round) -> Result<(), ValidationError> {
        let expected = self.next_round();
        if round.round != expected {
            return Err(ValidationError::RoundOutOfSequence {
                expected,
                requested: round.round,
            });
        }
        self.round_log.push(round);
        self.refresh_scores();
        Ok(())
    }

    /// Recompute cached scores from the log.
    pub fn refresh_scores(&mut self) {
        let totals = SentimentAccumulator::fold(&self.round_log);
        self.sentinel_score = totals.sentinel;
        self.governor_score = totals.governor;
    }

    /// Derived tension between the two sides, 0..=100.
    pub fn tension(&self) -> u32 {
        SentimentAccumulator::fold(&self.round_log).tension()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.final_consensus.is_some() {
            SessionPhase::Finalized
        } else if self
            .round_log
            .iter()
            .any(|r| r.agent == AgentRole::Arbiter)
        {
            SessionPhase::Stalemate
        } else {
            SessionPhase::Negotiating
        }
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} rounds | sentinel={} governor={} tension={} | budget={} urgency={} | session={}",
            self.phase(),
            self.round_log.len(),
            self.sentinel_score,
            self.governor_score,
            self.tension(),
            self.budget_level,
            self.urgency_level,
            self.id
        )
    }
}
