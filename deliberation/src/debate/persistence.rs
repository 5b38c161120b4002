//! Session persistence contract, versioned session records, and an
//! in-memory store.
//!
//! Every write is all-or-nothing: a round append either lands with the
//! expected number or not at all, and a final commit replaces the
//! `(budget, urgency, consensus)` triad in a single update.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::state::{AgentRole, BudgetLevel, NegotiationSession, Round, UrgencyLevel};

/// Error during persistence operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session already exists: {0}")]
    AlreadyExists(String),

    #[error("round conflict: expected round {expected}, got {found}")]
    RoundConflict { expected: u32, found: u32 },

    #[error("serialize failed: {reason}")]
    SerializeFailed { reason: String },

    #[error("deserialize failed: {reason}")]
    DeserializeFailed { reason: String },

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("integrity check failed: {reason}")]
    IntegrityCheckFailed { reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl PersistenceError {
    /// Transient backend failures may succeed on retry; logical conflicts won't.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// The fields a finalize (or Arbiter) step commits together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalCommit {
    pub budget_level: BudgetLevel,
    pub urgency_level: UrgencyLevel,
    pub final_consensus: String,
}

impl FinalCommit {
    /// Apply to a session. Callers must only publish the result as a whole.
    pub fn apply(&self, session: &mut NegotiationSession) {
        session.budget_level = self.budget_level;
        session.urgency_level = self.urgency_level;
        session.final_consensus = Some(self.final_consensus.clone());
    }
}

/// Storage for negotiation sessions.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Store a brand-new session.
    async fn create_session(&self, session: NegotiationSession) -> Result<(), PersistenceError>;

    async fn read_session(&self, id: &str) -> Result<NegotiationSession, PersistenceError>;

    /// Atomically append one round. Rejects anything but `len + 1`.
    async fn append_round(&self, id: &str, round: Round) -> Result<(), PersistenceError>;

    /// Atomically replace the budget, urgency and consensus fields.
    async fn commit_final(&self, id: &str, commit: FinalCommit) -> Result<(), PersistenceError>;

    async fn list_sessions(&self) -> Result<Vec<String>, PersistenceError>;
}

/// A versioned, self-validating snapshot of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub session: NegotiationSession,
}

impl SessionRecord {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(session: &NegotiationSession) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            session: session.clone(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistenceError::SerializeFailed {
            reason: e.to_string(),
        })
    }

    /// Deserialize and validate.
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let mut record: Self =
            serde_json::from_str(json).map_err(|e| PersistenceError::DeserializeFailed {
                reason: e.to_string(),
            })?;

        if record.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: record.version,
            });
        }

        match validate_session(&record.session) {
            IntegrityStatus::Corrupted { errors } => Err(PersistenceError::IntegrityCheckFailed {
                reason: errors.join("; "),
            }),
            IntegrityStatus::Recoverable { warnings } => {
                tracing::warn!(
                    session_id = %record.session.id,
                    warnings = %warnings.join("; "),
                    "Session record recovered; recomputing cached scores"
                );
                record.session.refresh_scores();
                Ok(record)
            }
            IntegrityStatus::Valid => Ok(record),
        }
    }
}

/// Integrity check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
    /// Session is consistent.
    Valid,
    /// Cached values drifted but can be recomputed.
    Recoverable { warnings: Vec<String> },
    /// Structural invariants are broken.
    Corrupted { errors: Vec<String> },
}

/// Check the structural invariants of a stored session.
pub fn validate_session(session: &NegotiationSession) -> IntegrityStatus {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for (idx, round) in session.round_log.iter().enumerate() {
        let expected = idx as u32 + 1;
        if round.round != expected {
            errors.push(format!(
                "round_log[{}] has round {} (expected {})",
                idx, round.round, expected
            ));
        }
        if round.agent == AgentRole::Arbiter && round.sentiment_shift != 0 {
            warnings.push(format!(
                "arbiter round {} carries shift {}",
                round.round, round.sentiment_shift
            ));
        }
    }

    for pair in session.round_log.windows(2) {
        if pair[1].timestamp < pair[0].timestamp {
            errors.push(format!(
                "round {} timestamp precedes round {}",
                pair[1].round, pair[0].round
            ));
        }
    }

    let mut recomputed = session.clone();
    recomputed.refresh_scores();
    if recomputed.sentinel_score != session.sentinel_score
        || recomputed.governor_score != session.governor_score
    {
        warnings.push(format!(
            "cached scores ({}, {}) differ from log ({}, {})",
            session.sentinel_score,
            session.governor_score,
            recomputed.sentinel_score,
            recomputed.governor_score
        ));
    }

    if !errors.is_empty() {
        IntegrityStatus::Corrupted { errors }
    } else if !warnings.is_empty() {
        IntegrityStatus::Recoverable { warnings }
    } else {
        IntegrityStatus::Valid
    }
}

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, NegotiationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceGateway for InMemorySessionStore {
    async fn create_session(&self, session: NegotiationSession) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(PersistenceError::AlreadyExists(session.id));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn read_session(&self, id: &str) -> Result<NegotiationSession, PersistenceError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    async fn append_round(&self, id: &str, round: Round) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        let (expected, found) = (session.next_round(), round.round);
        session
            .push_round(round)
            .map_err(|_| PersistenceError::RoundConflict { expected, found })
    }

    async fn commit_final(&self, id: &str, commit: FinalCommit) -> Result<(), PersistenceError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        commit.apply(session);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, PersistenceError> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
