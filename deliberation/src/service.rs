//! Host service — binds the engine to a store and serializes work per session.
//!
//! The engine itself holds no locks. This service guarantees at most one
//! in-flight round or finalize per session, so the log length read before a
//! model call is still the log length when the round is appended.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::debate::consensus::{AdminParameters, ConsensusFinalizer, FinalizeOutcome, FinalizerConfig};
use crate::debate::error::{DeliberationResult, ValidationError};
use crate::debate::guardrails::assign_turn;
use crate::debate::orchestrator::{NegotiationOrchestrator, OrchestratorConfig};
use crate::debate::persistence::{FinalCommit, PersistenceGateway};
use crate::debate::state::{
    AgentRole, BudgetLevel, NegotiationSession, Round, SessionPhase, UrgencyLevel,
};
use crate::gateway::ModelGateway;

/// Configuration for the deliberation service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub orchestrator: OrchestratorConfig,
    pub finalizer: FinalizerConfig,
}

/// Read-only view of a session for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub phase: SessionPhase,
    pub rounds: usize,
    pub sentinel_score: i64,
    pub governor_score: i64,
    pub tension: u32,
    pub budget_level: BudgetLevel,
    pub urgency_level: UrgencyLevel,
    /// Who would speak if another round were conducted now.
    pub next_agent: AgentRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_consensus: Option<String>,
}

impl From<&NegotiationSession> for SessionSnapshot {
    fn from(session: &NegotiationSession) -> Self {
        Self {
            id: session.id.clone(),
            phase: session.phase(),
            rounds: session.round_log.len(),
            sentinel_score: session.sentinel_score,
            governor_score: session.governor_score,
            tension: session.tension(),
            budget_level: session.budget_level,
            urgency_level: session.urgency_level,
            next_agent: assign_turn(session.next_round(), session.round_log.len()),
            final_consensus: session.final_consensus.clone(),
        }
    }
}

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Exclusive hold on one session. Dropping it releases the lock and evicts
/// map entries nobody else holds or waits on.
struct SessionLease<'a> {
    locks: &'a LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        self.guard.take();
        // Entries are only cloned under the map lock, so a count of one
        // means no holder or waiter exists.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Orchestrator, finalizer and store behind per-session serialization.
pub struct DeliberationService<G, P: ?Sized> {
    orchestrator: NegotiationOrchestrator<Arc<G>>,
    finalizer: ConsensusFinalizer<Arc<G>>,
    store: Arc<P>,
    locks: LockMap,
}

impl<G, P> DeliberationService<G, P>
where
    G: ModelGateway + 'static,
    P: PersistenceGateway + ?Sized,
{
    pub fn new(gateway: G, store: Arc<P>) -> Self {
        Self::with_config(gateway, store, ServiceConfig::default())
    }

    pub fn with_config(gateway: G, store: Arc<P>, config: ServiceConfig) -> Self {
        let gateway = Arc::new(gateway);
        Self {
            orchestrator: NegotiationOrchestrator::with_config(
                Arc::clone(&gateway),
                config.orchestrator,
            ),
            finalizer: ConsensusFinalizer::with_config(gateway, config.finalizer),
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<P> {
        &self.store
    }

    /// Hold the session's lock until the returned lease is dropped.
    async fn lock_session(&self, session_id: &str) -> SessionLease<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        SessionLease {
            locks: &self.locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Register a new grievance. Generates an id when none is given.
    pub async fn open_session(
        &self,
        id: Option<String>,
        grievance_text: &str,
        budget_level: BudgetLevel,
        urgency_level: UrgencyLevel,
    ) -> DeliberationResult<NegotiationSession> {
        if grievance_text.trim().is_empty() {
            return Err(ValidationError::EmptyGrievance.into());
        }
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = NegotiationSession::new(&id, grievance_text.trim())
            .with_levels(budget_level, urgency_level);
        self.store.create_session(session.clone()).await?;
        tracing::info!(session_id = %id, "Session opened");
        Ok(session)
    }

    /// Conduct and persist the next round.
    ///
    /// An Arbiter round is also committed as the final consensus under the
    /// session's current budget and urgency levels.
    pub async fn advance(&self, session_id: &str) -> DeliberationResult<Round> {
        let _lease = self.lock_session(session_id).await;

        let session = self.store.read_session(session_id).await?;
        let round = self
            .orchestrator
            .conduct_round(&session.grievance_text, &session.round_log, session.next_round())
            .await?;

        self.store.append_round(session_id, round.clone()).await?;
        tracing::info!(
            session_id,
            round = round.round,
            agent = %round.agent,
            "Round persisted"
        );

        if round.agent == AgentRole::Arbiter && !round.message.trim().is_empty() {
            let commit = FinalCommit {
                budget_level: session.budget_level,
                urgency_level: session.urgency_level,
                final_consensus: round.message.clone(),
            };
            self.store.commit_final(session_id, commit).await?;
            tracing::info!(session_id, round = round.round, "Arbiter consensus committed");
        }

        Ok(round)
    }

    /// Advance until an Arbiter round is produced or `max_rounds` rounds ran.
    pub async fn run_until_arbiter(
        &self,
        session_id: &str,
        max_rounds: u32,
    ) -> DeliberationResult<Vec<Round>> {
        let mut produced = Vec::new();
        for _ in 0..max_rounds {
            let round = self.advance(session_id).await?;
            let done = round.agent == AgentRole::Arbiter;
            produced.push(round);
            if done {
                break;
            }
        }
        Ok(produced)
    }

    /// Administrator finalize. Re-entrant; each success replaces the triad.
    pub async fn finalize(
        &self,
        session_id: &str,
        params: &AdminParameters,
    ) -> DeliberationResult<FinalizeOutcome> {
        params.validate()?;
        let _lease = self.lock_session(session_id).await;

        let outcome = self
            .finalizer
            .finalize_and_commit(self.store.as_ref(), session_id, params)
            .await?;
        tracing::info!(session_id, "Session finalized by administrator");
        Ok(outcome)
    }

    pub async fn snapshot(&self, session_id: &str) -> DeliberationResult<SessionSnapshot> {
        let session = self.store.read_session(session_id).await?;
        Ok(SessionSnapshot::from(&session))
    }

    pub async fn session(&self, session_id: &str) -> DeliberationResult<NegotiationSession> {
        Ok(self.store.read_session(session_id).await?)
    }
}
