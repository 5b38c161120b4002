//! Administrator-driven consensus finalization.
//!
//! Outside the round rotation: one synthesis call over the full log with the
//! administrator's policy parameters folded into the context. A successful
//! result is committed as one `(budget, urgency, consensus)` update and fully
//! replaces any earlier consensus, including one produced by an Arbiter round.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{DeliberationResult, ValidationError};
use super::orchestrator::{build_context, generate_with_timeout};
use super::parser::{self, ParsedConsensus};
use super::persistence::{FinalCommit, PersistenceGateway};
use super::persona::AgentPersonaRegistry;
use super::state::{BudgetLevel, Round, UrgencyLevel};
use crate::gateway::{GenerationError, ModelGateway};

/// Shortest implementation window an administrator may set.
pub const MIN_IMPLEMENTATION_DAYS: u32 = 7;
/// Longest implementation window an administrator may set.
pub const MAX_IMPLEMENTATION_DAYS: u32 = 180;

/// Policy inputs for a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminParameters {
    pub budget_level: BudgetLevel,
    pub urgency_level: UrgencyLevel,
    pub implementation_days: u32,
}

impl AdminParameters {
    pub fn new(
        budget_level: BudgetLevel,
        urgency_level: UrgencyLevel,
        implementation_days: u32,
    ) -> Result<Self, ValidationError> {
        let params = Self {
            budget_level,
            urgency_level,
            implementation_days,
        };
        params.validate()?;
        Ok(params)
    }

    /// Build from untyped administrator input.
    pub fn parse(
        budget_level: &str,
        urgency_level: &str,
        implementation_days: u32,
    ) -> Result<Self, ValidationError> {
        Self::new(
            budget_level.parse()?,
            urgency_level.parse()?,
            implementation_days,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_IMPLEMENTATION_DAYS..=MAX_IMPLEMENTATION_DAYS).contains(&self.implementation_days)
        {
            return Err(ValidationError::ImplementationDaysOutOfRange {
                days: self.implementation_days,
                min: MIN_IMPLEMENTATION_DAYS,
                max: MAX_IMPLEMENTATION_DAYS,
            });
        }
        Ok(())
    }
}

/// Result of a finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub consensus: String,
}

impl FinalizeOutcome {
    /// The triad to persist for this outcome.
    pub fn to_commit(&self, params: &AdminParameters) -> FinalCommit {
        FinalCommit {
            budget_level: params.budget_level,
            urgency_level: params.urgency_level,
            final_consensus: self.consensus.clone(),
        }
    }
}

/// Configuration for the finalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizerConfig {
    pub generation_timeout: Duration,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(90),
        }
    }
}

/// Single-shot synthesis under administrator policy.
pub struct ConsensusFinalizer<G> {
    gateway: G,
    config: FinalizerConfig,
}

impl<G: ModelGateway> ConsensusFinalizer<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, FinalizerConfig::default())
    }

    pub fn with_config(gateway: G, config: FinalizerConfig) -> Self {
        Self { gateway, config }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run synthesis. Persists nothing.
    pub async fn finalize(
        &self,
        grievance_text: &str,
        round_log: &[Round],
        params: &AdminParameters,
    ) -> DeliberationResult<FinalizeOutcome> {
        if grievance_text.trim().is_empty() {
            return Err(ValidationError::EmptyGrievance.into());
        }
        params.validate()?;

        let context = build_synthesis_context(grievance_text, round_log, params);
        let raw = generate_with_timeout(
            &self.gateway,
            self.config.generation_timeout,
            AgentPersonaRegistry::synthesis_instructions(),
            &context,
        )
        .await?;

        let parsed = parser::parse_consensus(&raw);
        if let ParsedConsensus::Fallback { .. } = parsed {
            tracing::warn!("Synthesis output had no usable JSON; using raw text");
        }
        let consensus = parsed.into_consensus();
        if consensus.is_empty() {
            return Err(GenerationError::Unknown("model returned an empty consensus".into()).into());
        }

        tracing::info!(
            budget = %params.budget_level,
            urgency = %params.urgency_level,
            days = params.implementation_days,
            rounds = round_log.len(),
            "Consensus synthesized"
        );
        Ok(FinalizeOutcome { consensus })
    }

    /// Read the session, synthesize, and commit the triad in one update.
    ///
    /// If the commit fails the stored session keeps its previous triad.
    pub async fn finalize_and_commit<P: PersistenceGateway + ?Sized>(
        &self,
        store: &P,
        session_id: &str,
        params: &AdminParameters,
    ) -> DeliberationResult<FinalizeOutcome> {
        params.validate()?;
        let session = store.read_session(session_id).await?;
        let outcome = self
            .finalize(&session.grievance_text, &session.round_log, params)
            .await?;
        store
            .commit_final(session_id, outcome.to_commit(params))
            .await
            .inspect_err(|e| {
                tracing::error!(session_id, error = %e, "Consensus generated but commit failed");
            })?;
        Ok(outcome)
    }
}

/// Negotiation context plus the administrator's parameters.
pub fn build_synthesis_context(
    grievance_text: &str,
    round_log: &[Round],
    params: &AdminParameters,
) -> String {
    format!(
        "{}\n\nAdministrator parameters:\n- budget level: {}\n- urgency level: {}\n- implementation window: {} days",
        build_context(grievance_text, round_log),
        params.budget_level,
        params.urgency_level,
        params.implementation_days
    )
}
