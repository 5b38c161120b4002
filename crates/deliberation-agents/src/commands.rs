//! Command execution against a deliberation service.
//!
//! Every command yields a JSON value; `main` prints it. Keeping execution
//! generic over the gateway lets tests drive the same path with a scripted
//! model.

use anyhow::{Context, Result};
use deliberation::{
    AdminParameters, BudgetLevel, DeliberationService, ModelGateway, PersistenceGateway,
    SessionSnapshot, UrgencyLevel,
};
use serde_json::{json, Value};
use tracing::info;

use crate::cli::Command;

pub async fn execute<G, P>(
    service: &DeliberationService<G, P>,
    command: Command,
    default_max_rounds: u32,
) -> Result<Value>
where
    G: ModelGateway + 'static,
    P: PersistenceGateway + ?Sized,
{
    match command {
        Command::Open {
            text,
            id,
            budget,
            urgency,
        } => {
            let budget: BudgetLevel = budget.parse()?;
            let urgency: UrgencyLevel = urgency.parse()?;
            let session = service
                .open_session(id, &text, budget, urgency)
                .await
                .context("Failed to open session")?;
            Ok(serde_json::to_value(&session)?)
        }
        Command::Round { id } => {
            let round = service
                .advance(&id)
                .await
                .with_context(|| format!("Round failed for session {}", id))?;
            Ok(serde_json::to_value(&round)?)
        }
        Command::Run { id, max_rounds } => {
            let cap = max_rounds.unwrap_or(default_max_rounds);
            let rounds = service
                .run_until_arbiter(&id, cap)
                .await
                .with_context(|| format!("Run failed for session {}", id))?;
            let snapshot = service.snapshot(&id).await?;
            info!(
                session_id = %id,
                produced = rounds.len(),
                phase = %snapshot.phase,
                "Run finished"
            );
            Ok(json!({ "rounds": rounds, "snapshot": snapshot }))
        }
        Command::Finalize {
            id,
            budget,
            urgency,
            days,
        } => {
            let params = AdminParameters::parse(&budget, &urgency, days)?;
            let outcome = service
                .finalize(&id, &params)
                .await
                .with_context(|| format!("Finalize failed for session {}", id))?;
            Ok(json!({
                "id": id,
                "budgetLevel": params.budget_level,
                "urgencyLevel": params.urgency_level,
                "implementationDays": params.implementation_days,
                "finalConsensus": outcome.consensus,
            }))
        }
        Command::Show { id, full } => {
            let session = service.session(&id).await?;
            if full {
                return Ok(serde_json::to_value(&session)?);
            }
            let mut value = serde_json::to_value(SessionSnapshot::from(&session))?;
            value["status"] = Value::String(session.status_line());
            Ok(value)
        }
        Command::List => {
            let ids = service.store().list_sessions().await?;
            Ok(json!(ids))
        }
    }
}
