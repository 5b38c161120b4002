//! Negotiation orchestrator — produces exactly one round per invocation.
//!
//! Ties together turn assignment, persona lookup, the model gateway and the
//! lenient parser. Holds no session state: every call receives the grievance
//! and the full log, and returns a value.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::{DeliberationResult, ValidationError};
use super::guardrails::StalemateDetector;
use super::parser;
use super::persona::AgentPersonaRegistry;
use super::state::Round;
use crate::gateway::{GenerationError, ModelGateway};

/// How strictly a requested round number is checked against the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundNumbering {
    /// `requested_round == log_len + 1`.
    #[default]
    Strict,
    /// `1 <= requested_round <= log_len + 1`, for hosts whose counter tracks
    /// exchanges rather than log entries.
    Lagging,
}

impl RoundNumbering {
    pub fn check(self, requested_round: u32, log_len: usize) -> Result<(), ValidationError> {
        let expected = log_len as u32 + 1;
        let ok = match self {
            Self::Strict => requested_round == expected,
            Self::Lagging => (1..=expected).contains(&requested_round),
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::RoundOutOfSequence {
                expected,
                requested: requested_round,
            })
        }
    }
}

impl std::str::FromStr for RoundNumbering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lagging" => Ok(Self::Lagging),
            other => Err(format!("unknown round numbering: {}", other)),
        }
    }
}

/// Configuration for the negotiation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on a single model call.
    pub generation_timeout: Duration,
    pub round_numbering: RoundNumbering,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(60),
            round_numbering: RoundNumbering::Strict,
        }
    }
}

/// Drives one negotiation turn per call.
pub struct NegotiationOrchestrator<G> {
    gateway: G,
    config: OrchestratorConfig,
}

impl<G: ModelGateway> NegotiationOrchestrator<G> {
    /// Create an orchestrator with default config.
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, OrchestratorConfig::default())
    }

    pub fn with_config(gateway: G, config: OrchestratorConfig) -> Self {
        Self { gateway, config }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Check preconditions without touching the gateway.
    pub fn validate(
        &self,
        grievance_text: &str,
        round_log: &[Round],
        requested_round: u32,
    ) -> Result<(), ValidationError> {
        if grievance_text.trim().is_empty() {
            return Err(ValidationError::EmptyGrievance);
        }
        self.config
            .round_numbering
            .check(requested_round, round_log.len())
    }

    /// Produce the next round.
    ///
    /// Fails with a validation error before any model call, or with the
    /// gateway's classified error. Never retries.
    pub async fn conduct_round(
        &self,
        grievance_text: &str,
        round_log: &[Round],
        requested_round: u32,
    ) -> DeliberationResult<Round> {
        self.validate(grievance_text, round_log, requested_round)?;

        let assignment = StalemateDetector::assign(requested_round, round_log.len());
        let agent = assignment.agent();
        tracing::debug!(round = requested_round, %assignment, "Turn assigned");

        let context = build_context(grievance_text, round_log);
        let instructions = AgentPersonaRegistry::instructions(agent);

        let raw = generate_with_timeout(
            &self.gateway,
            self.config.generation_timeout,
            instructions,
            &context,
        )
        .await?;

        let parsed = parser::parse(&raw);
        if parsed.is_fallback() {
            tracing::warn!(
                round = requested_round,
                %agent,
                "Model output had no usable JSON; using raw text"
            );
        }
        let (message, parsed_shift) = parsed.into_parts();

        // Synthesis is score-neutral.
        let sentiment_shift = if agent.is_scored() { parsed_shift } else { 0 };

        let now = Utc::now();
        let timestamp = round_log
            .last()
            .map_or(now, |last| last.timestamp.max(now));

        tracing::info!(
            round = requested_round,
            %agent,
            shift = sentiment_shift,
            stalemate = assignment.is_stalemate(),
            "Round conducted"
        );

        Ok(Round {
            round: requested_round,
            agent,
            message,
            sentiment_shift,
            timestamp,
        })
    }
}

/// Grievance text followed by every prior round as `"<agent>: <message>"`.
pub fn build_context(grievance_text: &str, round_log: &[Round]) -> String {
    let mut context = String::from(grievance_text);
    for round in round_log {
        context.push('\n');
        context.push_str(&format!("{}: {}", round.agent, round.message));
    }
    context
}

/// Call the gateway, surfacing a network error if it does not answer in time.
pub(crate) async fn generate_with_timeout<G: ModelGateway + ?Sized>(
    gateway: &G,
    timeout: Duration,
    system_prompt: &str,
    user_context: &str,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(timeout, gateway.generate(system_prompt, user_context)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Model call timed out");
            Err(GenerationError::NetworkError(format!(
                "model call timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::error::DeliberationError;
    use crate::debate::state::AgentRole;
    use crate::gateway::MockModelGateway;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    /// Returns canned replies in order and records every call.
    struct ScriptedGateway {
        replies: Mutex<Vec<Result<String, GenerationError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate(
            &self,
            system_prompt: &str,
            user_context: &str,
        ) -> Result<String, GenerationError> {
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_context.to_string()));
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(r#"{"message":"default","sentimentShift":1}"#.into()))
        }
    }

    struct SlowGateway;

    #[async_trait]
    impl ModelGateway for SlowGateway {
        async fn generate(&self, _: &str, _: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".into())
        }
    }

    fn logged(n: u32, agent: AgentRole, message: &str) -> Round {
        Round {
            round: n,
            agent,
            message: message.to_string(),
            sentiment_shift: 1,
            timestamp: Utc::now(),
        }
    }

    fn alternating_log(len: u32) -> Vec<Round> {
        (1..=len)
            .map(|n| {
                let agent = if n % 2 == 1 {
                    AgentRole::Sentinel
                } else {
                    AgentRole::Governor
                };
                logged(n, agent, &format!("argument {n}"))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_first_round_is_sentinel() {
        let gateway = ScriptedGateway::new(vec![Ok(
            r#"{"message":"Fix the lights now","sentimentShift":6}"#.into(),
        )]);
        let orch = NegotiationOrchestrator::new(gateway);

        let round = orch.conduct_round("Unsafe lighting", &[], 1).await.unwrap();
        assert_eq!(round.round, 1);
        assert_eq!(round.agent, AgentRole::Sentinel);
        assert_eq!(round.message, "Fix the lights now");
        assert_eq!(round.sentiment_shift, 6);
    }

    #[tokio::test]
    async fn test_prompt_and_context_passed_to_gateway() {
        let gateway = ScriptedGateway::new(vec![]);
        let orch = NegotiationOrchestrator::new(gateway);
        let log = vec![logged(1, AgentRole::Sentinel, "Lights are broken")];

        orch.conduct_round("Unsafe lighting", &log, 2).await.unwrap();

        let calls = orch.gateway().calls.lock().unwrap();
        let (system, context) = &calls[0];
        assert_eq!(system, AgentPersonaRegistry::instructions(AgentRole::Governor));
        assert_eq!(context, "Unsafe lighting\nSentinel: Lights are broken");
    }

    #[tokio::test]
    async fn test_arbiter_shift_forced_to_zero() {
        let gateway = ScriptedGateway::new(vec![Ok(
            r#"{"message":"Install lights within 30 days","sentimentShift":9}"#.into(),
        )]);
        let orch = NegotiationOrchestrator::new(gateway);
        let log = alternating_log(6);

        let round = orch.conduct_round("Unsafe lighting", &log, 7).await.unwrap();
        assert_eq!(round.agent, AgentRole::Arbiter);
        assert_eq!(round.sentiment_shift, 0);
        assert_eq!(round.message, "Install lights within 30 days");
    }

    #[tokio::test]
    async fn test_wrong_round_number_rejected_without_call() {
        let mut mock = MockModelGateway::new();
        mock.expect_generate().never();
        let orch = NegotiationOrchestrator::new(mock);

        let err = orch
            .conduct_round("grievance", &alternating_log(2), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeliberationError::Validation(ValidationError::RoundOutOfSequence {
                expected: 3,
                requested: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_grievance_rejected_without_call() {
        let mut mock = MockModelGateway::new();
        mock.expect_generate().never();
        let orch = NegotiationOrchestrator::new(mock);

        let err = orch.conduct_round("   ", &[], 1).await.unwrap_err();
        assert!(matches!(
            err,
            DeliberationError::Validation(ValidationError::EmptyGrievance)
        ));
    }

    #[tokio::test]
    async fn test_generation_error_surfaced_verbatim() {
        let mut mock = MockModelGateway::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _| Err(GenerationError::QuotaExceeded("daily limit".into())));
        let orch = NegotiationOrchestrator::new(mock);

        let err = orch.conduct_round("grievance", &[], 1).await.unwrap_err();
        match err {
            DeliberationError::Generation(GenerationError::QuotaExceeded(msg)) => {
                assert_eq!(msg, "daily limit")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_retry_on_rate_limit() {
        let gateway = ScriptedGateway::new(vec![
            Err(GenerationError::RateLimited { retry_after: None }),
            Ok(r#"{"message":"should not be reached"}"#.into()),
        ]);
        let orch = NegotiationOrchestrator::new(gateway);

        assert!(orch.conduct_round("grievance", &[], 1).await.is_err());
        assert_eq!(orch.gateway().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_network_error() {
        let config = OrchestratorConfig {
            generation_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let orch = NegotiationOrchestrator::with_config(SlowGateway, config);

        let err = orch.conduct_round("grievance", &[], 1).await.unwrap_err();
        assert!(matches!(
            err,
            DeliberationError::Generation(GenerationError::NetworkError(ref m)) if m.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back() {
        let gateway = ScriptedGateway::new(vec![Ok("I refuse to use JSON.".into())]);
        let orch = NegotiationOrchestrator::new(gateway);

        let round = orch.conduct_round("grievance", &[], 1).await.unwrap();
        assert_eq!(round.message, "I refuse to use JSON.");
        assert_eq!(round.sentiment_shift, 0);
    }

    #[tokio::test]
    async fn test_timestamp_never_precedes_last_round() {
        let gateway = ScriptedGateway::new(vec![]);
        let orch = NegotiationOrchestrator::new(gateway);
        let mut log = alternating_log(1);
        log[0].timestamp = Utc::now() + ChronoDuration::hours(1);

        let round = orch.conduct_round("grievance", &log, 2).await.unwrap();
        assert!(round.timestamp >= log[0].timestamp);
    }

    #[tokio::test]
    async fn test_lagging_numbering_allows_stale_counter() {
        let gateway = ScriptedGateway::new(vec![]);
        let config = OrchestratorConfig {
            round_numbering: RoundNumbering::Lagging,
            ..Default::default()
        };
        let orch = NegotiationOrchestrator::with_config(gateway, config);

        let round = orch
            .conduct_round("grievance", &alternating_log(8), 5)
            .await
            .unwrap();
        assert_eq!(round.round, 5);
        assert_eq!(round.agent, AgentRole::Arbiter);

        let err = orch
            .conduct_round("grievance", &alternating_log(2), 4)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let err = orch.conduct_round("grievance", &[], 0).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_build_context_empty_log() {
        assert_eq!(build_context("Noise after 11pm", &[]), "Noise after 11pm");
    }

    #[test]
    fn test_round_numbering_from_str() {
        assert_eq!("strict".parse::<RoundNumbering>().unwrap(), RoundNumbering::Strict);
        assert_eq!("Lagging".parse::<RoundNumbering>().unwrap(), RoundNumbering::Lagging);
        assert!("loose".parse::<RoundNumbering>().is_err());
    }
}
