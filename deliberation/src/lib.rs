//! Grievance Deliberation Engine
//!
//! This library provides:
//! - A turn-based negotiation orchestrator driving two opposing personas
//!   (Sentinel and Governor) over a free-text grievance
//! - A stalemate predicate that overrides the rotation and escalates to a
//!   neutral Arbiter
//! - Total, bounds-enforcing parsing of untrusted model output
//! - Administrator-driven consensus finalization with atomic commits
//!
//! # Usage
//!
//! ```rust,ignore
//! use deliberation::{DeliberationService, GeminiConfig, GeminiGateway, InMemorySessionStore};
//!
//! let gateway = GeminiGateway::new(GeminiConfig::default())?;
//! let service = DeliberationService::new(gateway, Arc::new(InMemorySessionStore::new()));
//! let session = service
//!     .open_session(None, "Unsafe lighting near hostel", BudgetLevel::Low, UrgencyLevel::High)
//!     .await?;
//! let rounds = service.run_until_arbiter(&session.id, 12).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod debate;
pub mod gateway;
pub mod service;

// Re-export key engine types
pub use debate::{
    assign_turn, AdminParameters, AgentPersonaRegistry, AgentRole, BudgetLevel,
    ConsensusFinalizer, DeliberationError, DeliberationResult, FinalCommit, FinalizeOutcome,
    FinalizerConfig, InMemorySessionStore, NegotiationOrchestrator, NegotiationSession,
    OrchestratorConfig, ParsedConsensus, ParsedResponse, PersistenceError, PersistenceGateway,
    Round, RoundNumbering, SentimentAccumulator, SentimentTotals, SessionPhase, SessionRecord,
    StalemateDetector, TurnAssignment, UrgencyLevel, ValidationError,
};

// Re-export gateway types
pub use gateway::{GeminiConfig, GeminiGateway, GenerationError, ModelGateway};

// Re-export host service types
pub use service::{DeliberationService, ServiceConfig, SessionSnapshot};
