//! Grievance Deliberation — Sentinel/Governor Negotiation with Arbiter Escalation
//!
//! Turn-based adversarial negotiation between two personas over a grievance.
//! A stalemate predicate overrides the normal rotation and hands the turn to
//! a neutral Arbiter; an administrator can re-run synthesis at any time.
//!
//! # Session Flow
//!
//! ```text
//! Negotiating: Sentinel → Governor → Sentinel → ...
//!   │                                   │
//!   │          (round > 3 && log ≥ 6)   │
//!   │                                   ▼
//!   │                              Arbiter round
//!   │                                   │
//!   │                                   ▼
//!   └─ finalize(admin params) ──────► Finalized ◄─┐
//!                                       │         │
//!                                       └─────────┘
//!                                 (finalize again: override)
//! ```

pub mod consensus;
pub mod error;
pub mod guardrails;
pub mod orchestrator;
pub mod parser;
pub mod persistence;
pub mod persona;
pub mod sentiment;
pub mod state;

pub use consensus::{AdminParameters, ConsensusFinalizer, FinalizeOutcome, FinalizerConfig};
pub use error::{DeliberationError, DeliberationResult, ValidationError};
pub use guardrails::{assign_turn, StalemateDetector, TurnAssignment};
pub use orchestrator::{NegotiationOrchestrator, OrchestratorConfig, RoundNumbering};
pub use parser::{ParsedConsensus, ParsedResponse};
pub use persistence::{
    FinalCommit, InMemorySessionStore, PersistenceError, PersistenceGateway, SessionRecord,
};
pub use persona::AgentPersonaRegistry;
pub use sentiment::{SentimentAccumulator, SentimentTotals};
pub use state::{AgentRole, BudgetLevel, NegotiationSession, Round, SessionPhase, UrgencyLevel};
