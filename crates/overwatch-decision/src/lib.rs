//! Decision engine: scores a proposed action for confidence and risk and
//! decides whether to execute it, propose it or escalate it to a human.
//!
//! # Main types
//!
//! - [`DecisionEngine`]: Scores requests and keeps a bounded decision history.
//! - [`DecisionConfig`]: Factor weights, action table and team maturity.
//! - [`Decision`]: Immutable scored recommendation.
//! - [`Signals`]: Normalized inputs read from a task's opaque context.

/// Engine configuration.
pub mod config;
/// The scoring engine and decision history.
pub mod engine;
/// Context signal extraction.
pub mod signals;
/// Decision types.
pub mod types;

pub use config::{ActionThreshold, ConfidenceWeights, DecisionConfig, RiskWeights};
pub use engine::{DecisionEngine, DecisionRequest};
pub use signals::Signals;
pub use types::{Decision, DecisionAction, Factor, FactorBreakdown};
