//! Quality gate pipeline: runs registered checkers against a task's context
//! and folds their results into a severity-weighted verdict.
//!
//! # Main types
//!
//! - [`QualityGatePipeline`]: Ordered checker registry and evaluator.
//! - [`QualityChecker`]: Plugin trait implemented by every checker.
//! - [`CheckerPredicate`]: Declarative rule selecting checkers per context.
//! - [`QualityGateResult`]: Verdict, score, blockers and suggestions.

/// Built-in checkers driven by reports embedded in the task context.
pub mod builtin;
/// Checker plugin trait and selection predicates.
pub mod checker;
/// Pipeline and built-in checker configuration.
pub mod config;
/// The evaluation pipeline.
pub mod pipeline;
/// Check and verdict types.
pub mod types;

pub use builtin::{
    ArchitectureChecker, DomainDataChecker, PerformanceChecker, SecurityChecker,
    StaticAnalysisChecker, TestCoverageChecker,
};
pub use checker::{CheckerPredicate, QualityChecker};
pub use config::{BuiltinThresholds, QualityConfig};
pub use pipeline::QualityGatePipeline;
pub use types::{
    CheckCategory, CheckSeverity, CheckStatus, QualityCheck, QualityGateResult, Verdict,
};
