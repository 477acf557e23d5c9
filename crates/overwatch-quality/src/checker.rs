use crate::types::{CheckCategory, QualityCheck};
use async_trait::async_trait;
use overwatch_core::{OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pluggable quality checker.
///
/// Checkers must be side-effect free and report expected failures as
/// `Failed` checks rather than errors. Any retrying of underlying tools is
/// the checker's own business.
#[async_trait]
pub trait QualityChecker: Send + Sync {
    /// Unique checker name.
    fn name(&self) -> &str;
    fn category(&self) -> CheckCategory;
    /// Produce zero or more checks for the given task context.
    async fn check(&self, context: &Value) -> Vec<QualityCheck>;
}

/// Declarative rule deciding whether a checker runs for a given context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckerPredicate {
    /// Always run.
    Always,
    /// Run when `context.flags.<name>` is `true`.
    Flag { name: String },
    /// Run when the JSON pointer resolves to a non-null value.
    Present { pointer: String },
    /// Run when every inner predicate holds.
    All { predicates: Vec<CheckerPredicate> },
    /// Run when at least one inner predicate holds.
    Any { predicates: Vec<CheckerPredicate> },
}

impl CheckerPredicate {
    pub fn flag(name: impl Into<String>) -> Self {
        CheckerPredicate::Flag { name: name.into() }
    }

    pub fn present(pointer: impl Into<String>) -> Self {
        CheckerPredicate::Present {
            pointer: pointer.into(),
        }
    }

    /// Evaluate against a task context.
    pub fn matches(&self, context: &Value) -> bool {
        match self {
            CheckerPredicate::Always => true,
            CheckerPredicate::Flag { name } => context
                .get("flags")
                .and_then(|flags| flags.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            CheckerPredicate::Present { pointer } => {
                context.pointer(pointer).is_some_and(|v| !v.is_null())
            }
            CheckerPredicate::All { predicates } => predicates.iter().all(|p| p.matches(context)),
            CheckerPredicate::Any { predicates } => predicates.iter().any(|p| p.matches(context)),
        }
    }

    /// Reject predicates that can never be meaningful.
    pub fn validate(&self) -> OverwatchResult<()> {
        match self {
            CheckerPredicate::Always => Ok(()),
            CheckerPredicate::Flag { name } if name.trim().is_empty() => Err(
                OverwatchError::CheckerMisconfiguration("flag predicate with empty name".into()),
            ),
            CheckerPredicate::Flag { .. } => Ok(()),
            CheckerPredicate::Present { pointer } if !pointer.starts_with('/') => {
                Err(OverwatchError::CheckerMisconfiguration(format!(
                    "JSON pointer '{pointer}' must start with '/'"
                )))
            }
            CheckerPredicate::Present { .. } => Ok(()),
            CheckerPredicate::All { predicates } | CheckerPredicate::Any { predicates } => {
                if predicates.is_empty() {
                    return Err(OverwatchError::CheckerMisconfiguration(
                        "composite predicate without members".into(),
                    ));
                }
                predicates.iter().try_for_each(CheckerPredicate::validate)
            }
        }
    }
}
