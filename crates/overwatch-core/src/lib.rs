//! Core types and error definitions for the Overwatch orchestrator.
//!
//! This crate provides the foundational types shared across all Overwatch
//! crates: the error taxonomy, the time source abstraction and the
//! notification message model.
//!
//! # Main types
//!
//! - [`OverwatchError`]: Unified error enum for every subsystem.
//! - [`OverwatchResult`]: Convenience alias for `Result<T, OverwatchError>`.
//! - [`Clock`]: Injectable time source ([`SystemClock`], [`ManualClock`]).
//! - [`Message`]: A status event addressed to human operators.

/// Time source abstraction.
pub mod clock;
/// Error taxonomy.
pub mod error;
/// Operator-facing message model.
pub mod message;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{OverwatchError, OverwatchResult};
pub use message::{ActionKind, Message, MessageAction, MessageSeverity, SourceKind};

/// Clamp a score into `[0, 1]`, mapping NaN to zero.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }
}
