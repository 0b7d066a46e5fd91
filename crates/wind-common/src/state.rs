//! Window phase of the pulse counter.
//!
//! A sampling window alternates between two phases:
//! QUIESCENT → ARMED → QUIESCENT → ...
//!
//! While ARMED the edge detector may increment the pulse counter and the
//! sampling controller must not touch it. While QUIESCENT no edge detector
//! invocation can run, so the counter may be read and reset freely.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the pulse counter with respect to edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowPhase {
    /// Edge detection disabled; counter owned by the sampling controller.
    #[default]
    Quiescent,
    /// Edge detection enabled; counter written only by the edge detector.
    Armed,
}

impl fmt::Display for WindowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiescent => write!(f, "QUIESCENT"),
            Self::Armed => write!(f, "ARMED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quiescent() {
        assert_eq!(WindowPhase::default(), WindowPhase::Quiescent);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(WindowPhase::Armed.to_string(), "ARMED");
        assert_eq!(
            serde_json::to_string(&WindowPhase::Quiescent).unwrap(),
            "\"QUIESCENT\""
        );
    }
}
