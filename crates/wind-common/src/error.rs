use thiserror::Error;

/// Error types for the pulse meter covering configuration, counter access, and edge sources.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WsError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The pulse counter was read or reset while edge detection was armed.
    #[error("pulse counter accessed while armed: {0}")]
    CounterArmed(String),

    /// Invalid window phase transition attempted.
    #[error("invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition {
        /// Source phase.
        from: String,
        /// Attempted target phase.
        to: String,
    },

    /// Edge source could not be enabled or disabled.
    #[error("edge source error: {0}")]
    EdgeSource(String),

    /// I/O operation error (report output, indicator).
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for WsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Convenience type alias for pulse meter operations.
pub type WsResult<T> = Result<T, WsError>;
