use thiserror::Error;

/// Errors returned by an expression evaluator.
///
/// The dispatcher matches on these to decide how an event is dropped,
/// so evaluator implementations should pick the closest kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Expression is empty")]
    EmptyExpression,

    #[error("Unknown sample referenced by expression: {0}")]
    UnknownSample(String),

    #[error("Expression evaluation failed: {0}")]
    Runtime(String),
}

impl EvalError {
    /// Creates a new runtime error
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        Self::Runtime(msg.into())
    }
}

/// Main error type for meterflow operations
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Unsupported scope type: {0}")]
    UnsupportedScope(String),

    #[error("Endpoint scope of meter {meter} has no endpoint name")]
    MissingEndpoint { meter: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Meter system error: {0}")]
    Engine(String),

    #[error("Timestamp {0}ms cannot be mapped to a time bucket")]
    InvalidTimestamp(i64),

    #[error("Invalid event on line {line}: {message}")]
    InvalidEvent { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for meterflow operations
pub type Result<T> = std::result::Result<T, MeterError>;

impl MeterError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new meter system error
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        Self::Engine(msg.into())
    }

    /// Returns true if this error must abort the enclosing initialization path.
    ///
    /// Scope errors mean no entity can ever be built for the meter, so they
    /// are never downgraded to a per-event drop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedScope(_) | Self::MissingEndpoint { .. } | Self::Config(_)
        )
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedScope(_) | Self::MissingEndpoint { .. } => "scope",
            Self::Config(_) => "config",
            Self::Evaluation(_) => "evaluation",
            Self::Engine(_) => "engine",
            Self::InvalidTimestamp(_) | Self::InvalidEvent { .. } => "validation",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
