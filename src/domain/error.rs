//! Domain error types.

/// Top-level error type for signal-risk.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no historical data for {ticker}")]
    MissingData { ticker: String },

    #[error("malformed signal: {reason}")]
    MalformedSignal { reason: String },

    #[error("computation error in {context}: {reason}")]
    Computation { context: String, reason: String },

    #[error("insufficient data for {context}: have {have}, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn computation(context: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Computation {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        EngineError::MalformedSignal {
            reason: reason.into(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) | EngineError::Json(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::DataSource { .. } | EngineError::MissingData { .. } => 3,
            EngineError::MalformedSignal { .. } => 4,
            EngineError::Computation { .. } | EngineError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
