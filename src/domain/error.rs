//! Domain error types.

/// Top-level error type for sentrader.
#[derive(Debug, thiserror::Error)]
pub enum SentraderError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("numeric error at bar {index}: {reason}")]
    Numeric { index: usize, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("no data for {symbol} {timeframe}")]
    NoData { symbol: String, timeframe: String },

    #[error("export error: {reason}")]
    Export { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SentraderError> for std::process::ExitCode {
    fn from(err: &SentraderError) -> Self {
        let code: u8 = match err {
            SentraderError::Io(_) | SentraderError::Export { .. } => 1,
            SentraderError::ConfigParse { .. }
            | SentraderError::ConfigMissing { .. }
            | SentraderError::ConfigInvalid { .. } => 2,
            SentraderError::Database { .. } | SentraderError::DatabaseQuery { .. } => 3,
            SentraderError::UnknownStrategy { .. } => 4,
            SentraderError::NoData { .. } => 5,
            SentraderError::InvalidInput { .. } | SentraderError::Numeric { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
