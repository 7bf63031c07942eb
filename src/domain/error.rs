//! Domain error types.

/// Top-level error type for edgefinder.
#[derive(Debug, thiserror::Error)]
pub enum EdgefinderError {
    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("market data unavailable: {reason}")]
    DataUnavailable { reason: String },

    #[error("invalid parameter grid: {reason}")]
    GridInvalid { reason: String },

    #[error("parameter grid has no candidate values for '{tunable}'")]
    EmptyCandidates { tunable: String },

    #[error("unknown strategy '{id}'")]
    UnknownStrategy { id: String },

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

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EdgefinderError> for std::process::ExitCode {
    fn from(err: &EdgefinderError) -> Self {
        let code: u8 = match err {
            EdgefinderError::Io(_) => 1,
            EdgefinderError::ConfigParse { .. }
            | EdgefinderError::ConfigMissing { .. }
            | EdgefinderError::ConfigInvalid { .. } => 2,
            EdgefinderError::Storage { .. } => 3,
            EdgefinderError::GridInvalid { .. }
            | EdgefinderError::EmptyCandidates { .. }
            | EdgefinderError::UnknownStrategy { .. } => 4,
            EdgefinderError::InsufficientData { .. } | EdgefinderError::DataUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn insufficient_data_reports_bar_count() {
        let err = EdgefinderError::InsufficientData {
            bars: 42,
            minimum: 200,
        };
        assert_eq!(err.to_string(), "insufficient data: have 42 bars, need 200");
    }

    #[test]
    fn exit_codes_distinguish_families() {
        let data = EdgefinderError::DataUnavailable {
            reason: "timeout".into(),
        };
        let grid = EdgefinderError::EmptyCandidates {
            tunable: "stop_atr_mult".into(),
        };
        let config = EdgefinderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        };
        assert_eq!(ExitCode::from(&data), ExitCode::from(5));
        assert_eq!(ExitCode::from(&grid), ExitCode::from(4));
        assert_eq!(ExitCode::from(&config), ExitCode::from(2));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EdgefinderError = io.into();
        assert!(matches!(err, EdgefinderError::Io(_)));
    }
}
