//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Scenario file not found: {path}")]
    ScenarioNotFound { path: String },

    #[error("Failed to parse scenario: {message}")]
    ScenarioParse { message: String },

    #[error("Scenario validation failed: {message}")]
    ScenarioValidation { message: String },

    /// The engine rejected an operation while running
    #[error("Simulation failed: {message}")]
    Simulation { message: String },

    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn scenario_not_found(path: impl Into<String>) -> Self {
        Self::ScenarioNotFound { path: path.into() }
    }

    pub fn simulation(message: impl Into<String>) -> Self {
        Self::Simulation {
            message: message.into(),
        }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ScenarioNotFound { .. } | Self::Io(_) => 2,
            Self::ScenarioParse { .. } | Self::ScenarioValidation { .. } => 3,
            Self::Simulation { .. } | Self::Shutdown { .. } => 4,
        }
    }
}

impl From<ContractError> for CliError {
    fn from(e: ContractError) -> Self {
        match e {
            ContractError::ConfigParse { .. } => Self::ScenarioParse {
                message: e.to_string(),
            },
            ContractError::ConfigValidation { .. } => Self::ScenarioValidation {
                message: e.to_string(),
            },
            ContractError::Io(io) => Self::Io(io),
            other => Self::simulation(other.to_string()),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let parse: CliError = ContractError::config_parse("bad toml").into();
        assert!(matches!(parse, CliError::ScenarioParse { .. }));
        assert_eq!(parse.exit_code(), 3);

        let invalid: CliError =
            ContractError::config_validation("duration_s", "must be > 0").into();
        assert!(invalid.to_string().contains("duration_s"));
        assert_eq!(invalid.exit_code(), 3);

        let cue: CliError = ContractError::invalid_cue(0, "empty key").into();
        assert_eq!(cue.exit_code(), 4);

        assert_eq!(CliError::scenario_not_found("x.toml").exit_code(), 2);
    }
}
