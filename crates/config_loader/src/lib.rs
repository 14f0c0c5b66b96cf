//! # Config Loader
//!
//! Scenario loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON scenario files
//! - Validate scenario legality
//! - Produce a [`Scenario`] ready to drive a sequencer
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let scenario = ConfigLoader::load_from_path(Path::new("scenario.toml")).unwrap();
//! println!("{} cues", scenario.cue_count());
//! ```

mod parser;
mod validator;

pub use contracts::Scenario;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Scenario loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a scenario from file path
    ///
    /// The format follows the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<Scenario, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a scenario from string
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Scenario, ContractError> {
        let scenario = parser::parse(content, format)?;
        validator::validate(&scenario)?;
        Ok(scenario)
    }

    /// Check an already built scenario
    pub fn validate(scenario: &Scenario) -> Result<(), ContractError> {
        validator::validate(scenario)
    }

    pub fn to_toml(scenario: &Scenario) -> Result<String, ContractError> {
        toml::to_string_pretty(scenario)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize to JSON. Infinite interval bounds have no JSON form.
    pub fn to_json(scenario: &Scenario) -> Result<String, ContractError> {
        serde_json::to_string_pretty(scenario)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
