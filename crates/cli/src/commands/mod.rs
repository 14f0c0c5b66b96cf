//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_scenario;
pub use validate::run_validate;

use std::path::Path;

use contracts::Scenario;

use crate::error::{CliError, Result};

/// Load and validate a scenario file.
pub(crate) fn load_scenario(path: &Path) -> Result<Scenario> {
    if !path.exists() {
        return Err(CliError::scenario_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
