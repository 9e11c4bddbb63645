use std::path::{Path, PathBuf};

use mpwmerge::config::MergeConfig;
use mpwmerge::error::Result;
use mpwmerge::merge::{Merger, Outputs};

/// Overrides applied on top of a loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub framework: Option<PathBuf>,
    pub submissions: Option<PathBuf>,
    pub top_cell: Option<String>,
}

/// Loads the configuration at `path`, or the defaults if there is none.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<MergeConfig> {
    let mut config = match path {
        Some(path) => MergeConfig::from_toml_file(path)?,
        None => MergeConfig::default(),
    };
    if let Some(dir) = overrides.framework {
        config.framework_dir = dir;
    }
    if let Some(dir) = overrides.submissions {
        config.submissions_dir = dir;
    }
    if let Some(name) = overrides.top_cell {
        config.top_cell_name = name.into();
    }
    config.validate()?;
    Ok(config)
}

/// Merges every discovered file and writes the outputs to `output`.
///
/// An aborted merge still leaves its text log in `output`.
pub fn merge(config: MergeConfig, output: impl AsRef<Path>) -> Result<(Merger, Outputs)> {
    Merger::run_to(config, output)
}
