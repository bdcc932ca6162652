//! # proctest-cli
//!
//! Command-line front end: `proctest exec` supervises a single command,
//! `proctest run` walks a YAML scenario and reports each step.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
pub mod scenario_file;

use std::path::Path;

use anyhow::Result;
use proctest_scenario::{ConfigLoader, HarnessConfig};

/// Harness config from `--config`, or the default location
pub fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    let loader = match path {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
            ConfigLoader::with_path(path)
        }
        None => ConfigLoader::new(),
    };
    Ok(loader.load()?)
}
