//! # proctest-scenario
//!
//! **Purpose**: Drive several external processes through one black-box test
//!
//! ## Features
//!
//! - **Process Registry**: every handle started during a scenario, in start
//!   order, addressable by label (latest wins), by position, or all at once
//! - **Scenario Context**: spawn/execute with shared defaults, an isolated
//!   environment store and a working directory
//! - **Completion Verdicts**: distinguish a failed program from a hung one
//! - **Configuration**: TOML file plus `PROCTEST_*` environment overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use proctest_scenario::Scenario;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scenario = Scenario::with_defaults()?;
//! scenario.env_mut().set("LANG", "C");
//!
//! scenario.execute("version", "mytool --version").await?;
//! scenario.expect_completed("version")?;
//!
//! let server = scenario.spawn("server", "mytool serve").await?;
//! server.write(b"quit\n").await?;
//! server.stop().await?;
//!
//! println!("{}", String::from_utf8_lossy(&scenario.registry().all_output()));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod registry;
pub mod scenario;
pub mod verdict;

#[cfg(test)]
mod testing;

pub use config::{ConfigLoader, HarnessConfig, HookConfig};
pub use env::EnvStore;
pub use error::{Result, ScenarioError};
pub use registry::ProcessRegistry;
pub use scenario::{RunOptions, Scenario};
pub use verdict::{check_completed, CompletionError};
