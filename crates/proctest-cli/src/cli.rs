// Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// proctest - run commands under supervision and check how they finish
#[derive(Parser, Debug)]
#[command(name = "proctest")]
#[command(bin_name = "proctest")]
#[command(about = "Run commands under exit and io-wait timeouts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Harness configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one command and exit with its status (124 if it hung)
    Exec {
        /// Exit timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<f64>,

        /// Longest allowed output silence in seconds
        #[arg(long, value_name = "SECS")]
        io_wait: Option<f64>,

        /// Working directory for the command
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmdline: Vec<String>,
    },

    /// Run every step of a YAML scenario file
    Run {
        /// Scenario file
        #[arg(value_name = "SCENARIO")]
        file: PathBuf,
    },
}
