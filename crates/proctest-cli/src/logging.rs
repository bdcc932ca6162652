// Logging setup for the proctest binary

use tracing::Level;

/// Verbosity requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

/// Parse a configured level name; unknown names fall back to `warn`
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

/// Flags win over the configured level
pub fn effective_level(verbosity: Verbosity, configured: Option<&str>) -> Level {
    match verbosity {
        Verbosity::Quiet => Level::ERROR,
        Verbosity::Verbose => Level::DEBUG,
        Verbosity::Normal => configured.map(parse_level).unwrap_or(Level::WARN),
    }
}

/// Install the stderr subscriber; a second call is ignored
pub fn init_logging(level: Level) {
    let debug = level >= Level::DEBUG;
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .try_init();
}
