// proctest CLI entry point

use clap::Parser;
use proctest_cli::{
    cli::{Cli, Commands},
    commands, load_config,
    logging::{effective_level, init_logging, Verbosity},
    output::OutputStyle,
};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(effective_level(verbosity, None));
            error!("{:#}", e);
            std::process::exit(2);
        }
    };
    init_logging(effective_level(verbosity, config.log_level.as_deref()));

    let result = match cli.command {
        Commands::Exec {
            timeout,
            io_wait,
            cwd,
            cmdline,
        } => commands::exec(config, timeout, io_wait, cwd, &cmdline).await,
        Commands::Run { file } => commands::run(config, &file, &OutputStyle::default()).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("proctest: {:#}", e);
            std::process::exit(2);
        }
    }
}
