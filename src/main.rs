//! Assessor CLI entry point.

use clap::Parser;

use adaptive_assessor::cli::{commands, handle_error, load_config, Cli, Commands};
use adaptive_assessor::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Interactive sessions share the terminal with the logger.
    if cli.command.is_interactive() && !cli.verbose {
        config.logging.level = "warn".to_string();
    }
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, config, cli.json).await,
        Commands::Quiz(args) => commands::quiz::execute(args, config, cli.json).await,
        Commands::Attempts(args) => commands::attempts::execute(args, config, cli.json).await,
        Commands::Profile(args) => commands::profile::execute(args, config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
