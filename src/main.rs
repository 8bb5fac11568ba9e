use clap::Parser;
use fleetstats::app::FleetApp;
use fleetstats::cli::CliArgs;
use fleetstats::config::Config;
use fleetstats::interrupt::install_interrupt_handler;
use fleetstats::summary::EXIT_FATAL;
use fleetstats_core::domain::CancellationFlag;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    let default_level = if cli_args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting fleetstats");

    let config = match Config::from_cli_and_file(&cli_args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let cancel = CancellationFlag::new();
    if let Err(e) = install_interrupt_handler(cancel.clone()) {
        warn!("Ctrl-C will not stop processing gracefully: {:#}", e);
    }

    let app = FleetApp::new(config, cancel);

    if cli_args.discover_only {
        return match app.discover(&cli_args.root) {
            Ok(repositories) => {
                for repo in &repositories {
                    println!("{}", repo);
                }
                println!("{} repositories found", repositories.len());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::from(EXIT_FATAL)
            }
        };
    }

    match app.run(&cli_args.root, &cli_args.output) {
        Ok(summary) => {
            print!("{}", summary);
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
