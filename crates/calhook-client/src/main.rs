//! calhook CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calhook_client::cli::{Cli, Command, ConfigAction};
use calhook_client::commands::serve::ServeOverrides;
use calhook_client::config::ClientConfig;
use calhook_client::error::{ClientError, ClientResult};
use calhook_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .map_err(ClientError::Config)?;
    config.apply_env_overrides().map_err(ClientError::Config)?;

    match cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => calhook_client::commands::config::dump(&config),
            ConfigAction::Validate => calhook_client::commands::config::validate(&config),
            ConfigAction::Path => calhook_client::commands::config::path(),
        },
        Some(Command::Serve {
            port,
            public_url,
            events_file,
        }) => {
            start_tracing(&config, cli.debug)?;
            let overrides = ServeOverrides {
                port,
                public_url,
                events_file,
            };
            calhook_client::commands::serve::run(config, overrides).await
        }
        None => {
            start_tracing(&config, cli.debug)?;
            calhook_client::commands::serve::run(config, ServeOverrides::default()).await
        }
    }
}

fn start_tracing(config: &ClientConfig, debug: bool) -> ClientResult<()> {
    let tracing_config = config
        .logging
        .to_tracing_config(debug)
        .map_err(ClientError::Config)?;
    init_tracing(tracing_config)?;
    Ok(())
}
