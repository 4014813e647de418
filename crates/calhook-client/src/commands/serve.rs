//! Serve command: runs the webhook server in the foreground.

use std::path::PathBuf;

use tracing::info;

use calhook_server::{AppState, SignalHandler, serve};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Flag overrides given on the command line.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub events_file: Option<PathBuf>,
}

impl ServeOverrides {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.public_url {
            config.server.public_url = Some(url);
        }
        if let Some(path) = self.events_file {
            config.server.events_file = Some(path);
        }
    }
}

/// Runs until SIGINT/SIGTERM, then stops every channel.
pub async fn run(mut config: ClientConfig, overrides: ServeOverrides) -> ClientResult<()> {
    overrides.apply(&mut config);

    let server_config = config.to_server_config().map_err(ClientError::Config)?;
    let google_config = config.to_google_config().map_err(ClientError::Config)?;

    info!(
        calendar_id = %google_config.calendar_id,
        public_url = server_config.public_url.as_deref().unwrap_or("<loopback>"),
        persistent_log = server_config.events_file.is_some(),
        "starting calhook"
    );

    let state = AppState::new(server_config, google_config)?;

    let signals = SignalHandler::new();
    signals.spawn_listener();
    serve(state, signals.shutdown_handle()).await?;
    Ok(())
}
