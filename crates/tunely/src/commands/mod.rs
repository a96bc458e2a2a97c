//! Command dispatch and shared setup.

pub mod config_cmd;
pub mod pair;
pub mod rooms;
pub mod run;

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tunely_config::Config;
use tunely_core::tunely_api::{Credential, TransportConfig, TunesClient};
use tunely_core::{CoreError, IntegrationConfig};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Loaded configuration plus where it came from.
pub struct Context {
    pub path: PathBuf,
    pub config: Config,
}

impl Context {
    fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = global
            .config
            .clone()
            .unwrap_or_else(tunely_config::config_path);
        let config = tunely_config::load_config_from(&path)?;
        Ok(Self { path, config })
    }

    /// Runtime config with the `--token` flag applied on top of the
    /// config file's resolution chain.
    pub fn integration_config(&self, global: &GlobalOpts) -> Result<IntegrationConfig, CliError> {
        let mut runtime = tunely_config::to_integration_config(&self.config)?;
        if let Some(ref token) = global.token {
            runtime.access_token = Some(SecretString::from(token.clone()));
        }
        Ok(runtime)
    }

    /// API client for one-shot commands; these need a token up front.
    pub fn client(&self, global: &GlobalOpts) -> Result<TunesClient, CliError> {
        let runtime = self.integration_config(global)?;
        let Some(token) = runtime.access_token else {
            return Err(no_credentials(&self.path));
        };
        let transport = TransportConfig {
            tls: runtime.tls,
            timeout: runtime.timeout,
        };
        TunesClient::new(&runtime.api_url, Credential::new(Some(token)), &transport)
            .map_err(|e| CoreError::from(e).into())
    }
}

fn no_credentials(path: &Path) -> CliError {
    CliError::NoCredentials {
        path: path.display().to_string(),
    }
}

pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;
    let ctx = Context::load(&global)?;
    tracing::debug!(command = ?cli.command, config = %ctx.path.display(), "dispatching command");

    match cli.command {
        Command::Config(args) => config_cmd::handle(&args, &ctx, &global),
        Command::Run => run::handle(&ctx, &global).await,
        Command::Pair(args) => pair::handle(&args, ctx, &global).await,
        Command::Rooms { tune } => rooms::list(&ctx, &tune, &global).await,
        Command::Activate { tune, node } => {
            rooms::set_active(&ctx, &tune, &node, true, &global).await
        }
        Command::Deactivate { tune, node } => {
            rooms::set_active(&ctx, &tune, &node, false, &global).await
        }
        Command::SetTarget { tune, celsius } => {
            rooms::set_target(&ctx, &tune, celsius, &global).await
        }
    }
}
