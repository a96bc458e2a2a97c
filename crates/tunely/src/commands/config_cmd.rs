//! Config subcommand handlers.

use tunely_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::Context;

const MASK: &str = "****";

/// Copy of `cfg` that is safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    if out.access_token.is_some() {
        out.access_token = Some(MASK.into());
    }
    out
}

pub fn handle(args: &ConfigArgs, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&ctx.path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let shown = redacted(&ctx.config);
            let out = match global.output {
                OutputFormat::Table => toml::to_string_pretty(&shown)
                    .map_err(tunely_config::ConfigError::from)?,
                OutputFormat::Json => serde_json::to_string_pretty(&shown)?,
                OutputFormat::JsonCompact => serde_json::to_string(&shown)?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
