//! Clap derive structures for the `tunely` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tunely_core::DeviceKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tunely -- poll and control Ngenic Tunes heating systems
#[derive(Debug, Parser)]
#[command(
    name = "tunely",
    version,
    about = "Poll and control Ngenic Tunes heating systems",
    long_about = "Polls room sensors, controllers and Track energy meters through the\n\
        Ngenic Tunes cloud API on a shared rate budget, and changes room\n\
        control settings without ever leaving an installation uncontrolled.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TUNELY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Access token (overrides env var, keyring and config file)
    #[arg(long, env = "TUNELY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TUNELY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the configured devices until interrupted (SIGHUP reloads the token)
    Run,

    /// List devices of a kind that can be paired
    Pair(PairArgs),

    /// Show the rooms of an installation
    Rooms {
        /// Installation (tune) UUID
        tune: String,
    },

    /// Let a room sensor take part in heating control
    Activate {
        /// Installation (tune) UUID
        tune: String,
        /// Room sensor node UUID
        node: String,
    },

    /// Stop a room sensor from taking part in heating control
    Deactivate {
        /// Installation (tune) UUID
        tune: String,
        /// Room sensor node UUID
        node: String,
    },

    /// Set the target temperature of every room of an installation
    SetTarget {
        /// Installation (tune) UUID
        tune: String,
        /// Target temperature in °C
        #[arg(allow_negative_numbers = true)]
        celsius: f64,
    },

    /// Inspect the configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Device kind: tune, sensor, outdoor_sensor, track_opto, track_han
    #[arg(value_parser = parse_kind)]
    pub kind: DeviceKind,

    /// Add every candidate to the config file
    #[arg(long)]
    pub add: bool,
}

fn parse_kind(raw: &str) -> Result<DeviceKind, String> {
    raw.replace('-', "_")
        .parse()
        .map_err(|_| format!("unknown device kind '{raw}'"))
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration (secrets masked)
    Show,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pair_accepts_dashed_kinds() {
        let cli = Cli::try_parse_from(["tunely", "pair", "track-han", "--add"]).unwrap();
        match cli.command {
            Command::Pair(args) => {
                assert_eq!(args.kind, DeviceKind::TrackHan);
                assert!(args.add);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["tunely", "pair", "toaster"]).is_err());
    }

    #[test]
    fn globals_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tunely", "set-target", "t1", "21.5", "-o", "json", "-vv", "--log-format", "json",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(matches!(cli.global.output, OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Command::SetTarget { ref tune, celsius } if tune == "t1" && (celsius - 21.5).abs() < f64::EPSILON
        ));
    }
}
