//! Pairing: list candidates, optionally add them to the config file.

use tabled::Tabled;
use tunely_core::{DeviceDescriptor, PairingCandidate, discover};

use crate::cli::{GlobalOpts, PairArgs};
use crate::error::CliError;
use crate::output;

use super::Context;

#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Installation")]
    tune_id: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&PairingCandidate> for CandidateRow {
    fn from(c: &PairingCandidate) -> Self {
        Self {
            kind: c.kind.to_string(),
            id: c.id.clone(),
            tune_id: c.tune_id.clone(),
            name: c.name.clone(),
        }
    }
}

pub async fn handle(args: &PairArgs, mut ctx: Context, global: &GlobalOpts) -> Result<(), CliError> {
    let client = ctx.client(global)?;
    let candidates = discover(&client, args.kind).await?;

    let out = output::render_list(global.output, &candidates, |c| CandidateRow::from(c))?;
    output::print_output(&out, global.quiet);

    if args.add {
        let added = merge_devices(&mut ctx.config.devices, candidates);
        tunely_config::save_config_to(&ctx.config, &ctx.path)?;
        if !global.quiet {
            eprintln!("Added {added} device(s) to {}", ctx.path.display());
        }
    }
    Ok(())
}

/// Append candidates whose id is not configured yet. Returns how many
/// were added.
fn merge_devices(devices: &mut Vec<DeviceDescriptor>, candidates: Vec<PairingCandidate>) -> usize {
    let before = devices.len();
    for candidate in candidates {
        if devices.iter().all(|d| d.id != candidate.id) {
            devices.push(candidate.into());
        }
    }
    devices.len() - before
}
