//! Room command handlers.

use tabled::Tabled;
use tunely_core::RoomControl;
use tunely_core::tunely_api::models::Room;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "Sensor")]
    node: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Target °C")]
    target: String,
}

impl From<&Room> for RoomRow {
    fn from(r: &Room) -> Self {
        Self {
            node: r.node_uuid.clone(),
            name: r.name.clone(),
            active: if r.active_control { "yes" } else { "" }.into(),
            target: output::cell(Some(r.target_temperature)),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(ctx: &Context, tune: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let control = RoomControl::new(ctx.client(global)?);
    let rooms = control.rooms(tune).await?;
    let out = output::render_list(global.output, &rooms, |r| RoomRow::from(r))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set_active(
    ctx: &Context,
    tune: &str,
    node: &str,
    active: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let control = RoomControl::new(ctx.client(global)?);
    control.set_active_control(tune, node, active).await?;
    if !global.quiet {
        let verb = if active { "activated" } else { "deactivated" };
        eprintln!("Room sensor {node} {verb}");
    }
    Ok(())
}

pub async fn set_target(
    ctx: &Context,
    tune: &str,
    celsius: f64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let control = RoomControl::new(ctx.client(global)?);
    control.set_target_temperature(tune, celsius).await?;
    if !global.quiet {
        eprintln!("Target temperature set to {celsius:.1} °C");
    }
    Ok(())
}
