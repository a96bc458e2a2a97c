// ── Pairing discovery ──
//
// Lists the devices of one kind that could be added, across every
// installation visible to the access token.

use serde::Serialize;
use tracing::debug;
use tunely_api::TunesClient;
use tunely_api::models::{DEVICE_TYPE_TRACK_HAN, DEVICE_TYPE_TRACK_OPTO, Tune};

use crate::config::{DeviceDescriptor, DeviceKind};
use crate::error::CoreError;

/// A device that can be paired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingCandidate {
    pub kind: DeviceKind,
    pub id: String,
    pub tune_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<String>,
}

impl From<PairingCandidate> for DeviceDescriptor {
    fn from(c: PairingCandidate) -> Self {
        Self {
            kind: c.kind,
            id: c.id,
            tune_id: c.tune_id,
            name: c.name,
            controller_id: c.controller_id,
        }
    }
}

/// Discover pairable devices of `kind`.
pub async fn discover(
    client: &TunesClient,
    kind: DeviceKind,
) -> Result<Vec<PairingCandidate>, CoreError> {
    let mut found = Vec::new();
    for summary in client.list_tunes().await? {
        let tune = client.get_tune(&summary.tune_uuid).await?;
        let before = found.len();
        candidates_in(&tune, kind, &mut found);
        debug!(
            tune_id = %tune.uuid,
            %kind,
            count = found.len() - before,
            "scanned installation"
        );
    }
    Ok(found)
}

/// Collect candidates of `kind` from one installation's topology.
pub fn candidates_in(tune: &Tune, kind: DeviceKind, out: &mut Vec<PairingCandidate>) {
    let tune_name = tune.display_name();
    let controller_id = tune.controller_uuid().map(str::to_owned);

    match kind {
        DeviceKind::Sensor => {
            out.extend(tune.rooms.iter().map(|room| PairingCandidate {
                kind,
                id: room.node_uuid.clone(),
                tune_id: tune.uuid.clone(),
                name: room.name.clone(),
                controller_id: None,
            }));
        }
        DeviceKind::Tune => {
            if controller_id.is_some() {
                out.push(PairingCandidate {
                    kind,
                    id: tune.uuid.clone(),
                    tune_id: tune.uuid.clone(),
                    name: tune_name.to_owned(),
                    controller_id,
                });
            }
        }
        DeviceKind::OutdoorSensor => {
            if let Some(controller) = controller_id {
                out.push(PairingCandidate {
                    kind,
                    id: format!("{controller}-outdoor"),
                    tune_id: tune.uuid.clone(),
                    name: format!("{tune_name} outdoor"),
                    controller_id: Some(controller),
                });
            }
        }
        DeviceKind::TrackOpto | DeviceKind::TrackHan => {
            let wanted = if kind == DeviceKind::TrackOpto {
                DEVICE_TYPE_TRACK_OPTO
            } else {
                DEVICE_TYPE_TRACK_HAN
            };
            out.extend(
                tune.gateway
                    .children
                    .iter()
                    .filter(|n| n.device_type() == Some(wanted))
                    .map(|n| PairingCandidate {
                        kind,
                        id: n.uuid.clone(),
                        tune_id: tune.uuid.clone(),
                        name: format!("{tune_name} track"),
                        controller_id: None,
                    }),
            );
        }
    }
}
