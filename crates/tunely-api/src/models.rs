// Wire types for the Tunes v3 API.
//
// Field names follow the API's camelCase JSON. Types that are written back
// upstream after a read (rooms, control settings) keep unknown fields in a
// flattened map so a read-modify-write never drops data we don't model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

// ── Node and device type codes ──────────────────────────────────────

/// Role of a node within an installation's gateway tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum NodeType {
    Sensor,
    Controller,
    Gateway,
    GatewayInternal,
    Unknown(u8),
}

impl From<u8> for NodeType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Sensor,
            1 => Self::Controller,
            2 => Self::Gateway,
            3 => Self::GatewayInternal,
            other => Self::Unknown(other),
        }
    }
}

impl From<NodeType> for u8 {
    fn from(t: NodeType) -> Self {
        match t {
            NodeType::Sensor => 0,
            NodeType::Controller => 1,
            NodeType::Gateway => 2,
            NodeType::GatewayInternal => 3,
            NodeType::Unknown(code) => code,
        }
    }
}

/// Hardware device type code of the Track optical pulse reader.
pub const DEVICE_TYPE_TRACK_OPTO: u32 = 9;
/// Hardware device type code of the Track HAN port reader.
pub const DEVICE_TYPE_TRACK_HAN: u32 = 11;

// ── Installations ───────────────────────────────────────────────────

/// One entry of `GET tunes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuneSummary {
    pub tune_uuid: String,
    #[serde(default)]
    pub tune_name: String,
}

/// Full installation topology from `GET tunes/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tune {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tune_name: Option<String>,
    #[serde(default)]
    pub gateway: Gateway,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

impl Tune {
    /// UUID of the first controller node under the gateway.
    pub fn controller_uuid(&self) -> Option<&str> {
        self.gateway
            .children
            .iter()
            .find(|n| n.node_type == NodeType::Controller)
            .map(|n| n.uuid.as_str())
    }

    /// Display name, preferring the user-facing tune name.
    pub fn display_name(&self) -> &str {
        self.tune_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Any addressable node in the gateway tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub uuid: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub device: Option<NodeDevice>,
}

impl Node {
    pub fn device_type(&self) -> Option<u32> {
        self.device.as_ref().map(|d| d.device_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDevice {
    #[serde(rename = "type")]
    pub device_type: u32,
}

// ── Rooms and control settings ──────────────────────────────────────

/// A controllable zone. Exactly one sensor node is authoritative per room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub node_uuid: String,
    #[serde(default)]
    pub active_control: bool,
    #[serde(default)]
    pub target_temperature: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Spot-price control flags of an installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSettings {
    #[serde(default)]
    pub control_on_spot_price: bool,
    #[serde(default)]
    pub spot_price_factor_index: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Measurements ────────────────────────────────────────────────────

/// Named measurement types understood by the measurements endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
pub enum MeasurementType {
    #[strum(serialize = "temperature_C")]
    Temperature,
    #[strum(serialize = "humidity_relative_percent")]
    Humidity,
    #[strum(serialize = "setpoint_value_C")]
    Setpoint,
    #[strum(serialize = "process_value_C")]
    ProcessValue,
    #[strum(serialize = "control_value_C")]
    ControlValue,
    #[strum(serialize = "power_kW")]
    Power,
    #[strum(serialize = "produced_power_kW")]
    ProducedPower,
    #[strum(serialize = "L1_current_A")]
    CurrentL1,
    #[strum(serialize = "L2_current_A")]
    CurrentL2,
    #[strum(serialize = "L3_current_A")]
    CurrentL3,
    #[strum(serialize = "energy_kWH")]
    Energy,
    #[strum(serialize = "produced_energy_kWH")]
    ProducedEnergy,
}

/// A single scalar measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub value: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "type")]
    pub measurement_type: Option<String>,
}

/// Aggregated measurement response over a time range.
///
/// Without a `period` parameter the API answers with one aggregate object;
/// with one it answers with a list. Both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementSeries {
    Single(Measurement),
    Many(Vec<Measurement>),
}

impl MeasurementSeries {
    /// Sum of all values in the range.
    pub fn total(&self) -> f64 {
        match self {
            Self::Single(m) => m.value,
            Self::Many(items) => items.iter().map(|m| m.value).sum(),
        }
    }
}

// ── Node status ─────────────────────────────────────────────────────

/// Battery and radio health of one node, from `GET tunes/{id}/nodestatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub node_uuid: String,
    #[serde(default)]
    pub battery: f64,
    #[serde(default)]
    pub max_battery: f64,
    #[serde(default)]
    pub radio_status: f64,
    #[serde(default)]
    pub max_radio_status: f64,
}

impl NodeStatus {
    /// Battery level in percent. Nodes that report no maximum already
    /// report a percentage.
    pub fn battery_percent(&self) -> f64 {
        if self.max_battery > 0.0 {
            self.battery / self.max_battery * 100.0
        } else {
            self.battery
        }
    }

    /// Radio signal strength in percent, if the node reports a scale.
    pub fn signal_percent(&self) -> Option<f64> {
        (self.max_radio_status > 0.0).then(|| self.radio_status / self.max_radio_status * 100.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_round_trip_keeps_unknown_fields() {
        let raw = json!({
            "uuid": "r1",
            "name": "Kitchen",
            "nodeUuid": "n1",
            "activeControl": true,
            "targetTemperature": 21.5,
            "comfortOffset": 2
        });
        let mut room: Room = serde_json::from_value(raw).unwrap();
        room.active_control = false;

        let back = serde_json::to_value(&room).unwrap();
        assert_eq!(back["comfortOffset"], 2);
        assert_eq!(back["activeControl"], false);
        assert_eq!(back["nodeUuid"], "n1");
    }

    #[test]
    fn room_without_name_is_written_back_without_name() {
        let raw = json!({ "nodeUuid": "n1", "activeControl": true, "targetTemperature": 20.0 });
        let room: Room = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(serde_json::to_value(&room).unwrap(), raw);
    }

    #[test]
    fn node_type_codes() {
        let node: Node = serde_json::from_value(json!({
            "uuid": "c1", "type": 1, "device": { "type": 5 }
        }))
        .unwrap();
        assert_eq!(node.node_type, NodeType::Controller);
        assert_eq!(node.device_type(), Some(5));

        let odd: Node = serde_json::from_value(json!({ "uuid": "x", "type": 42 })).unwrap();
        assert_eq!(odd.node_type, NodeType::Unknown(42));
    }

    #[test]
    fn series_accepts_both_shapes() {
        let single: MeasurementSeries =
            serde_json::from_value(json!({ "value": 3.5, "type": "energy_kWH" })).unwrap();
        assert!((single.total() - 3.5).abs() < f64::EPSILON);

        let many: MeasurementSeries =
            serde_json::from_value(json!([{ "value": 1.0 }, { "value": 2.25 }])).unwrap();
        assert!((many.total() - 3.25).abs() < f64::EPSILON);
    }

    #[test]
    fn battery_without_scale_is_already_percent() {
        let status = NodeStatus {
            node_uuid: "n".into(),
            battery: 87.0,
            max_battery: 0.0,
            radio_status: 3.0,
            max_radio_status: 0.0,
        };
        assert!((status.battery_percent() - 87.0).abs() < f64::EPSILON);
        assert_eq!(status.signal_percent(), None);
    }

    #[test]
    fn measurement_type_wire_names() {
        assert_eq!(MeasurementType::Power.as_ref(), "power_kW");
        assert_eq!(MeasurementType::CurrentL3.to_string(), "L3_current_A");
    }
}
