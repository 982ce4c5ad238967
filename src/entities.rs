//! Sensor entities built from a telemetry snapshot.
//!
//! Each entity remembers the identity of the record it was created from
//! (`member_id`, falling back to the name) and re-resolves its value against
//! every newer snapshot. Records that disappear read as unavailable.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::telemetry::types::{DeviceInfo, Snapshot, DEFAULT_MANUFACTURER, DEFAULT_MODEL};

pub mod fan;
pub mod psu;
pub mod temperature;

pub use fan::FanSensor;
pub use psu::{PsuPowerSensor, PsuVoltageSensor};
pub use temperature::TemperatureSensor;

pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Voltage,
    Power,
}

/// Parent device that every entity of one CIMC is grouped under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCard {
    pub identifier: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: Option<String>,
}

impl From<&DeviceInfo> for DeviceCard {
    fn from(device: &DeviceInfo) -> Self {
        let or_default = |value: &str, default: &str| {
            if value.is_empty() { default.to_string() } else { value.to_string() }
        };
        Self {
            identifier: or_default(&device.ident, &device.host),
            name: format!("CIMC {}", device.host),
            manufacturer: or_default(&device.manufacturer, DEFAULT_MANUFACTURER),
            model: or_default(&device.model, DEFAULT_MODEL),
            serial_number: device.serial.clone(),
        }
    }
}

pub trait SensorEntity: Send + Sync {
    fn unique_id(&self) -> &str;
    fn name(&self) -> &str;
    fn unit(&self) -> &'static str;
    fn device_class(&self) -> Option<DeviceClass>;
    fn device_info(&self) -> &DeviceCard;

    /// Current value from `snapshot`, or `None` when the bound record is gone.
    fn native_value(&self, snapshot: &Snapshot) -> Option<Value>;

    fn attributes(&self, snapshot: &Snapshot) -> Attributes;

    fn state(&self, snapshot: &Snapshot) -> EntityState {
        EntityState {
            unique_id: self.unique_id().to_string(),
            name: self.name().to_string(),
            value: self.native_value(snapshot),
            unit: self.unit(),
            device_class: self.device_class(),
            attributes: self.attributes(snapshot),
        }
    }
}

/// Rendered entity row, as logged by the agent and printed by `--once`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub name: String,
    pub value: Option<Value>,
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<DeviceClass>,
    pub attributes: Attributes,
}

/// Create one entity per fan, per PSU voltage/power reading, and per temperature.
pub fn build_entities(snapshot: &Snapshot) -> Vec<Box<dyn SensorEntity>> {
    let device = DeviceCard::from(&snapshot.device);
    let host = snapshot.device.host.as_str();

    let mut entities: Vec<Box<dyn SensorEntity>> = Vec::new();
    for fan in &snapshot.fans {
        entities.push(Box::new(FanSensor::new(host, &device, fan)));
    }
    for psu in snapshot.psus() {
        if psu.voltage.is_some() {
            entities.push(Box::new(PsuVoltageSensor::new(host, &device, psu)));
        }
        if psu.last_power.is_some() {
            entities.push(Box::new(PsuPowerSensor::new(host, &device, psu)));
        }
    }
    for temp in snapshot.temperatures() {
        entities.push(Box::new(TemperatureSensor::new(host, &device, temp)));
    }
    entities
}

/// Unique ids must not contain path separators.
pub(crate) fn sanitize_id(raw: &str) -> String {
    raw.replace('/', "_")
}

/// Serialize a value into JSON, mapping failures to `null`.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Turn a `json!({...})` literal into an attribute map.
pub(crate) fn attributes_from(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}
