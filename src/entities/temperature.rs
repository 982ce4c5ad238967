//! Temperature sensors from the Thermal `Temperatures` array.

use serde_json::{json, Value};

use super::{attributes_from, sanitize_id, to_json, Attributes, DeviceCard, DeviceClass, SensorEntity};
use crate::telemetry::naming::normalize_name;
use crate::telemetry::types::{record_key, Snapshot, TemperatureRecord};

pub struct TemperatureSensor {
    temp_id: String,
    name: String,
    unique_id: String,
    device: DeviceCard,
}

impl TemperatureSensor {
    pub fn new(host: &str, device: &DeviceCard, temp: &TemperatureRecord) -> Self {
        let temp_id = record_key(&temp.member_id, &temp.name);
        let base = if temp.name.is_empty() {
            normalize_name(Some(&format!("Temperature {}", temp_id)))
        } else {
            normalize_name(Some(&temp.name))
        };
        let unique = format!("{}:{}", host, temp.odata_id.as_deref().unwrap_or(&temp_id));

        Self {
            name: format!("CIMC {} {}", host, base),
            unique_id: sanitize_id(&unique),
            temp_id,
            device: device.clone(),
        }
    }

    fn record<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a TemperatureRecord> {
        snapshot
            .temperatures()
            .iter()
            .find(|t| record_key(&t.member_id, &t.name) == self.temp_id)
    }
}

impl SensorEntity for TemperatureSensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &'static str {
        "°C"
    }

    fn device_class(&self) -> Option<DeviceClass> {
        Some(DeviceClass::Temperature)
    }

    fn device_info(&self) -> &DeviceCard {
        &self.device
    }

    fn native_value(&self, snapshot: &Snapshot) -> Option<Value> {
        self.record(snapshot)?.celsius.as_ref().map(to_json)
    }

    fn attributes(&self, snapshot: &Snapshot) -> Attributes {
        let Some(t) = self.record(snapshot) else {
            return Attributes::new();
        };
        attributes_from(json!({
            "name": t.name,
            "state": t.state,
            "health": t.health,
            "context": t.context,
            "lower_noncrit": t.thresholds.lower_noncrit,
            "lower_crit": t.thresholds.lower_crit,
            "upper_noncrit": t.thresholds.upper_noncrit,
            "upper_crit": t.thresholds.upper_crit,
            "sensor_number": t.sensor_number,
            "odata_id": t.odata_id,
        }))
    }
}
