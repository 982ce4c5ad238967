//! PSU sensors: output voltage (from the stitched `PowerSupply` rail) and
//! last output power. Both bind to the PSU by member id or name.

use serde_json::{json, Value};

use super::{attributes_from, sanitize_id, to_json, Attributes, DeviceCard, DeviceClass, SensorEntity};
use crate::telemetry::naming::normalize_name;
use crate::telemetry::types::{member_id_label, record_key, PsuRecord, Snapshot, VoltageRail};

/// Identity shared by both PSU sensors: (binding key, display base, unique id base).
fn psu_base(psu: &PsuRecord) -> (String, String, String) {
    let psu_id = record_key(&psu.member_id, &psu.name);
    let name = if psu.name.is_empty() {
        format!("PSU {}", member_id_label(&psu.member_id))
    } else {
        psu.name.clone()
    };
    let uid_base = match &psu.odata_id {
        Some(odata) => odata.clone(),
        None => format!("psu:{}", record_key(&psu.member_id, &name)),
    };
    (psu_id, normalize_name(Some(&name)), sanitize_id(&uid_base))
}

fn find_psu<'a>(snapshot: &'a Snapshot, psu_id: &str) -> Option<&'a PsuRecord> {
    snapshot
        .psus()
        .iter()
        .find(|p| record_key(&p.member_id, &p.name) == psu_id)
}

/// Rail whose odata id matches the PSU's stitched rail, or whose member id
/// string equals the PSU's.
fn matched_rail<'a>(snapshot: &'a Snapshot, psu: &PsuRecord) -> Option<&'a VoltageRail> {
    let psu_member = member_id_label(&psu.member_id);
    snapshot.voltages().iter().find(|rail| {
        (rail.odata_id.is_some() && rail.odata_id == psu.voltage_odata_id)
            || member_id_label(&rail.member_id) == psu_member
    })
}

pub struct PsuVoltageSensor {
    psu_id: String,
    name: String,
    unique_id: String,
    device: DeviceCard,
}

impl PsuVoltageSensor {
    pub fn new(host: &str, device: &DeviceCard, psu: &PsuRecord) -> Self {
        let (psu_id, name, uid_base) = psu_base(psu);
        Self {
            psu_id,
            name: format!("{} Voltage", name),
            unique_id: format!("{}:{}:voltage", host, uid_base),
            device: device.clone(),
        }
    }
}

impl SensorEntity for PsuVoltageSensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &'static str {
        "V"
    }

    fn device_class(&self) -> Option<DeviceClass> {
        Some(DeviceClass::Voltage)
    }

    fn device_info(&self) -> &DeviceCard {
        &self.device
    }

    fn native_value(&self, snapshot: &Snapshot) -> Option<Value> {
        find_psu(snapshot, &self.psu_id)?.voltage.as_ref().map(to_json)
    }

    fn attributes(&self, snapshot: &Snapshot) -> Attributes {
        let Some(p) = find_psu(snapshot, &self.psu_id) else {
            return Attributes::new();
        };
        let mut attrs = attributes_from(json!({
            "state": p.state,
            "serial": p.serial,
            "model": p.model,
            "psu_odata_id": p.odata_id,
            "rail_odata_id": p.voltage_odata_id,
            "line_input_volts": p.line_input_volts,
        }));
        if let Some(rail) = matched_rail(snapshot, p) {
            attrs.extend(attributes_from(json!({
                "context": rail.context,
                "sensor_number": rail.sensor_number,
                "lower_noncrit": rail.thresholds.lower_noncrit,
                "lower_crit": rail.thresholds.lower_crit,
                "upper_noncrit": rail.thresholds.upper_noncrit,
                "upper_crit": rail.thresholds.upper_crit,
                "rail_name": rail.name,
            })));
        }
        attrs
    }
}

pub struct PsuPowerSensor {
    psu_id: String,
    name: String,
    unique_id: String,
    device: DeviceCard,
}

impl PsuPowerSensor {
    pub fn new(host: &str, device: &DeviceCard, psu: &PsuRecord) -> Self {
        let (psu_id, name, uid_base) = psu_base(psu);
        Self {
            psu_id,
            name: format!("{} Power", name),
            unique_id: format!("{}:{}:power", host, uid_base),
            device: device.clone(),
        }
    }
}

impl SensorEntity for PsuPowerSensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &'static str {
        "W"
    }

    fn device_class(&self) -> Option<DeviceClass> {
        Some(DeviceClass::Power)
    }

    fn device_info(&self) -> &DeviceCard {
        &self.device
    }

    fn native_value(&self, snapshot: &Snapshot) -> Option<Value> {
        find_psu(snapshot, &self.psu_id)?.last_power.as_ref().map(to_json)
    }

    fn attributes(&self, snapshot: &Snapshot) -> Attributes {
        let Some(p) = find_psu(snapshot, &self.psu_id) else {
            return Attributes::new();
        };
        let power = snapshot.power.clone().unwrap_or_default();
        attributes_from(json!({
            "state": p.state,
            "line_input_volts": p.line_input_volts,
            "serial": p.serial,
            "model": p.model,
            "psu_odata_id": p.odata_id,
            "power_consumed_watts": power.consumed_watts,
            "power_min_watts": power.min_watts,
            "power_avg_watts": power.avg_watts,
            "power_max_watts": power.max_watts,
            "power_interval_min": power.interval_min,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::cimc_snapshot;
    use crate::telemetry::types::MemberId;

    #[tokio::test]
    async fn voltage_sensor_stitches_rail_attributes() {
        let snapshot = cimc_snapshot().await;
        let card = DeviceCard::from(&snapshot.device);
        let sensor = PsuVoltageSensor::new("10.0.0.9", &card, &snapshot.psus()[0]);

        assert_eq!(sensor.name(), "PSU 1 Voltage");
        assert_eq!(
            sensor.unique_id(),
            "10.0.0.9:_redfish_v1_Chassis_1_Power#_PowerSupplies_0:voltage"
        );
        assert_eq!(sensor.native_value(&snapshot), Some(json!(12)));

        let attrs = sensor.attributes(&snapshot);
        assert_eq!(attrs["rail_name"], "PSU1_VOUT");
        assert_eq!(attrs["context"], "PowerSupply");
        assert_eq!(attrs["serial"], "LIT1");
        assert_eq!(attrs["line_input_volts"], json!(230));
    }

    #[tokio::test]
    async fn power_sensor_includes_chassis_metrics() {
        let snapshot = cimc_snapshot().await;
        let card = DeviceCard::from(&snapshot.device);
        let sensor = PsuPowerSensor::new("10.0.0.9", &card, &snapshot.psus()[0]);

        assert_eq!(sensor.name(), "PSU 1 Power");
        assert!(sensor.unique_id().ends_with(":power"));
        assert_eq!(sensor.native_value(&snapshot), Some(json!(120)));

        let attrs = sensor.attributes(&snapshot);
        assert_eq!(attrs["power_consumed_watts"], json!(240));
        assert_eq!(attrs["power_max_watts"], json!(300));
        assert_eq!(attrs["power_interval_min"], json!(1));
    }

    #[test]
    fn uid_base_falls_back_to_member_id() {
        let psu = PsuRecord {
            member_id: Some(MemberId::Int(2)),
            name: "PSU_2".to_string(),
            state: None,
            last_power: None,
            line_input_volts: None,
            serial: None,
            model: None,
            part_number: None,
            spare_part_number: None,
            odata_id: None,
            voltage: None,
            voltage_odata_id: None,
        };
        let (psu_id, name, uid_base) = psu_base(&psu);
        assert_eq!(psu_id, "2");
        assert_eq!(name, "PSU 2");
        assert_eq!(uid_base, "psu:2");

        let card = DeviceCard::from(&crate::telemetry::types::DeviceInfo::defaulted("h"));
        assert_eq!(PsuVoltageSensor::new("h", &card, &psu).unique_id(), "h:psu:2:voltage");
    }
}
