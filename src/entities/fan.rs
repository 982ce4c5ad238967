//! Fan speed sensors, one per `Fans` member of the Thermal resource.

use serde_json::{json, Value};

use super::{attributes_from, sanitize_id, to_json, Attributes, DeviceCard, DeviceClass, SensorEntity};
use crate::telemetry::naming::normalize_name;
use crate::telemetry::types::{record_key, FanRecord, Snapshot};

/// One CIMC fan tachometer, in RPM.
pub struct FanSensor {
    fan_id: String,
    name: String,
    unique_id: String,
    device: DeviceCard,
}

impl FanSensor {
    pub fn new(host: &str, device: &DeviceCard, fan: &FanRecord) -> Self {
        let fan_id = record_key(&fan.member_id, &fan.name);
        let base = if fan.name.is_empty() {
            normalize_name(Some(&format!("Fan {}", fan_id)))
        } else {
            normalize_name(Some(&fan.name))
        };
        let unique = format!("{}:{}", host, fan.odata_id.as_deref().unwrap_or(&fan_id));

        Self {
            name: format!("CIMC {} {}", host, base),
            unique_id: sanitize_id(&unique),
            fan_id,
            device: device.clone(),
        }
    }

    fn record<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a FanRecord> {
        snapshot
            .fans
            .iter()
            .find(|f| record_key(&f.member_id, &f.name) == self.fan_id)
    }
}

impl SensorEntity for FanSensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &'static str {
        "RPM"
    }

    fn device_class(&self) -> Option<DeviceClass> {
        None
    }

    fn device_info(&self) -> &DeviceCard {
        &self.device
    }

    fn native_value(&self, snapshot: &Snapshot) -> Option<Value> {
        self.record(snapshot)?.rpm.as_ref().map(to_json)
    }

    fn attributes(&self, snapshot: &Snapshot) -> Attributes {
        let Some(f) = self.record(snapshot) else {
            return Attributes::new();
        };
        attributes_from(json!({
            "name": f.name,
            "state": f.state,
            "health": f.health,
            "context": f.context,
            "lower_noncrit": f.thresholds.lower_noncrit,
            "lower_crit": f.thresholds.lower_crit,
            "upper_noncrit": f.thresholds.upper_noncrit,
            "upper_crit": f.thresholds.upper_crit,
            "odata_id": f.odata_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::cimc_snapshot;
    use crate::telemetry::types::{
        DeviceInfo, DeviceLookup, FanReport, FanSpeed, MemberId, Reading, Thresholds,
    };

    fn fan(name: &str, member_id: Option<MemberId>, odata: Option<&str>) -> FanRecord {
        FanRecord {
            name: name.to_string(),
            context: None,
            member_id,
            rpm: Some(FanSpeed::Numeric(Reading::Int(5000))),
            units: "RPM".to_string(),
            state: None,
            health: None,
            thresholds: Thresholds::default(),
            odata_id: odata.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn names_and_ids_follow_host_and_odata() {
        let snapshot = cimc_snapshot().await;
        let card = DeviceCard::from(&snapshot.device);
        let sensor = FanSensor::new("10.0.0.9", &card, &snapshot.fans[0]);

        assert_eq!(sensor.name(), "CIMC 10.0.0.9 Fan 1 Tach 1");
        assert_eq!(
            sensor.unique_id(),
            "10.0.0.9:_redfish_v1_Chassis_1_Thermal_Fans_FAN1_TACH1"
        );
        assert_eq!(sensor.native_value(&snapshot), Some(json!(6800)));
        assert_eq!(sensor.device_info().name, "CIMC 10.0.0.9");
    }

    #[tokio::test]
    async fn attributes_carry_status_and_thresholds() {
        let snapshot = cimc_snapshot().await;
        let card = DeviceCard::from(&snapshot.device);
        let sensor = FanSensor::new("10.0.0.9", &card, &snapshot.fans[1]);

        let attrs = sensor.attributes(&snapshot);
        assert_eq!(attrs["name"], "FAN2_TACH1");
        assert_eq!(attrs["state"], "Enabled");
        assert_eq!(attrs["health"], "OK");
        assert_eq!(attrs["upper_crit"], Value::Null);
    }

    #[test]
    fn unique_id_falls_back_to_member_id() {
        let card = DeviceCard::from(&DeviceInfo::defaulted("h"));
        let record = fan("FAN3", Some(MemberId::Int(3)), None);
        let sensor = FanSensor::new("h", &card, &record);
        assert_eq!(sensor.unique_id(), "h:3");
        assert_eq!(sensor.name(), "CIMC h Fan 3");
    }

    #[test]
    fn rebinds_by_identity_across_snapshots() {
        let card = DeviceCard::from(&DeviceInfo::defaulted("h"));
        let record = fan("FAN1", None, Some("/Fans/1"));
        let sensor = FanSensor::new("h", &card, &record);

        let mut snapshot = Snapshot::from_fans(FanReport {
            fans: vec![record.clone()],
            device: DeviceLookup::Defaulted(DeviceInfo::defaulted("h")),
        });
        assert_eq!(sensor.native_value(&snapshot), Some(json!(5000)));

        snapshot.fans[0].rpm = Some(FanSpeed::Raw("Not Present".into()));
        assert_eq!(sensor.native_value(&snapshot), Some(json!("Not Present")));

        snapshot.fans.clear();
        assert_eq!(sensor.native_value(&snapshot), None);
        assert!(sensor.attributes(&snapshot).is_empty());
    }
}
