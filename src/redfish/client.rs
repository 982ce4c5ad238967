//! CIMC Redfish telemetry client.
//! Discovers the chassis once, then reads Thermal and Power on every poll.
//! Fans (plus device identity) are required; power and temperatures are best-effort.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::{RedfishError, Result};
use super::normalize;
use super::{RedfishTransport, CHASSIS_COLLECTION};
use crate::telemetry::types::{
    DeviceInfo, DeviceLookup, FanReport, PowerReport, Snapshot, TemperatureRecord,
};

pub struct RedfishClient {
    host: String,
    transport: Arc<dyn RedfishTransport>,
    /// First chassis member, discovered on first use and kept for the client's lifetime.
    chassis_path: OnceCell<String>,
}

impl RedfishClient {
    pub fn new(host: impl Into<String>, transport: Arc<dyn RedfishTransport>) -> Self {
        Self {
            host: host.into(),
            transport,
            chassis_path: OnceCell::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolve the chassis resource path (e.g. "/redfish/v1/Chassis/1").
    pub async fn discover_chassis(&self) -> Result<&str> {
        let path = self
            .chassis_path
            .get_or_try_init(|| async {
                let collection = self.transport.get_json(CHASSIS_COLLECTION).await?;
                let first = normalize::array(&collection, "Members")
                    .first()
                    .ok_or_else(|| RedfishError::Connection("No Redfish chassis members found.".to_string()))?;
                let path = first
                    .get("@odata.id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        RedfishError::Unexpected("Chassis member has no @odata.id".to_string())
                    })?
                    .to_string();
                info!("Discovered Redfish chassis at {} on {}", path, self.host);
                Ok::<_, RedfishError>(path)
            })
            .await?;
        Ok(path.as_str())
    }

    /// Fetch a link target, applying a JSON-pointer fragment ("#/Fans/0") when present.
    async fn resolve_link(&self, target: &str) -> Result<Value> {
        let (path, fragment) = match target.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (target, None),
        };
        let document = self.transport.get_json(path).await?;
        match fragment.filter(|f| f.starts_with('/')) {
            Some(pointer) => match document.pointer(pointer) {
                Some(member) => Ok(member.clone()),
                None => Ok(document),
            },
            None => Ok(document),
        }
    }

    /// Replace link stubs in a Thermal/Power array with the resources they point at.
    async fn resolve_members(&self, items: &[Value]) -> Result<Vec<Value>> {
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            let member = match normalize::link_target(item) {
                Some(target) => {
                    debug!("Resolving linked member {}", target);
                    self.resolve_link(target).await?
                }
                None if item.is_object() => item.clone(),
                None => Value::Object(Map::new()),
            };
            resolved.push(member);
        }
        Ok(resolved)
    }

    async fn thermal(&self) -> Result<Value> {
        let chassis = self.discover_chassis().await?;
        self.transport.get_json(&format!("{}/Thermal", chassis)).await
    }

    /// Device identity from the chassis resource. Any failure here yields the
    /// generic identity instead of failing the poll.
    pub async fn fetch_device(&self) -> DeviceLookup {
        let chassis = match self.discover_chassis().await {
            Ok(path) => path.to_string(),
            Err(e) => {
                debug!("Chassis unavailable for device info: {}", e);
                return DeviceLookup::Defaulted(DeviceInfo::defaulted(&self.host));
            }
        };
        match self.transport.get_json(&chassis).await {
            Ok(resource) if resource.is_object() => {
                DeviceLookup::Fetched(normalize::device_info(&self.host, &resource))
            }
            Ok(_) => {
                debug!("Chassis resource {} is not an object; using default identity", chassis);
                DeviceLookup::Defaulted(DeviceInfo::defaulted(&self.host))
            }
            Err(e) => {
                debug!("Failed to read chassis {}: {}; using default identity", chassis, e);
                DeviceLookup::Defaulted(DeviceInfo::defaulted(&self.host))
            }
        }
    }

    pub async fn fetch_fans(&self) -> Result<FanReport> {
        let thermal = self.thermal().await?;
        let members = self.resolve_members(normalize::array(&thermal, "Fans")).await?;
        let fans = members.iter().map(normalize::fan_record).collect::<Vec<_>>();
        debug!("Read {} fans from {}", fans.len(), self.host);

        let device = self.fetch_device().await;
        Ok(FanReport { fans, device })
    }

    pub async fn fetch_temperatures(&self) -> Result<Vec<TemperatureRecord>> {
        let thermal = self.thermal().await?;
        let members = self.resolve_members(normalize::array(&thermal, "Temperatures")).await?;
        let temps = members.iter().map(normalize::temperature_record).collect::<Vec<_>>();
        debug!("Read {} temperature sensors from {}", temps.len(), self.host);
        Ok(temps)
    }

    pub async fn fetch_power(&self) -> Result<PowerReport> {
        let chassis = self.discover_chassis().await?;
        let power = self.transport.get_json(&format!("{}/Power", chassis)).await?;

        let metrics = normalize::power_metrics(&power);
        let voltages = normalize::array(&power, "Voltages")
            .iter()
            .map(normalize::voltage_rail)
            .collect::<Vec<_>>();

        let rails = normalize::psu_rails_by_member(&voltages);
        let psus = normalize::array(&power, "PowerSupplies")
            .iter()
            .map(|psu| normalize::psu_record(psu, &rails))
            .collect::<Vec<_>>();

        debug!("Read {} PSUs and {} voltage rails from {}", psus.len(), voltages.len(), self.host);
        Ok(PowerReport {
            power: metrics,
            psus,
            voltages,
        })
    }

    /// One full poll. Fan failure aborts; power and temperature failures leave
    /// their categories absent.
    pub async fn fetch_all(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::from_fans(self.fetch_fans().await?);

        match self.fetch_power().await {
            Ok(report) => snapshot.apply_power(report),
            Err(e) => warn!("Power telemetry unavailable from {}: {}", self.host, e),
        }

        match self.fetch_temperatures().await {
            Ok(temps) => snapshot.temperatures = Some(temps),
            Err(e) => warn!("Temperature telemetry unavailable from {}: {}", self.host, e),
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::telemetry::types::{FanSpeed, MemberId, Reading};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory Redfish service keyed by path. Unknown paths answer 404.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub(crate) responses: HashMap<String, Value>,
        pub(crate) failures: HashMap<String, u16>,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        pub(crate) fn with(mut self, path: &str, body: Value) -> Self {
            self.responses.insert(path.to_string(), body);
            self
        }

        pub(crate) fn failing(mut self, path: &str, status: u16) -> Self {
            self.failures.insert(path.to_string(), status);
            self
        }

        pub(crate) fn count(&self, path: &str) -> usize {
            self.requests.lock().unwrap().iter().filter(|p| *p == path).count()
        }
    }

    #[async_trait]
    impl RedfishTransport for FakeTransport {
        async fn get_json(&self, path: &str) -> Result<Value> {
            self.requests.lock().unwrap().push(path.to_string());
            if let Some(status) = self.failures.get(path) {
                return Err(RedfishError::http(*status, path, "failure"));
            }
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| RedfishError::http(404, path, "not found"))
        }
    }

    pub(crate) fn cimc() -> FakeTransport {
        FakeTransport::default()
            .with(
                "/redfish/v1/Chassis",
                json!({"Members": [{"@odata.id": "/redfish/v1/Chassis/1"}]}),
            )
            .with(
                "/redfish/v1/Chassis/1",
                json!({"Manufacturer": "Cisco Systems Inc", "Model": "UCSC-C220-M4S", "SerialNumber": "FCH1234V0AB"}),
            )
            .with(
                "/redfish/v1/Chassis/1/Thermal",
                json!({
                    "Fans": [
                        {"@odata.id": "/redfish/v1/Chassis/1/Thermal/Fans/FAN1_TACH1"},
                        {"@odata.id": "/redfish/v1/Chassis/1/Thermal#/Fans/1", "MemberID": "2",
                         "Name": "FAN2_TACH1", "Reading": "7100", "ReadingUnits": "RPM",
                         "Status": {"State": "Enabled", "Health": "OK"}}
                    ],
                    "Temperatures": [
                        {"@odata.id": "/redfish/v1/Chassis/1/Thermal#/Temperatures/0", "MemberID": "0",
                         "Name": "PSU1_TEMP", "ReadingCelsius": 34, "PhysicalContext": "PowerSupply",
                         "UpperThresholdCritical": "65", "Status": {"State": "Enabled", "Health": "OK"}}
                    ]
                }),
            )
            .with(
                "/redfish/v1/Chassis/1/Thermal/Fans/FAN1_TACH1",
                json!({"@odata.id": "/redfish/v1/Chassis/1/Thermal/Fans/FAN1_TACH1", "MemberID": "1",
                       "Name": "FAN1_TACH1", "ReadingRPM": "6800", "Status": {"State": "Enabled", "Health": "OK"}}),
            )
            .with(
                "/redfish/v1/Chassis/1/Power",
                json!({
                    "PowerControl": {"PowerConsumedWatts": "240",
                                     "PowerMetric": {"MinConsumedWatts": 180, "AverageConsumedWatts": 230,
                                                     "MaxConsumedWatts": 300, "IntervalInMin": 1}},
                    "Voltages": [
                        {"@odata.id": "/redfish/v1/Chassis/1/Power#/Voltages/0", "MemberID": "1",
                         "Name": "PSU1_VOUT", "PhysicalContext": "PowerSupply", "ReadingVolts": "12"},
                        {"@odata.id": "/redfish/v1/Chassis/1/Power#/Voltages/1", "MemberID": "3",
                         "Name": "P3V_BAT", "PhysicalContext": "SystemBoard", "ReadingVolts": "3.05"}
                    ],
                    "PowerSupplies": [
                        {"@odata.id": "/redfish/v1/Chassis/1/Power#/PowerSupplies/0", "MemberID": "1",
                         "Name": "PSU1", "LastPowerOutputWatts": "120", "LineInputVoltage": "230",
                         "SerialNumber": "LIT1", "Model": "UCSC-PSU1-770W", "Status": {"State": "Enabled"}},
                        {"@odata.id": "/redfish/v1/Chassis/1/Power#/PowerSupplies/1", "MemberID": "2",
                         "Name": "PSU2", "LastPowerOutputWatts": "N/A"}
                    ]
                }),
            )
    }

    fn client(transport: FakeTransport) -> (RedfishClient, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        (RedfishClient::new("10.0.0.9", transport.clone()), transport)
    }

    #[tokio::test]
    async fn discovers_chassis_once() {
        let (client, transport) = client(cimc());
        assert_eq!(client.discover_chassis().await.unwrap(), "/redfish/v1/Chassis/1");
        client.fetch_all().await.unwrap();
        client.fetch_all().await.unwrap();
        assert_eq!(transport.count("/redfish/v1/Chassis"), 1);
    }

    #[tokio::test]
    async fn zero_chassis_members_is_connection_error() {
        let (client, _) = client(FakeTransport::default().with("/redfish/v1/Chassis", json!({"Members": []})));
        let err = client.discover_chassis().await.unwrap_err();
        assert!(matches!(err, RedfishError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn fetch_fans_resolves_links_and_reads_device() {
        let (client, transport) = client(cimc());
        let report = client.fetch_fans().await.unwrap();

        assert_eq!(report.fans.len(), 2);
        let fan1 = &report.fans[0];
        assert_eq!(fan1.name, "FAN1_TACH1");
        assert_eq!(fan1.member_id, Some(MemberId::Int(1)));
        assert_eq!(fan1.rpm, Some(FanSpeed::Numeric(Reading::Int(6800))));
        assert_eq!(fan1.units, "RPM");
        assert_eq!(transport.count("/redfish/v1/Chassis/1/Thermal/Fans/FAN1_TACH1"), 1);

        // Inline member with readings is not re-fetched.
        assert_eq!(report.fans[1].rpm, Some(FanSpeed::Numeric(Reading::Int(7100))));

        match &report.device {
            DeviceLookup::Fetched(info) => {
                assert_eq!(info.manufacturer, "Cisco Systems Inc");
                assert_eq!(info.model, "UCSC-C220-M4S");
                assert_eq!(info.serial.as_deref(), Some("FCH1234V0AB"));
                assert_eq!(info.host, "10.0.0.9");
            }
            other => panic!("expected fetched device, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn device_defaults_when_chassis_read_fails() {
        let (client, _) = client(cimc().failing("/redfish/v1/Chassis/1", 500));
        let report = client.fetch_fans().await.unwrap();
        assert_eq!(report.fans.len(), 2);
        assert_eq!(
            report.device,
            DeviceLookup::Defaulted(DeviceInfo::defaulted("10.0.0.9"))
        );
    }

    #[tokio::test]
    async fn link_fragment_selects_member() {
        let transport = FakeTransport::default()
            .with("/redfish/v1/Chassis", json!({"Members": [{"@odata.id": "/redfish/v1/Chassis/1"}]}))
            .with(
                "/redfish/v1/Chassis/1/Thermal",
                json!({"Temperatures": [{"@odata.id": "/redfish/v1/Chassis/1/Sensors#/Temperatures/0"}]}),
            )
            .with(
                "/redfish/v1/Chassis/1/Sensors",
                json!({"Temperatures": [{"MemberID": "7", "Name": "FP_TEMP_SENSOR", "ReadingCelsius": "22"}]}),
            );
        let (client, _) = client(transport);
        let temps = client.fetch_temperatures().await.unwrap();
        assert_eq!(temps.len(), 1);
        assert_eq!(temps[0].name, "FP_TEMP_SENSOR");
        assert_eq!(temps[0].celsius, Some(Reading::Int(22)));
    }

    #[tokio::test]
    async fn fetch_power_stitches_psu_rails() {
        let (client, _) = client(cimc());
        let report = client.fetch_power().await.unwrap();

        assert_eq!(report.power.consumed_watts, Some(Reading::Int(240)));
        assert_eq!(report.power.avg_watts, Some(Reading::Int(230)));
        assert_eq!(report.voltages.len(), 2);
        assert_eq!(report.voltages[1].volts, Some(Reading::Float(3.05)));

        let psu1 = &report.psus[0];
        assert_eq!(psu1.voltage, Some(Reading::Int(12)));
        assert_eq!(psu1.voltage_odata_id.as_deref(), Some("/redfish/v1/Chassis/1/Power#/Voltages/0"));
        assert_eq!(psu1.last_power, Some(Reading::Int(120)));
        assert_eq!(psu1.line_input_volts, Some(Reading::Int(230)));

        let psu2 = &report.psus[1];
        assert_eq!(psu2.voltage, None);
        assert_eq!(psu2.last_power, None);
    }

    #[tokio::test]
    async fn fetch_all_collects_every_category() {
        let (client, _) = client(cimc());
        let snapshot = client.fetch_all().await.unwrap();
        assert_eq!(snapshot.fans.len(), 2);
        assert!(snapshot.power.is_some());
        assert_eq!(snapshot.psus().len(), 2);
        assert_eq!(snapshot.voltages().len(), 2);
        assert_eq!(snapshot.temperatures().len(), 1);
        assert_eq!(snapshot.device.serial.as_deref(), Some("FCH1234V0AB"));
    }

    #[tokio::test]
    async fn fetch_all_survives_power_failure() {
        let (client, _) = client(cimc().failing("/redfish/v1/Chassis/1/Power", 500));
        let snapshot = client.fetch_all().await.unwrap();
        assert_eq!(snapshot.fans.len(), 2);
        assert_eq!(snapshot.device.manufacturer, "Cisco Systems Inc");
        assert!(snapshot.power.is_none());
        assert!(snapshot.psus.is_none());
        assert!(snapshot.voltages.is_none());
        assert!(snapshot.temperatures.is_some());

        let json = serde_json::to_value(&snapshot).unwrap();
        for key in ["power", "psus", "voltages"] {
            assert!(json.get(key).is_none(), "{key} should be absent");
        }
    }

    #[tokio::test]
    async fn fetch_all_fails_when_fans_fail() {
        let (client, _) = client(cimc().failing("/redfish/v1/Chassis/1/Thermal", 503));
        let err = client.fetch_all().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn fetch_all_fails_when_linked_fan_fails() {
        let (client, _) = client(cimc().failing("/redfish/v1/Chassis/1/Thermal/Fans/FAN1_TACH1", 500));
        assert!(client.fetch_all().await.is_err());
    }
}
