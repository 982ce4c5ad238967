//! Telemetry data types: snapshot, fan/temperature/voltage/PSU records, device identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric sensor value after coercion. Integers stay integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Int(i64),
    Float(f64),
}

impl Reading {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Reading::Int(v) => v as f64,
            Reading::Float(v) => v,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Int(v) => write!(f, "{}", v),
            Reading::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Fan speed. Some CIMC builds report non-numeric text here; it is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FanSpeed {
    Numeric(Reading),
    Raw(String),
}

impl FanSpeed {
    pub fn numeric(&self) -> Option<Reading> {
        match self {
            FanSpeed::Numeric(r) => Some(*r),
            FanSpeed::Raw(_) => None,
        }
    }
}

/// Redfish `MemberID`: integer when parsable, otherwise the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberId {
    Int(i64),
    Text(String),
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberId::Int(v) => write!(f, "{}", v),
            MemberId::Text(s) => f.write_str(s),
        }
    }
}

/// Renders an optional member id the way fallback names expect ("None" when absent).
pub fn member_id_label(member_id: &Option<MemberId>) -> String {
    member_id
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "None".to_string())
}

/// Warning and critical bounds shared by every threshold-carrying sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub lower_noncrit: Option<Reading>,
    pub lower_crit: Option<Reading>,
    pub upper_noncrit: Option<Reading>,
    pub upper_crit: Option<Reading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanRecord {
    pub name: String,
    pub context: Option<String>,
    pub member_id: Option<MemberId>,
    pub rpm: Option<FanSpeed>,
    pub units: String,
    pub state: Option<String>,
    pub health: Option<String>,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    pub odata_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRecord {
    pub name: String,
    pub context: Option<String>,
    pub member_id: Option<MemberId>,
    pub celsius: Option<Reading>,
    pub state: Option<String>,
    pub health: Option<String>,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    pub sensor_number: Option<Reading>,
    pub odata_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageRail {
    pub member_id: Option<MemberId>,
    pub name: Option<String>,
    pub context: Option<String>,
    pub volts: Option<Reading>,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    pub state: Option<String>,
    pub health: Option<String>,
    pub sensor_number: Option<Reading>,
    pub odata_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsuRecord {
    pub member_id: Option<MemberId>,
    pub name: String,
    pub state: Option<String>,
    pub last_power: Option<Reading>,
    pub line_input_volts: Option<Reading>,
    pub serial: Option<String>,
    pub model: Option<String>,
    pub part_number: Option<String>,
    pub spare_part_number: Option<String>,
    pub odata_id: Option<String>,
    /// Reading of the stitched `PowerSupply` rail, if one matched.
    pub voltage: Option<Reading>,
    pub voltage_odata_id: Option<String>,
}

/// Chassis-wide consumption from `PowerControl`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerMetrics {
    pub consumed_watts: Option<Reading>,
    pub min_watts: Option<Reading>,
    pub avg_watts: Option<Reading>,
    pub max_watts: Option<Reading>,
    pub interval_min: Option<Reading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub host: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: Option<String>,
    pub ident: String,
}

pub const DEFAULT_MANUFACTURER: &str = "Cisco";
pub const DEFAULT_MODEL: &str = "C-Series";

impl DeviceInfo {
    /// Generic identity used when the chassis resource can't be read.
    pub fn defaulted(host: &str) -> Self {
        Self {
            host: host.to_string(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            serial: None,
            ident: host.to_string(),
        }
    }
}

/// Outcome of the chassis identity lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceLookup {
    Fetched(DeviceInfo),
    Defaulted(DeviceInfo),
}

impl DeviceLookup {
    pub fn into_info(self) -> DeviceInfo {
        match self {
            DeviceLookup::Fetched(d) | DeviceLookup::Defaulted(d) => d,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, DeviceLookup::Defaulted(_))
    }
}

/// Result of the required fan poll.
#[derive(Debug, Clone, PartialEq)]
pub struct FanReport {
    pub fans: Vec<FanRecord>,
    pub device: DeviceLookup,
}

/// Result of the best-effort power poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerReport {
    pub power: PowerMetrics,
    pub psus: Vec<PsuRecord>,
    pub voltages: Vec<VoltageRail>,
}

/// Point-in-time telemetry from one poll. Optional categories are absent
/// when their fetch failed, never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fans: Vec<FanRecord>,
    pub device: DeviceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psus: Option<Vec<PsuRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltages: Option<Vec<VoltageRail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperatures: Option<Vec<TemperatureRecord>>,
}

impl Snapshot {
    pub fn from_fans(report: FanReport) -> Self {
        Self {
            fans: report.fans,
            device: report.device.into_info(),
            power: None,
            psus: None,
            voltages: None,
            temperatures: None,
        }
    }

    pub fn apply_power(&mut self, report: PowerReport) {
        self.power = Some(report.power);
        self.psus = Some(report.psus);
        self.voltages = Some(report.voltages);
    }

    pub fn psus(&self) -> &[PsuRecord] {
        self.psus.as_deref().unwrap_or_default()
    }

    pub fn voltages(&self) -> &[VoltageRail] {
        self.voltages.as_deref().unwrap_or_default()
    }

    pub fn temperatures(&self) -> &[TemperatureRecord] {
        self.temperatures.as_deref().unwrap_or_default()
    }
}

/// Identity used to re-bind an entity to its record after each refresh:
/// the member id when present, the name otherwise.
pub fn record_key(member_id: &Option<MemberId>, name: &str) -> String {
    match member_id {
        Some(m) => m.to_string(),
        None => name.to_string(),
    }
}
