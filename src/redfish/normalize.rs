//! Redfish payload normalizer.
//! Converts Thermal/Power/Chassis JSON into typed telemetry records, coercing the
//! string/int/null mix CIMC firmware emits for numeric fields.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::telemetry::types::{
    member_id_label, DeviceInfo, FanRecord, FanSpeed, MemberId, PowerMetrics, PsuRecord, Reading,
    TemperatureRecord, Thresholds, VoltageRail,
};

/// Physical context of rails that belong to a power supply.
pub const PSU_RAIL_CONTEXT: &str = "PowerSupply";

/// Keys whose presence marks an array member as a full resource rather than a link stub.
const RESOLVED_KEYS: &[&str] = &["Reading", "ReadingRPM", "ReadingCelsius", "ReadingVolts", "Status"];

/// `None`, `""` and `"N/A"` are absent; otherwise integer, then float, else absent.
pub fn coerce_number(value: Option<&Value>) -> Option<Reading> {
    match value? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Reading::Int(i))
            } else {
                n.as_f64().map(Reading::Float)
            }
        }
        Value::String(s) => parse_numeric_text(s),
        _ => None,
    }
}

fn parse_numeric_text(text: &str) -> Option<Reading> {
    let text = text.trim();
    if text.is_empty() || text == "N/A" {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Reading::Int(i));
    }
    text.parse::<f64>().ok().map(Reading::Float)
}

/// `MemberID` as an integer when possible; unparsable text is kept as-is.
pub fn coerce_member_id(value: Option<&Value>) -> Option<MemberId> {
    match value? {
        Value::Null => None,
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(MemberId::Int),
        Value::String(s) => Some(
            s.trim()
                .parse::<i64>()
                .map(MemberId::Int)
                .unwrap_or_else(|_| MemberId::Text(s.clone())),
        ),
        other => Some(MemberId::Text(other.to_string())),
    }
}

/// True when the array member already carries readings or status.
pub fn is_resolved(item: &Value) -> bool {
    item.as_object()
        .map(|obj| RESOLVED_KEYS.iter().any(|k| obj.contains_key(*k)))
        .unwrap_or(false)
}

/// The `@odata.id` of a link stub, if the item is one.
pub fn link_target(item: &Value) -> Option<&str> {
    if is_resolved(item) {
        return None;
    }
    item.get("@odata.id").and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Array under `key`, empty when missing or null.
pub fn array<'a>(resource: &'a Value, key: &str) -> &'a [Value] {
    resource
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Non-empty string field.
fn text(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `Status.<key>` accepting the lowercase spelling some firmware uses.
fn status_field(obj: &Value, key: &str) -> Option<String> {
    let status = obj.get("Status")?;
    text(status, key).or_else(|| text(status, &key.to_lowercase()))
}

fn thresholds(obj: &Value) -> Thresholds {
    Thresholds {
        lower_noncrit: coerce_number(obj.get("LowerThresholdNonCritical")),
        lower_crit: coerce_number(obj.get("LowerThresholdCritical")),
        upper_noncrit: coerce_number(obj.get("UpperThresholdNonCritical")),
        upper_crit: coerce_number(obj.get("UpperThresholdCritical")),
    }
}

/// First non-null, non-empty value among `keys`.
fn first_present<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
}

pub fn fan_record(fan: &Value) -> FanRecord {
    let raw_speed = first_present(fan, &["Reading", "ReadingRPM"]);
    let rpm = match coerce_number(raw_speed) {
        Some(r) => Some(FanSpeed::Numeric(r)),
        None => raw_speed.and_then(Value::as_str).map(|s| FanSpeed::Raw(s.to_string())),
    };

    let has_rpm_key = fan.get("ReadingRPM").map(|v| !v.is_null()).unwrap_or(false);
    let units = text(fan, "ReadingUnits")
        .unwrap_or_else(|| if has_rpm_key { "RPM".to_string() } else { String::new() });

    FanRecord {
        name: text(fan, "Name")
            .or_else(|| text(fan, "FanName"))
            .unwrap_or_else(|| "Fan".to_string()),
        context: text(fan, "PhysicalContext"),
        member_id: coerce_member_id(fan.get("MemberID")),
        rpm,
        units,
        state: status_field(fan, "State"),
        health: status_field(fan, "Health"),
        thresholds: thresholds(fan),
        odata_id: text(fan, "@odata.id"),
    }
}

pub fn temperature_record(temp: &Value) -> TemperatureRecord {
    let member_id = coerce_member_id(temp.get("MemberID"));
    TemperatureRecord {
        name: text(temp, "Name")
            .unwrap_or_else(|| format!("Temp {}", member_id_label(&member_id))),
        context: text(temp, "PhysicalContext"),
        member_id,
        celsius: coerce_number(temp.get("ReadingCelsius")),
        state: status_field(temp, "State"),
        health: status_field(temp, "Health"),
        thresholds: thresholds(temp),
        sensor_number: coerce_number(temp.get("SensorNumber")),
        odata_id: text(temp, "@odata.id"),
    }
}

pub fn voltage_rail(rail: &Value) -> VoltageRail {
    VoltageRail {
        member_id: coerce_member_id(rail.get("MemberID")),
        name: text(rail, "Name"),
        context: text(rail, "PhysicalContext"),
        volts: coerce_number(rail.get("ReadingVolts")),
        thresholds: thresholds(rail),
        state: status_field(rail, "State"),
        health: status_field(rail, "Health"),
        sensor_number: coerce_number(rail.get("SensorNumber")),
        odata_id: text(rail, "@odata.id"),
    }
}

/// Index `PowerSupply` rails by member id string for PSU stitching.
pub fn psu_rails_by_member(rails: &[VoltageRail]) -> HashMap<String, &VoltageRail> {
    rails
        .iter()
        .filter(|r| r.context.as_deref() == Some(PSU_RAIL_CONTEXT))
        .filter_map(|r| r.member_id.as_ref().map(|m| (m.to_string(), r)))
        .collect()
}

pub fn psu_record(psu: &Value, rails_by_member: &HashMap<String, &VoltageRail>) -> PsuRecord {
    let member_id = coerce_member_id(psu.get("MemberID"));
    let rail = rails_by_member.get(&member_id_label(&member_id));

    PsuRecord {
        name: text(psu, "Name").unwrap_or_else(|| format!("PSU {}", member_id_label(&member_id))),
        member_id,
        state: status_field(psu, "State"),
        last_power: coerce_number(psu.get("LastPowerOutputWatts")),
        line_input_volts: coerce_number(psu.get("LineInputVoltage")),
        serial: text(psu, "SerialNumber"),
        model: text(psu, "Model"),
        part_number: text(psu, "PartNumber"),
        spare_part_number: text(psu, "SparePartNumber"),
        odata_id: text(psu, "@odata.id"),
        voltage: rail.and_then(|r| r.volts),
        voltage_odata_id: rail.and_then(|r| r.odata_id.clone()),
    }
}

/// Chassis-wide power from `PowerControl`; the first entry is used when it is an array.
pub fn power_metrics(power: &Value) -> PowerMetrics {
    let empty = Value::Object(Map::new());
    let control = match power.get("PowerControl") {
        Some(Value::Array(items)) => items.first().unwrap_or(&empty),
        Some(v @ Value::Object(_)) => v,
        _ => &empty,
    };
    let metric = control.get("PowerMetric").unwrap_or(&empty);

    PowerMetrics {
        consumed_watts: coerce_number(control.get("PowerConsumedWatts")),
        min_watts: coerce_number(metric.get("MinConsumedWatts")),
        avg_watts: coerce_number(metric.get("AverageConsumedWatts")),
        max_watts: coerce_number(metric.get("MaxConsumedWatts")),
        interval_min: coerce_number(metric.get("IntervalInMin")),
    }
}

/// Device identity from the chassis resource, filling gaps with generic values.
pub fn device_info(host: &str, chassis: &Value) -> DeviceInfo {
    let fallback = DeviceInfo::defaulted(host);
    DeviceInfo {
        manufacturer: text(chassis, "Manufacturer").unwrap_or(fallback.manufacturer),
        model: text(chassis, "Model").unwrap_or(fallback.model),
        serial: text(chassis, "SerialNumber"),
        ..fallback
    }
}
