use serde_json::{Map, Value};

/// Reserved payload key linking a reading to its owning device.
pub const PARENT_ASSET_KEY: &str = "parent_asset_uid";

/// Reserved payload key carrying the epoch-seconds timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub display_name: String,
    pub device_type: String,
    pub unit: Option<String>,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct Reading {
    pub parent_asset_id: String,
    pub timestamp: Option<i64>,
    pub fields: Map<String, Value>,
}

/// Some store rows carry the JSON blob as a string column instead of jsonb.
/// Re-parse in that case; anything unparsable becomes None.
fn coerce_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Parse an epoch-seconds timestamp that may arrive as a JSON number or a
/// numeric string. Missing or unparsable values yield None, which excludes
/// the reading from any time-windowed aggregation.
fn parse_epoch(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

impl Device {
    /// Build a device from one metadata row.
    ///
    /// The display name comes from `customAttributes.name`; the measurement
    /// unit is the first per-sensor `unit` declaration found while walking
    /// `children[].customAttributes.children[].customAttributes`. The
    /// timezone defaults to UTC.
    pub fn from_metadata_row(id: String, device_type: String, attributes: Value) -> Device {
        let attrs = coerce_object(attributes).unwrap_or_default();

        let display_name = attrs
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unnamed Device")
            .to_string();

        let unit = find_sensor_unit(&attrs);

        Device {
            id,
            display_name,
            device_type,
            unit,
            timezone: "UTC".to_string(),
        }
    }
}

/// Walk the nested board/sensor attribute blob for the first declared unit.
fn find_sensor_unit(attrs: &Map<String, Value>) -> Option<String> {
    let boards = attrs.get("children")?.as_array()?;
    for board in boards {
        let sensors = board
            .get("customAttributes")
            .and_then(|a| a.get("children"))
            .and_then(Value::as_array);
        let Some(sensors) = sensors else { continue };
        for sensor in sensors {
            let unit = sensor
                .get("customAttributes")
                .and_then(|a| a.get("unit"))
                .and_then(Value::as_str);
            if let Some(unit) = unit {
                if !unit.is_empty() {
                    return Some(unit.to_string());
                }
            }
        }
    }
    None
}

impl Reading {
    /// Decode one payload blob into a reading.
    ///
    /// Returns None for malformed rows (non-object payload, missing parent
    /// reference); callers skip those and keep aggregating. The reserved
    /// keys are lifted out, everything else stays in `fields` as a
    /// free-form sensor-name mapping.
    pub fn from_payload(payload: Value) -> Option<Reading> {
        let mut map = coerce_object(payload)?;

        let parent_asset_id = map.get(PARENT_ASSET_KEY)?.as_str()?.to_string();
        let timestamp = parse_epoch(map.get(TIMESTAMP_KEY));

        map.remove(PARENT_ASSET_KEY);
        map.remove(TIMESTAMP_KEY);

        Some(Reading {
            parent_asset_id,
            timestamp,
            fields: map,
        })
    }
}
