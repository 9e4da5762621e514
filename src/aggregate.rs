/// Aggregation engine: pure functions over fetched readings.
///
/// Every aggregation tolerates messy records the same way: a missing field,
/// a non-numeric value, or a malformed row skips that record only and the
/// fold continues. Zero valid samples yields None and the caller emits the
/// sentinel sentence for that query.
use std::fmt;

use serde_json::Value;

use crate::models::Reading;

/// Liters-to-gallons conversion factor.
const GALLONS_PER_LITER: f64 = 0.264172;

/// Cups-to-gallons divisor (16 cups to the gallon).
const CUPS_PER_GALLON: f64 = 16.0;

#[derive(Debug, PartialEq, Eq)]
pub struct ParseNumericError;

impl fmt::Display for ParseNumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value is not numeric")
    }
}

impl std::error::Error for ParseNumericError {}

/// Extract a float from a raw sensor value, which the store delivers either
/// as a JSON number or as a numeric string. Anything else is an error the
/// aggregation loops treat as "skip this record".
pub fn parse_numeric(raw: &Value) -> Result<f64, ParseNumericError> {
    match raw {
        Value::Number(n) => n.as_f64().ok_or(ParseNumericError),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| ParseNumericError),
        _ => Err(ParseNumericError),
    }
}

/// Volume unit declared in device metadata; decides the gallons conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeUnit {
    Cups,
    Liters,
}

impl VolumeUnit {
    /// Resolve the declared metadata unit. A liters declaration selects the
    /// liters basis; anything else, including no declaration at all, falls
    /// back to cups, the reference deployment's recorded unit.
    pub fn from_declared(unit: Option<&str>) -> VolumeUnit {
        match unit {
            Some(u)
                if u.eq_ignore_ascii_case("liters")
                    || u.eq_ignore_ascii_case("litres")
                    || u.eq_ignore_ascii_case("l") =>
            {
                VolumeUnit::Liters
            }
            _ => VolumeUnit::Cups,
        }
    }

    pub fn to_gallons(self, value: f64) -> f64 {
        match self {
            VolumeUnit::Cups => value / CUPS_PER_GALLON,
            VolumeUnit::Liters => value * GALLONS_PER_LITER,
        }
    }
}

/// Mean of `field` over readings timestamped at or after `cutoff` (epoch
/// seconds). Readings strictly older, or with a missing or unparsable
/// timestamp, are excluded before the field is even looked at.
pub fn average_in_window(readings: &[Reading], field: &str, cutoff: i64) -> Option<f64> {
    let samples: Vec<f64> = readings
        .iter()
        .filter(|r| matches!(r.timestamp, Some(t) if t >= cutoff))
        .filter_map(|r| r.fields.get(field))
        .filter_map(|raw| parse_numeric(raw).ok())
        .collect();
    mean(&samples)
}

/// Mean of `field` over all readings, each sample converted to gallons
/// with the given unit basis before averaging.
pub fn average_gallons(readings: &[Reading], field: &str, unit: VolumeUnit) -> Option<f64> {
    let samples: Vec<f64> = readings
        .iter()
        .filter_map(|r| r.fields.get(field))
        .filter_map(|raw| parse_numeric(raw).ok())
        .map(|v| unit.to_gallons(v))
        .collect();
    mean(&samples)
}

/// Sum of all valid samples of `field`. None when no reading carried a
/// parsable value, so "all junk" is distinguishable from a true zero total.
pub fn total_for_field(readings: &[Reading], field: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for reading in readings {
        let Some(raw) = reading.fields.get(field) else {
            continue;
        };
        match parse_numeric(raw) {
            Ok(value) => {
                total += value;
                count += 1;
            }
            Err(_) => continue,
        }
    }
    (count > 0).then_some(total)
}

/// Pick the entry with the greatest total. Ties resolve to the FIRST entry
/// in iteration order (strict greater-than comparison), which makes the
/// winner deterministic even for exactly equal float totals.
pub fn max_by_total<'a>(totals: &'a [(&'a str, f64)]) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for &(name, total) in totals {
        match best {
            Some((_, best_total)) if total > best_total => best = Some((name, total)),
            None => best = Some((name, total)),
            _ => {}
        }
    }
    best
}

fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELD: &str = "Moisture Meter - Moisture Meter";

    fn reading(timestamp: Option<i64>, field: &str, value: Value) -> Reading {
        let mut fields = serde_json::Map::new();
        fields.insert(field.to_string(), value);
        Reading {
            parent_asset_id: "m38-e25-320-1z8".to_string(),
            timestamp,
            fields,
        }
    }

    #[test]
    fn window_excludes_older_samples() {
        let now = 1_700_000_000i64;
        let cutoff = now - 3 * 3600;
        let readings = vec![
            reading(Some(now - 3600), FIELD, json!("40")),
            reading(Some(now - 4 * 3600), FIELD, json!("999")),
            reading(Some(now - 1800), FIELD, json!("60")),
        ];
        let avg = average_in_window(&readings, FIELD, cutoff).unwrap();
        assert!((avg - 50.0).abs() < 1e-9);
    }

    #[test]
    fn window_excludes_missing_timestamps() {
        let readings = vec![
            reading(None, FIELD, json!("80")),
            reading(Some(100), FIELD, json!("40")),
        ];
        let avg = average_in_window(&readings, FIELD, 50).unwrap();
        assert!((avg - 40.0).abs() < 1e-9);
    }

    #[test]
    fn non_numeric_sample_is_skipped_not_fatal() {
        let readings = vec![
            reading(Some(100), FIELD, json!("40")),
            reading(Some(100), FIELD, json!("N/A")),
            reading(Some(100), FIELD, json!("60")),
        ];
        let with_junk = average_in_window(&readings, FIELD, 0).unwrap();

        let clean = vec![
            reading(Some(100), FIELD, json!("40")),
            reading(Some(100), FIELD, json!("60")),
        ];
        let without_junk = average_in_window(&clean, FIELD, 0).unwrap();

        assert_eq!(with_junk, without_junk);
        assert!((with_junk - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_yields_none() {
        assert_eq!(average_in_window(&[], FIELD, 0), None);
        let stale = vec![reading(Some(10), FIELD, json!("40"))];
        assert_eq!(average_in_window(&stale, FIELD, 100), None);
    }

    #[test]
    fn cups_convert_to_gallons() {
        let field = "Smart Dishwasher Consumption Sensor";
        let readings = vec![
            reading(None, field, json!("16")),
            reading(None, field, json!("32")),
        ];
        // mean 24 cups = 1.5 gallons
        let avg = average_gallons(&readings, field, VolumeUnit::Cups).unwrap();
        assert!((avg - 1.5).abs() < 1e-9);
    }

    #[test]
    fn liters_convert_to_gallons() {
        let field = "Smart Dishwasher Consumption Sensor";
        let readings = vec![reading(None, field, json!("10"))];
        let avg = average_gallons(&readings, field, VolumeUnit::Liters).unwrap();
        assert!((avg - 2.64172).abs() < 1e-9);
        assert_eq!(format!("{:.2}", avg), "2.64");
    }

    #[test]
    fn unit_resolution_defaults_to_cups() {
        assert_eq!(VolumeUnit::from_declared(None), VolumeUnit::Cups);
        assert_eq!(VolumeUnit::from_declared(Some("cups")), VolumeUnit::Cups);
        assert_eq!(VolumeUnit::from_declared(Some("watts")), VolumeUnit::Cups);
        assert_eq!(VolumeUnit::from_declared(Some("Liters")), VolumeUnit::Liters);
        assert_eq!(VolumeUnit::from_declared(Some("L")), VolumeUnit::Liters);
    }

    #[test]
    fn totals_sum_not_average() {
        let field = "ACS712 - Smart Fridge Ammeter";
        let readings = vec![
            reading(None, field, json!("1.5")),
            reading(None, field, json!(2.5)),
            reading(None, field, json!("bogus")),
        ];
        let total = total_for_field(&readings, field).unwrap();
        assert!((total - 4.0).abs() < 1e-9);
    }

    #[test]
    fn total_is_none_without_valid_samples() {
        let field = "ACS712 - Smart Fridge Ammeter";
        assert_eq!(total_for_field(&[], field), None);
        let junk = vec![reading(None, field, json!("N/A"))];
        assert_eq!(total_for_field(&junk, field), None);
    }

    #[test]
    fn tie_breaks_to_first_in_iteration_order() {
        let totals = [("A", 5.0), ("B", 7.2), ("C", 7.2)];
        assert_eq!(max_by_total(&totals), Some(("B", 7.2)));
    }

    #[test]
    fn max_over_empty_set_is_none() {
        assert_eq!(max_by_total(&[]), None);
    }

    #[test]
    fn parse_numeric_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_numeric(&json!(3.5)), Ok(3.5));
        assert_eq!(parse_numeric(&json!(" 42 ")), Ok(42.0));
        assert_eq!(parse_numeric(&json!("N/A")), Err(ParseNumericError));
        assert_eq!(parse_numeric(&json!(null)), Err(ParseNumericError));
        assert_eq!(parse_numeric(&json!([1])), Err(ParseNumericError));
    }
}
