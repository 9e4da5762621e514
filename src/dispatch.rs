/// Query dispatcher: maps inbound query codes onto aggregations and turns
/// every outcome, including store failures, into a response sentence.
use log::{error, info};
use time::{Duration, OffsetDateTime};
use tokio_postgres::Client;

use crate::aggregate::{
    average_gallons, average_in_window, max_by_total, total_for_field, VolumeUnit,
};
use crate::database::readings_for;
use crate::index::DeviceIndex;

// Fixed query targets in the reference deployment.
pub const FRIDGE_1_ID: &str = "m38-e25-320-1z8";
pub const FRIDGE_2_ID: &str = "8c40c210-83ce-4eb2-9ec0-08cc823a91a8";
pub const DISHWASHER_ID: &str = "392-szf-z5u-bh0";

// Sensor field keys, matched exactly against payload keys.
const MOISTURE_SENSOR: &str = "Moisture Meter - Moisture Meter";
const WATER_SENSOR: &str = "Smart Dishwasher Consumption Sensor";

/// Device set for the electricity comparison, in tie-break iteration order,
/// with each device's ammeter field key.
const ELECTRICITY_DEVICES: [(&str, &str, &str); 3] = [
    ("Fridge 1", FRIDGE_1_ID, "ACS712 - Smart Fridge Ammeter"),
    (
        "Fridge 2",
        FRIDGE_2_ID,
        "sensor 1 8c40c210-83ce-4eb2-9ec0-08cc823a91a8",
    ),
    ("Dishwasher", DISHWASHER_ID, "ACS712 - Smart Dishwasher Ammeter"),
];

pub const INVALID_QUERY_RESPONSE: &str = "Invalid query number.";
const STORE_FAILURE_RESPONSE: &str = "Unable to answer this query: telemetry store request failed.";

const MOISTURE_WINDOW_HOURS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryCode {
    AvgMoisture,
    AvgWaterPerCycle,
    MaxElectricity,
}

impl QueryCode {
    fn parse(code: &str) -> Option<QueryCode> {
        match code {
            "1" => Some(QueryCode::AvgMoisture),
            "2" => Some(QueryCode::AvgWaterPerCycle),
            "3" => Some(QueryCode::MaxElectricity),
            _ => None,
        }
    }
}

/// Resolve one query code to its response sentence. Unknown codes never
/// touch the store or the index; store failures are logged and answered
/// with a fixed failure sentence so the session keeps running.
pub async fn dispatch(code: &str, client: &Client, index: &DeviceIndex) -> String {
    match QueryCode::parse(code) {
        Some(QueryCode::AvgMoisture) => avg_fridge_moisture(client, index).await,
        Some(QueryCode::AvgWaterPerCycle) => avg_dishwasher_water(client, index).await,
        Some(QueryCode::MaxElectricity) => max_electricity_device(client).await,
        None => INVALID_QUERY_RESPONSE.to_string(),
    }
}

/// Query 1: average fridge moisture over the last three hours.
async fn avg_fridge_moisture(client: &Client, index: &DeviceIndex) -> String {
    if index.find(FRIDGE_1_ID).is_none() {
        info!("Fridge {} missing from device index", FRIDGE_1_ID);
    }

    let cutoff = (OffsetDateTime::now_utc() - Duration::hours(MOISTURE_WINDOW_HOURS))
        .unix_timestamp();

    let readings = match readings_for(client, FRIDGE_1_ID).await {
        Ok(readings) => readings,
        Err(e) => {
            error!("Moisture query failed against the store: {}", e);
            return STORE_FAILURE_RESPONSE.to_string();
        }
    };

    moisture_response(average_in_window(&readings, MOISTURE_SENSOR, cutoff))
}

/// Query 2: average dishwasher water per cycle, reported in gallons. The
/// conversion basis comes from the unit declared in the device's metadata.
async fn avg_dishwasher_water(client: &Client, index: &DeviceIndex) -> String {
    let declared_unit = index
        .find(DISHWASHER_ID)
        .and_then(|device| device.unit.clone());
    let unit = VolumeUnit::from_declared(declared_unit.as_deref());

    let readings = match readings_for(client, DISHWASHER_ID).await {
        Ok(readings) => readings,
        Err(e) => {
            error!("Water query failed against the store: {}", e);
            return STORE_FAILURE_RESPONSE.to_string();
        }
    };

    water_response(average_gallons(&readings, WATER_SENSOR, unit))
}

/// Query 3: device with the largest accumulated current draw. Totals are
/// sums, not averages, and the first device reaching the maximum wins.
async fn max_electricity_device(client: &Client) -> String {
    let mut totals: Vec<(&str, f64)> = Vec::new();

    for (name, device_id, sensor_key) in ELECTRICITY_DEVICES {
        let readings = match readings_for(client, device_id).await {
            Ok(readings) => readings,
            Err(e) => {
                error!("Electricity query failed against the store: {}", e);
                return STORE_FAILURE_RESPONSE.to_string();
            }
        };
        if let Some(total) = total_for_field(&readings, sensor_key) {
            totals.push((name, total));
        }
    }

    electricity_response(max_by_total(&totals))
}

fn moisture_response(average: Option<f64>) -> String {
    match average {
        Some(avg) => format!(
            "Average Relative Humidity inside your fridge over the last 3 hours is: {:.2}%",
            avg
        ),
        None => "No recent moisture readings found.".to_string(),
    }
}

fn water_response(gallons: Option<f64>) -> String {
    match gallons {
        Some(avg) => format!(
            "Average water consumption per cycle for your dishwasher: {:.2} gallons.",
            avg
        ),
        None => "No water usage data found for dishwasher.".to_string(),
    }
}

fn electricity_response(winner: Option<(&str, f64)>) -> String {
    match winner {
        Some((name, total)) => format!(
            "{} consumed the most electricity with a total current of {:.2} A.",
            name, total
        ),
        None => "No electricity usage data available.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_three_codes_parse() {
        assert_eq!(QueryCode::parse("1"), Some(QueryCode::AvgMoisture));
        assert_eq!(QueryCode::parse("2"), Some(QueryCode::AvgWaterPerCycle));
        assert_eq!(QueryCode::parse("3"), Some(QueryCode::MaxElectricity));
        assert_eq!(QueryCode::parse("9"), None);
        assert_eq!(QueryCode::parse(""), None);
        assert_eq!(QueryCode::parse("11"), None);
        assert_eq!(QueryCode::parse("exit"), None);
    }

    #[test]
    fn unknown_code_response_is_exact() {
        assert_eq!(INVALID_QUERY_RESPONSE, "Invalid query number.");
    }

    #[test]
    fn moisture_sentences() {
        assert_eq!(
            moisture_response(Some(50.0)),
            "Average Relative Humidity inside your fridge over the last 3 hours is: 50.00%"
        );
        assert_eq!(moisture_response(None), "No recent moisture readings found.");
    }

    #[test]
    fn water_sentences() {
        assert_eq!(
            water_response(Some(1.5)),
            "Average water consumption per cycle for your dishwasher: 1.50 gallons."
        );
        assert_eq!(
            water_response(None),
            "No water usage data found for dishwasher."
        );
    }

    #[test]
    fn electricity_sentences() {
        assert_eq!(
            electricity_response(Some(("Fridge 1", 7.2))),
            "Fridge 1 consumed the most electricity with a total current of 7.20 A."
        );
        assert_eq!(
            electricity_response(None),
            "No electricity usage data available."
        );
    }

    #[test]
    fn electricity_device_order_is_the_tie_break_order() {
        let names: Vec<&str> = ELECTRICITY_DEVICES.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names, ["Fridge 1", "Fridge 2", "Dishwasher"]);
    }
}
