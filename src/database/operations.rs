/// Read operations against the telemetry store
use log::warn;
use serde_json::Value;
use tokio_postgres::Client;

use crate::models::Reading;

const METADATA_TABLE: &str = "\"Table 1_metadata\"";
const READINGS_TABLE: &str = "\"Table 1_virtual\"";

/// Fetch all device metadata rows for the startup index build.
///
/// Each row is `(assetUid, assetType, customAttributes)`; the attributes
/// blob is returned raw so the caller decides how to interpret it. Rows
/// with missing or mistyped columns are logged and skipped.
///
/// # Arguments
/// * `client` - shared telemetry-store client
///
/// # Returns
/// All decodable metadata rows, or the store error for the whole fetch
pub async fn metadata_rows(
    client: &Client,
) -> Result<Vec<(String, String, Value)>, tokio_postgres::Error> {
    let statement = format!(
        "SELECT \"assetUid\", \"assetType\", \"customAttributes\" FROM {}",
        METADATA_TABLE
    );
    let rows = client.query(statement.as_str(), &[]).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = match row.try_get(0) {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping metadata row without an asset id: {}", e);
                continue;
            }
        };
        let device_type: String = row.try_get(1).unwrap_or_default();
        let attributes: Value = row.try_get(2).unwrap_or(Value::Null);
        out.push((id, device_type, attributes));
    }
    Ok(out)
}

/// Fetch every reading associated with one device.
///
/// Readings are matched through the reserved `parent_asset_uid` payload key.
/// Rows whose payload fails to decode are logged and skipped; the query as a
/// whole only fails if the store itself rejects it.
///
/// # Arguments
/// * `client` - shared telemetry-store client
/// * `device_id` - owning device id to filter on
///
/// # Returns
/// All decodable readings for the device (possibly empty)
pub async fn readings_for(
    client: &Client,
    device_id: &str,
) -> Result<Vec<Reading>, tokio_postgres::Error> {
    let statement = format!(
        "SELECT payload FROM {} WHERE payload ->> 'parent_asset_uid' = $1",
        READINGS_TABLE
    );
    let rows = client.query(statement.as_str(), &[&device_id]).await?;

    let mut readings = Vec::with_capacity(rows.len());
    for row in rows {
        let payload: Value = match row.try_get(0) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping undecodable payload row for {}: {}", device_id, e);
                continue;
            }
        };
        match Reading::from_payload(payload) {
            Some(reading) => readings.push(reading),
            None => warn!("Skipping malformed reading row for device {}", device_id),
        }
    }
    Ok(readings)
}
