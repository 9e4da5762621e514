mod aggregate;
mod config;
mod database;
mod dispatch;
mod index;
mod models;
mod server;

use std::io::Write;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_postgres::Client;

use config::ServerConfig;
use index::DeviceIndex;
use models::Device;

/// Fetch the metadata table once and freeze it into the device index.
async fn build_device_index(client: &Client) -> Result<DeviceIndex, tokio_postgres::Error> {
    let rows = database::metadata_rows(client).await?;

    let mut index = DeviceIndex::new();
    for (id, device_type, attributes) in rows {
        let device = Device::from_metadata_row(id.clone(), device_type, attributes);
        debug!(
            "Indexed device {} ({}, unit {:?}, tz {})",
            device.display_name, device.device_type, device.unit, device.timezone
        );
        index.insert(id, device);
    }
    Ok(index)
}

async fn prompt_port() -> Result<u16, Box<dyn std::error::Error>> {
    print!("Enter the port number for the server: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let port = line
        .trim()
        .parse::<u16>()
        .map_err(|_| "Invalid port number")?;
    Ok(port)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ServerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let port = prompt_port().await?;

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| format!("Failed to bind port {}: {}", port, e))?;
    info!("Server is listening on port {}...", port);

    // One store connection for the process; tokio-postgres clients are safe
    // to share across session tasks.
    let client = database::connect(&config.database_url).await?;

    let index = build_device_index(&client).await?;
    info!("Device index built with {} devices", index.len());

    let client = Arc::new(client);
    let index = Arc::new(index);

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    // Serve until the accept loop fails or a shutdown signal arrives
    tokio::select! {
        result = server::run_listener(listener, client, index) => {
            match result {
                Ok(_) => info!("Listener stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Server terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
