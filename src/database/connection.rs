use log::error;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use url::Url;

pub fn create_ssl_connector(sslrootcert_path: Option<&str>) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    if let Some(path) = sslrootcert_path {
        builder
            .set_ca_file(path)
            .map_err(|e| format!("Error loading CA cert: {}", e))?;
    }

    builder.set_verify(SslVerifyMode::NONE); // TEMPORARY FOR SELF-SIGNED CERTS

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Open the single telemetry-store connection used for the whole process.
///
/// The `sslrootcert` query parameter, if present, is stripped from the URL
/// and fed to the SSL connector; tokio-postgres does not understand it.
/// One attempt only: the store is read-only for us and a failed query is
/// surfaced per request, so there is no retry loop here.
pub async fn connect(database_url: &str) -> Result<tokio_postgres::Client, String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.into_owned());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    let connector = create_ssl_connector(sslrootcert_path.as_deref())?;

    let (client, connection) = tokio_postgres::connect(clean_url.as_str(), connector)
        .await
        .map_err(|e| format!("Connection error: {}", e))?;

    // Drive the connection on its own task for the lifetime of the process.
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {}", e);
        }
    });

    Ok(client)
}
