use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
}

impl ServerConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL environment variable not set")?;

        Ok(ServerConfig { database_url })
    }
}
