// Application settings: defaults, then an optional config.toml, then APP_* environment variables

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the marketplace REST backend
    pub backend_url: String,
    pub proxy_url: Option<String>,
    // File standing in for browser storage (saved cars, saved searches, last postcode)
    pub storage_path: String,
    pub request_timeout_secs: u64,
    pub search_timeout_secs: Option<u64>,
    pub filter_options_ttl_secs: u64,
    // None keeps every saved search
    pub saved_search_limit: Option<usize>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("backend_url", "http://127.0.0.1:5000/api")?
            .set_default("storage_path", "data/client_storage.json")?
            .set_default("request_timeout_secs", 15)?
            .set_default("filter_options_ttl_secs", 300)?
            .add_source(File::with_name("config").required(false))
            // e.g. APP_BACKEND_URL, APP_SAVED_SEARCH_LIMIT
            .add_source(Environment::with_prefix("APP").try_parsing(true));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests(backend_url: &str, storage_path: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            backend_url: backend_url.to_string(),
            proxy_url: None,
            storage_path: storage_path.to_string(),
            request_timeout_secs: 5,
            search_timeout_secs: Some(5),
            filter_options_ttl_secs: 60,
            saved_search_limit: None,
        }
    }
}
