use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use reqwest::{Client, Proxy};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use crate::{
    backend::BackendClient,
    config::Settings,
    saved::SavedStore,
    search::LatestResults,
    storage::ClientStore,
};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt};

// Declare modules
mod backend;
mod config;
mod error;
mod export;
mod filter;
mod models;
mod presentation;
mod query;
mod routes;
mod saved;
mod search;
mod sort;
mod storage;

// Shared application state. Everything here is built once at startup and
// handed to every request.
#[derive(Clone, FromRef)]
pub struct AppState {
    settings: Arc<Settings>,
    backend: Arc<BackendClient>,
    saved: Arc<SavedStore>,
    latest: Arc<LatestResults>,
}

impl AppState {
    pub async fn new(settings: Settings, http_client: Arc<Client>) -> Result<Self> {
        let store = ClientStore::open(&settings.storage_path)
            .await
            .with_context(|| format!("Failed to open client storage at {}", settings.storage_path))?;
        let backend = BackendClient::new(http_client, &settings);
        let saved = SavedStore::new(store, settings.saved_search_limit);

        Ok(Self {
            settings: Arc::new(settings),
            backend: Arc::new(backend),
            saved: Arc::new(saved),
            latest: Arc::new(LatestResults::default()),
        })
    }
}

fn build_http_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
        let proxy = Proxy::all(proxy_url).context("Invalid proxy_url in configuration")?;
        builder = builder.proxy(proxy);
        tracing::info!("Routing backend requests through configured proxy.");
    }
    builder.build().context("Failed to build shared reqwest client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "carmarket_rust=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing CarMarket search server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Parse the server address before anything touches the disk or network
    let addr: SocketAddr = match settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid server address format in configuration ('{}'): {}", settings.server_address, e);
            return Err(anyhow::anyhow!("Invalid server address format: {}", settings.server_address));
        }
    };

    let http_client = Arc::new(build_http_client(&settings)?);
    tracing::info!(backend = %settings.backend_url, "Shared HTTP client created.");

    let app_state = AppState::new(settings, http_client).await?;

    let router: Router = routes::create_router(app_state);
    let app = router.nest_service("/static", ServeDir::new("static"));

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
