// Client for the marketplace REST backend (vehicle search, postcode search, filter options)

use crate::{
    config::Settings,
    models::{
        FilterCriteria, FilterOptions, PostcodeSearchResponse, VehicleListing,
        VehicleSearchResponse,
    },
    query,
    search::ListingSource,
};
use axum::async_trait;
use cached::{Cached, TimedCache};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

const VEHICLE_SEARCH_PATH: &str = "/vehicles/search";
const POSTCODE_SEARCH_PATH: &str = "/postcode/search";
const FILTER_OPTIONS_PATH: &str = "/vehicles/filter-options";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub struct BackendClient {
    http: Arc<Client>,
    base_url: String,
    request_timeout: Duration,
    // Searches are untimed unless configured
    search_timeout: Option<Duration>,
    filter_options: Mutex<TimedCache<String, FilterOptions>>,
}

impl BackendClient {
    pub fn new(http: Arc<Client>, settings: &Settings) -> Self {
        Self {
            http,
            base_url: settings.backend_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            search_timeout: settings.search_timeout_secs.map(Duration::from_secs),
            filter_options: Mutex::new(TimedCache::with_lifespan(
                settings.filter_options_ttl_secs,
            )),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, ?params, "Calling backend");

        let mut request = self
            .http
            .get(&url)
            .query(params)
            .header(ACCEPT, "application/json");
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|source| {
            tracing::warn!(url = %url, error = %source, "Backend request failed");
            BackendError::Request {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "Backend returned an error status");
            return Err(BackendError::Status { url, status });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| BackendError::Decode { url, source })
    }

    /// Valid sidebar values, cached for the configured TTL.
    pub async fn filter_options(&self) -> Result<FilterOptions, BackendError> {
        let mut cache = self.filter_options.lock().await;
        if let Some(options) = cache.cache_get(&self.base_url) {
            tracing::debug!("Using cached filter options.");
            return Ok(options.clone());
        }

        let options: FilterOptions = self
            .get_json(FILTER_OPTIONS_PATH, &[], Some(self.request_timeout))
            .await?;
        tracing::info!(
            makes = options.makes.len(),
            models = options.models.len(),
            "Fetched filter options"
        );
        cache.cache_set(self.base_url.clone(), options.clone());
        Ok(options)
    }
}

#[async_trait]
impl ListingSource for BackendClient {
    async fn search_by_postcode(
        &self,
        postcode: &str,
        miles: u32,
    ) -> Result<Vec<VehicleListing>, BackendError> {
        let params = [("postcode", postcode.to_string()), ("radius", miles.to_string())];
        let response: PostcodeSearchResponse = self
            .get_json(POSTCODE_SEARCH_PATH, &params, self.search_timeout)
            .await?;
        tracing::info!(
            postcode = %response.postcode,
            results = response.results.len(),
            "Postcode search complete"
        );
        Ok(response.results)
    }

    async fn search_vehicles(
        &self,
        criteria: &FilterCriteria,
    ) -> Result<Vec<VehicleListing>, BackendError> {
        let params = query::criteria_pairs(criteria);
        let response: VehicleSearchResponse = self
            .get_json(VEHICLE_SEARCH_PATH, &params, self.search_timeout)
            .await?;
        tracing::info!(
            returned = response.cars.len(),
            total = response.total,
            "Vehicle search complete"
        );
        Ok(response.cars)
    }

    async fn all_listings(&self) -> Result<Vec<VehicleListing>, BackendError> {
        let response: VehicleSearchResponse = self
            .get_json(VEHICLE_SEARCH_PATH, &[], self.search_timeout)
            .await?;
        tracing::info!(returned = response.cars.len(), total = response.total, "Fetched all listings");
        Ok(response.cars)
    }
}
