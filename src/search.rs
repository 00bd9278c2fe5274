// The search cycle: radius search, fallback to all listings, filtering and sorting.
// Also tracks which response is the newest so a slow, stale search cannot
// overwrite a newer one.

use crate::{
    backend::BackendError,
    filter,
    models::{FilterCriteria, Radius, SearchQuery, SearchResultSet, VehicleListing},
    sort,
};
use axum::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Where listings come from. The production implementation is the HTTP backend.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Listings within `miles` of `postcode`, each carrying `distance`.
    async fn search_by_postcode(
        &self,
        postcode: &str,
        miles: u32,
    ) -> Result<Vec<VehicleListing>, BackendError>;

    /// National search narrowed by the backend where it supports the filters.
    async fn search_vehicles(
        &self,
        criteria: &FilterCriteria,
    ) -> Result<Vec<VehicleListing>, BackendError>;

    /// Every listing, with no radius and no filters.
    async fn all_listings(&self) -> Result<Vec<VehicleListing>, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    RadiusSearch,
    HasResults,
    Fallback,
    National,
}

pub struct SearchPipeline<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S> SearchPipeline<'a, S>
where
    S: ListingSource + ?Sized,
{
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub async fn run(&self, query: &SearchQuery) -> Result<SearchResultSet, BackendError> {
        let criteria = &query.criteria.normalized();
        let (state, mut results) = match (query.postcode.as_deref(), criteria.radius) {
            (Some(postcode), Radius::Miles(miles)) => self.radius_search(postcode, miles, criteria).await?,
            _ => {
                tracing::info!(state = ?SearchState::National, "Running national search");
                let cars = self.source.search_vehicles(criteria).await?;
                let mut filtered = filter::evaluate(&cars, criteria);
                strip_distance(&mut filtered);
                (SearchState::National, filtered)
            }
        };

        sort::sort_in_place(&mut results, criteria.sort_by);
        let showing_all_cars = state == SearchState::Fallback;
        tracing::info!(
            state = ?state,
            count = results.len(),
            sort_by = criteria.sort_by.as_str(),
            showing_all_cars,
            "Search complete"
        );
        Ok(SearchResultSet::new(
            query.postcode.clone(),
            criteria.radius,
            results,
            showing_all_cars,
        ))
    }

    async fn radius_search(
        &self,
        postcode: &str,
        miles: u32,
        criteria: &FilterCriteria,
    ) -> Result<(SearchState, Vec<VehicleListing>), BackendError> {
        tracing::info!(state = ?SearchState::RadiusSearch, postcode, miles, "Running radius search");
        let nearby = self.source.search_by_postcode(postcode, miles).await?;
        let filtered = filter::evaluate(&nearby, criteria);
        if !filtered.is_empty() {
            return Ok((SearchState::HasResults, filtered));
        }

        // Terminal: no further fallback levels, even if this is empty too
        tracing::info!(
            state = ?SearchState::Fallback,
            postcode,
            miles,
            fetched = nearby.len(),
            "No matches within radius, falling back to all listings"
        );
        let all = self.source.all_listings().await?;
        let mut fallback = filter::evaluate(&all, criteria);
        strip_distance(&mut fallback);
        Ok((SearchState::Fallback, fallback))
    }
}

// Distances only exist on results of a postcode-anchored search
fn strip_distance(listings: &mut [VehicleListing]) {
    for listing in listings {
        listing.distance = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchTicket(u64);

/// Hands out increasing tickets, one per dispatched search.
#[derive(Debug, Default)]
pub struct SearchSequencer {
    issued: AtomicU64,
}

impl SearchSequencer {
    pub fn begin(&self) -> SearchTicket {
        SearchTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }
}

/// The most recent search result, guarded against out-of-order completion.
#[derive(Debug, Default)]
pub struct LatestResults {
    sequencer: SearchSequencer,
    slot: RwLock<Option<(SearchTicket, SearchResultSet)>>,
}

impl LatestResults {
    pub fn begin(&self) -> SearchTicket {
        self.sequencer.begin()
    }

    /// Stores `results` if `ticket` is still the newest dispatched search.
    /// Returns false when the response is stale and was discarded.
    pub async fn commit(&self, ticket: SearchTicket, results: SearchResultSet) -> bool {
        let mut slot = self.slot.write().await;
        let newer_stored = slot.as_ref().is_some_and(|(stored, _)| *stored >= ticket);
        if !self.sequencer.is_current(ticket) || newer_stored {
            tracing::debug!(?ticket, "Discarding stale search response");
            return false;
        }
        *slot = Some((ticket, results));
        true
    }

    pub async fn latest(&self) -> Option<SearchResultSet> {
        self.slot.read().await.as_ref().map(|(_, set)| set.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortBy;
    use reqwest::StatusCode;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeSource {
        nearby: Vec<VehicleListing>,
        all: Vec<VehicleListing>,
        fail: bool,
        postcode_calls: AtomicUsize,
        search_calls: AtomicUsize,
        all_calls: AtomicUsize,
    }

    impl FakeSource {
        fn error(&self) -> Result<Vec<VehicleListing>, BackendError> {
            Err(BackendError::Status {
                url: "http://backend.test".into(),
                status: StatusCode::BAD_GATEWAY,
            })
        }
    }

    #[async_trait]
    impl ListingSource for FakeSource {
        async fn search_by_postcode(
            &self,
            _postcode: &str,
            _miles: u32,
        ) -> Result<Vec<VehicleListing>, BackendError> {
            self.postcode_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return self.error();
            }
            Ok(self.nearby.clone())
        }

        async fn search_vehicles(
            &self,
            _criteria: &FilterCriteria,
        ) -> Result<Vec<VehicleListing>, BackendError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return self.error();
            }
            Ok(self.all.clone())
        }

        async fn all_listings(&self) -> Result<Vec<VehicleListing>, BackendError> {
            self.all_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return self.error();
            }
            Ok(self.all.clone())
        }
    }

    fn car(id: &str, make: &str, price: u32, distance: Option<f64>) -> VehicleListing {
        VehicleListing {
            id: id.to_string(),
            make: make.to_string(),
            model: "Model".to_string(),
            price: Some(price),
            distance,
            ..Default::default()
        }
    }

    fn ids(set: &SearchResultSet) -> Vec<&str> {
        set.results().iter().map(|l| l.id.as_str()).collect()
    }

    fn radius_query(postcode: &str, miles: u32, criteria: FilterCriteria) -> SearchQuery {
        SearchQuery {
            postcode: Some(postcode.to_string()),
            criteria: FilterCriteria {
                radius: Radius::Miles(miles),
                ..criteria
            },
            open_filter: None,
        }
    }

    #[tokio::test]
    async fn audi_price_band_sorted_low_to_high() {
        let source = FakeSource {
            all: vec![
                car("bmw", "BMW", 15_000, None),
                car("audi-18", "Audi", 18_000, None),
                car("ford", "Ford", 11_000, None),
                car("audi-12", "Audi", 12_000, None),
                car("vw", "Volkswagen", 14_000, None),
            ],
            ..Default::default()
        };
        let query = SearchQuery {
            criteria: FilterCriteria {
                make: Some("Audi".into()),
                price_from: Some(10_000),
                price_to: Some(20_000),
                sort_by: SortBy::PriceLow,
                ..Default::default()
            },
            ..Default::default()
        };

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert_eq!(ids(&set), ["audi-12", "audi-18"]);
        assert_eq!(set.count(), 2);
        assert!(!set.showing_all_cars());
        assert_eq!(source.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn radius_hits_skip_fallback() {
        let source = FakeSource {
            nearby: vec![car("far", "Ford", 5_000, Some(20.0)), car("near", "Ford", 6_000, Some(2.0))],
            ..Default::default()
        };
        let query = radius_query(
            "SW1A 1AA",
            25,
            FilterCriteria {
                sort_by: SortBy::Distance,
                ..Default::default()
            },
        );

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert_eq!(ids(&set), ["near", "far"]);
        assert!(!set.showing_all_cars());
        assert_eq!(set.postcode(), Some("SW1A 1AA"));
        assert_eq!(source.all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_radius_search_falls_back_once() {
        let source = FakeSource {
            nearby: vec![],
            all: vec![
                car("a", "Audi", 9_000, Some(140.0)),
                car("b", "Ford", 4_000, None),
                car("c", "Audi", 7_000, None),
            ],
            ..Default::default()
        };
        let query = radius_query(
            "SW1A 1AA",
            25,
            FilterCriteria {
                make: Some("Audi".into()),
                sort_by: SortBy::Distance,
                ..Default::default()
            },
        );

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert!(set.showing_all_cars());
        assert_eq!(ids(&set), ["a", "c"]);
        assert!(set.results().iter().all(|l| l.distance.is_none()));
        assert_eq!(source.postcode_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filtered_to_zero_also_falls_back() {
        let source = FakeSource {
            nearby: vec![car("near-ford", "Ford", 4_000, Some(3.0))],
            all: vec![car("far-audi", "Audi", 9_000, None)],
            ..Default::default()
        };
        let query = radius_query(
            "M1 1AE",
            10,
            FilterCriteria {
                make: Some("Audi".into()),
                ..Default::default()
            },
        );

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert!(set.showing_all_cars());
        assert_eq!(ids(&set), ["far-audi"]);
    }

    #[tokio::test]
    async fn empty_fallback_is_still_tagged() {
        let source = FakeSource::default();
        let query = radius_query("M1 1AE", 5, FilterCriteria::default());

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert!(set.showing_all_cars());
        assert_eq!(set.count(), 0);
        assert_eq!(source.all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn postcode_without_radius_is_national() {
        let source = FakeSource {
            all: vec![car("x", "Ford", 1_000, None)],
            ..Default::default()
        };
        let query = SearchQuery {
            postcode: Some("M1 1AE".into()),
            ..Default::default()
        };

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert_eq!(set.count(), 1);
        assert_eq!(source.postcode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wildcard_criteria_built_in_code_do_not_filter() {
        let source = FakeSource {
            all: vec![car("a", "Audi", 9_000, None), car("f", "Ford", 4_000, None)],
            ..Default::default()
        };
        let query = SearchQuery {
            criteria: FilterCriteria {
                make: Some("Any".into()),
                fuel_type: Some("  ".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let set = SearchPipeline::new(&source).run(&query).await.unwrap();
        assert_eq!(ids(&set), ["a", "f"]);
    }

    #[tokio::test]
    async fn backend_errors_surface_without_retry() {
        let source = FakeSource {
            fail: true,
            ..Default::default()
        };
        let query = radius_query("M1 1AE", 5, FilterCriteria::default());

        let err = SearchPipeline::new(&source).run(&query).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { .. }));
        assert_eq!(source.postcode_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.all_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_responses_are_discarded() {
        let latest = LatestResults::default();
        let first = latest.begin();
        let second = latest.begin();

        let newer = SearchResultSet::new(Some("M1 1AE".into()), Radius::Miles(5), vec![], false);
        let older = SearchResultSet::new(Some("SW1A 1AA".into()), Radius::Miles(5), vec![], false);

        // The newer search resolves first, then the older one arrives late
        assert!(latest.commit(second, newer.clone()).await);
        assert!(!latest.commit(first, older).await);
        assert_eq!(latest.latest().await, Some(newer));
    }

    #[tokio::test]
    async fn superseded_ticket_cannot_commit() {
        let latest = LatestResults::default();
        let first = latest.begin();
        let _second = latest.begin();

        let set = SearchResultSet::new(None, Radius::National, vec![], false);
        assert!(!latest.commit(first, set).await);
        assert_eq!(latest.latest().await, None);
    }
}
