// Saved cars, saved searches and the last searched postcode

use crate::{
    models::{FilterCriteria, Radius, SavedSearch, VehicleListing},
    storage::{ClientStore, StorageError, SAVED_CARS, SAVED_CARS_DATA, SAVED_SEARCHES, USER_POSTCODE},
};
use chrono::Utc;
use tokio::sync::Mutex;

pub struct SavedStore {
    store: ClientStore,
    // Oldest searches are evicted beyond this; None keeps everything
    search_limit: Option<usize>,
    // Serializes read-modify-write updates spanning several keys
    writes: Mutex<()>,
}

impl SavedStore {
    pub fn new(store: ClientStore, search_limit: Option<usize>) -> Self {
        Self {
            store,
            search_limit,
            writes: Mutex::new(()),
        }
    }

    pub async fn saved_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.store.get(SAVED_CARS).await?.unwrap_or_default())
    }

    pub async fn saved_listings(&self) -> Result<Vec<VehicleListing>, StorageError> {
        Ok(self.store.get(SAVED_CARS_DATA).await?.unwrap_or_default())
    }

    pub async fn is_saved(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.saved_ids().await?.iter().any(|saved| saved == id))
    }

    /// Flips membership of `id` and returns whether it is now saved. When
    /// saving, `snapshot` (if given) is kept so the car can be shown even after
    /// the advert is gone.
    pub async fn toggle_saved(
        &self,
        id: &str,
        snapshot: Option<VehicleListing>,
    ) -> Result<bool, StorageError> {
        let _guard = self.writes.lock().await;
        let mut ids = self.saved_ids().await?;
        let mut listings = self.saved_listings().await?;

        let now_saved = match ids.iter().position(|saved| saved == id) {
            Some(index) => {
                ids.remove(index);
                listings.retain(|listing| listing.id != id);
                false
            }
            None => {
                ids.push(id.to_string());
                if let Some(mut listing) = snapshot {
                    listing.id = id.to_string();
                    listing.distance = None;
                    listings.retain(|l| l.id != id);
                    listings.push(listing);
                }
                true
            }
        };

        // Ids and snapshots land in one write so they never disagree
        self.store
            .set_many(vec![
                (SAVED_CARS, ClientStore::encode(SAVED_CARS, &ids)?),
                (SAVED_CARS_DATA, ClientStore::encode(SAVED_CARS_DATA, &listings)?),
            ])
            .await?;
        tracing::info!(id, saved = now_saved, total = ids.len(), "Toggled saved car");
        Ok(now_saved)
    }

    pub async fn saved_searches(&self) -> Result<Vec<SavedSearch>, StorageError> {
        Ok(self.store.get(SAVED_SEARCHES).await?.unwrap_or_default())
    }

    /// Appends a timestamped snapshot. Identical searches are kept as separate entries.
    pub async fn save_search(
        &self,
        criteria: &FilterCriteria,
        postcode: Option<&str>,
        radius: Radius,
    ) -> Result<SavedSearch, StorageError> {
        let _guard = self.writes.lock().await;
        let mut searches = self.saved_searches().await?;
        let entry = SavedSearch {
            postcode: postcode.map(str::to_string),
            radius,
            filters: criteria.normalized(),
            date: Utc::now(),
        };
        searches.push(entry.clone());

        if let Some(limit) = self.search_limit {
            let excess = searches.len().saturating_sub(limit);
            if excess > 0 {
                searches.drain(..excess);
                tracing::debug!(evicted = excess, limit, "Evicted oldest saved searches");
            }
        }

        self.store.set(SAVED_SEARCHES, &searches).await?;
        tracing::info!(total = searches.len(), "Saved search");
        Ok(entry)
    }

    pub async fn delete_search(&self, index: usize) -> Result<bool, StorageError> {
        let _guard = self.writes.lock().await;
        let mut searches = self.saved_searches().await?;
        if index >= searches.len() {
            return Ok(false);
        }
        searches.remove(index);
        self.store.set(SAVED_SEARCHES, &searches).await?;
        Ok(true)
    }

    pub async fn clear_searches(&self) -> Result<(), StorageError> {
        let _guard = self.writes.lock().await;
        self.store.remove(SAVED_SEARCHES).await?;
        tracing::info!("Cleared saved searches");
        Ok(())
    }

    pub async fn user_postcode(&self) -> Result<Option<String>, StorageError> {
        self.store.get(USER_POSTCODE).await
    }

    pub async fn set_user_postcode(&self, postcode: &str) -> Result<(), StorageError> {
        self.store.set(USER_POSTCODE, &postcode).await
    }
}
