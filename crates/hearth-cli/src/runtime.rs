// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use hearth_app::{Listing, ListingId, ListingScope, ListingsResponse, LotteryPreference};
use hearth_client::HousingClient;
use hearth_store::Store;
use hearth_tui::{AppRuntime, FetchBackend};
use std::sync::{Arc, Mutex};

/// Worker-side I/O: the housing client plus the cache that backs the
/// listings fallback. The listings payload is cached verbatim and replaced
/// wholesale; a fetch failure silently falls back to the last good copy.
pub struct CliBackend {
    housing: HousingClient,
    store: Arc<Mutex<Store>>,
    offline: bool,
}

/// Decode the cached listings payload into domain listings. Shared with the
/// startup path, which pre-populates the finder for instant first paint.
pub fn cached_listings(store: &Store) -> Result<Option<Vec<Listing>>> {
    let Some(entry) = store.get_listings()? else {
        return Ok(None);
    };
    let parsed: ListingsResponse =
        serde_json::from_str(&entry.payload).context("decode cached listings payload")?;
    Ok(Some(parsed.listings))
}

impl CliBackend {
    pub fn new(housing: HousingClient, store: Arc<Mutex<Store>>, offline: bool) -> Self {
        Self {
            housing,
            store,
            offline,
        }
    }

    fn cached_listings(&self) -> Result<Option<Vec<Listing>>> {
        let store = self
            .store
            .lock()
            .map_err(|_| anyhow!("listings cache lock poisoned"))?;
        cached_listings(&store)
    }
}

impl FetchBackend for CliBackend {
    fn fetch_listings(&mut self) -> Result<Vec<Listing>> {
        if self.offline {
            return match self.cached_listings()? {
                Some(listings) => Ok(listings),
                None => bail!("offline mode and no cached listings; run online once first"),
            };
        }

        match self.housing.fetch_listings() {
            Ok(payload) => {
                let serialized = payload.to_string();
                let parsed: ListingsResponse = serde_json::from_value(payload)
                    .context("decode listings payload")?;
                let store = self
                    .store
                    .lock()
                    .map_err(|_| anyhow!("listings cache lock poisoned"))?;
                store.put_listings(&serialized)?;
                Ok(parsed.listings)
            }
            Err(error) => match self.cached_listings()? {
                Some(listings) => Ok(listings),
                None => Err(error).context("fetch listings (no cached copy to fall back to)"),
            },
        }
    }

    fn fetch_preferences(&mut self, listing_id: &ListingId) -> Result<Vec<LotteryPreference>> {
        if self.offline {
            bail!("offline mode: preferences are not cached");
        }
        self.housing
            .fetch_preferences(listing_id)
            .with_context(|| format!("fetch preferences for listing {listing_id}"))
    }
}

/// Main-thread persistence for the finder's filter choice.
pub struct CliRuntime {
    store: Arc<Mutex<Store>>,
}

impl CliRuntime {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self { store }
    }
}

impl AppRuntime for CliRuntime {
    fn save_scope(&mut self, scope: ListingScope) -> Result<()> {
        let store = self
            .store
            .lock()
            .map_err(|_| anyhow!("scope store lock poisoned"))?;
        store.save_scope(scope)
    }
}
