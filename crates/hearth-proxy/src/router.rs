// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use hearth_app::{Address, ListingId, ListingRef, ProjectId};
use hearth_client::{ClientError, GeocodeClient, GisClient, HousingClient, resolve_address};
use hearth_store::Store;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use time::Duration;

pub const GEOMETRY_CACHE_CONTROL: &str = "s-maxage=86400, stale-while-revalidate=604800";
pub const MAP_IMAGE_CACHE_CONTROL: &str = "public, max-age=3600, immutable";

/// Shared state for the proxy handlers. Every cache slot is independently
/// keyed, so a single mutex around the store is contention-free in practice.
pub struct ProxyContext {
    pub housing: HousingClient,
    pub gis: GisClient,
    pub geocoder: GeocodeClient,
    pub store: Mutex<Store>,
    pub geometry_ttl: Duration,
}

impl ProxyContext {
    pub fn new(
        housing: HousingClient,
        gis: GisClient,
        geocoder: GeocodeClient,
        store: Store,
    ) -> Self {
        Self {
            housing,
            gis,
            geocoder,
            store: Mutex::new(store),
            geometry_ttl: hearth_store::GEOMETRY_TTL,
        }
    }
}

/// Transport-agnostic response; the astra layer turns it into the real one
/// and tests assert on it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: String,
    pub cache_control: Option<&'static str>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json".to_owned(),
            cache_control: None,
            body: body.into_bytes(),
        }
    }

    /// `{"error": ...}` body, used by the listings and preferences routes.
    pub fn json_error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }).to_string())
    }

    /// `{"message": ...}` body, used by the address/geocode/geometry routes.
    pub fn json_message(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "message": message }).to_string())
    }

    pub fn text(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".to_owned(),
            cache_control: None,
            body: message.as_bytes().to_vec(),
        }
    }

    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Route a request to its handler. Unknown routes are 404.
pub fn dispatch(
    ctx: &ProxyContext,
    method: &str,
    path: &str,
    query: Option<&str>,
    body: &[u8],
) -> ApiResponse {
    match (method, path) {
        ("GET", "/listings") => listings(ctx),
        ("POST", "/check-address") => check_address(ctx, body),
        ("POST", "/geocode") => geocode(ctx, body),
        ("GET", "/map-image") => map_image(ctx, query),
        _ => {
            if method == "GET"
                && let Some(listing_id) = path.strip_prefix("/preferences/")
            {
                return preferences(ctx, listing_id);
            }
            if method == "GET"
                && let Some(project_id) = path.strip_prefix("/nrhp-geometry/")
            {
                return geometry(ctx, project_id);
            }
            ApiResponse::json_error(404, "not found")
        }
    }
}

/// Verbatim passthrough of the upstream listings payload. The last good
/// payload is cached and silently served when the upstream is down; that
/// fallback is the only automatic recovery in the proxy.
fn listings(ctx: &ProxyContext) -> ApiResponse {
    match ctx.housing.fetch_listings() {
        Ok(payload) => {
            let serialized = payload.to_string();
            match ctx.store.lock() {
                Ok(store) => {
                    if let Err(error) = store.put_listings(&serialized) {
                        eprintln!("proxy: failed to cache listings: {error:#}");
                    }
                }
                Err(_) => eprintln!("proxy: listings cache lock poisoned"),
            }
            ApiResponse::json(200, serialized)
        }
        Err(error) => {
            eprintln!("proxy: listings fetch failed: {error}");
            let cached = ctx
                .store
                .lock()
                .ok()
                .and_then(|store| store.get_listings().ok().flatten());
            match cached {
                Some(entry) => ApiResponse::json(200, entry.payload),
                None => ApiResponse::json_error(error.status_code(), "Failed to fetch listings"),
            }
        }
    }
}

fn preferences(ctx: &ProxyContext, listing_id: &str) -> ApiResponse {
    if listing_id.trim().is_empty() {
        return ApiResponse::json_error(400, "Listing ID is required in the URL path");
    }

    match ctx.housing.fetch_preferences(&ListingId::from(listing_id)) {
        Ok(preferences) => {
            ApiResponse::json(200, json!({ "preferences": preferences }).to_string())
        }
        Err(error) => ApiResponse::json_error(error.status_code(), &error.to_string()),
    }
}

fn geometry(ctx: &ProxyContext, project_id: &str) -> ApiResponse {
    if project_id.trim().is_empty() {
        return ApiResponse::json_message(400, "Missing projectId");
    }
    let project_id = ProjectId::new(project_id);

    let cached = ctx
        .store
        .lock()
        .ok()
        .and_then(|store| store.get_geometry(&project_id, ctx.geometry_ttl).ok().flatten());
    if let Some(entry) = cached {
        let mut response = ApiResponse::json(200, entry.payload);
        response.cache_control = Some(GEOMETRY_CACHE_CONTROL);
        return response;
    }

    match ctx.gis.fetch_geometry(&project_id) {
        Ok(collection) => {
            let serialized = collection.to_string();
            if let Ok(store) = ctx.store.lock()
                && let Err(error) = store.put_geometry(&project_id, &serialized)
            {
                eprintln!("proxy: failed to cache geometry for {project_id}: {error:#}");
            }
            let mut response = ApiResponse::json(200, serialized);
            response.cache_control = Some(GEOMETRY_CACHE_CONTROL);
            response
        }
        Err(error) => ApiResponse::json_message(error.status_code(), &error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct CheckAddressRequest {
    address: Address,
    listing: ListingRef,
}

fn check_address(ctx: &ProxyContext, body: &[u8]) -> ApiResponse {
    let request: CheckAddressRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(_) => return ApiResponse::json_message(400, "Failed to parse request body"),
    };

    match resolve_address(&ctx.housing, &ctx.geocoder, &request.address, &request.listing) {
        Ok(resolution) => {
            if let Some(failure) = &resolution.geocode_failure {
                eprintln!("proxy: geocoding failed during address check: {failure}");
            }
            match serde_json::to_string(&resolution.check) {
                Ok(serialized) => ApiResponse::json(200, serialized),
                Err(_) => ApiResponse::json_message(500, "failed to encode response"),
            }
        }
        Err(ClientError::Validation(message)) => ApiResponse::json_message(400, &message),
        // The eligibility upstream failing is an unexpected server-side
        // condition for this route, not a gateway distinction the caller
        // can act on.
        Err(error) => ApiResponse::json_message(500, &error.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeRequest {
    address: Address,
}

fn geocode(ctx: &ProxyContext, body: &[u8]) -> ApiResponse {
    let request: GeocodeRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(_) => return ApiResponse::json_message(400, "failed to parse request body"),
    };

    match ctx.geocoder.geocode(&request.address) {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(serialized) => ApiResponse::json(200, serialized),
            Err(_) => ApiResponse::json_message(500, "failed to encode response"),
        },
        Err(error) => ApiResponse::json_message(error.status_code(), &error.to_string()),
    }
}

fn map_image(ctx: &ProxyContext, query: Option<&str>) -> ApiResponse {
    let address = query.and_then(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .find(|(key, _)| key == "address")
            .map(|(_, value)| value.into_owned())
    });
    let Some(address) = address.filter(|value| !value.trim().is_empty()) else {
        return ApiResponse::text(400, "Address parameter is required");
    };

    match ctx.geocoder.fetch_map_image(&address) {
        Ok(image) => ApiResponse {
            status: 200,
            content_type: image.content_type,
            cache_control: Some(MAP_IMAGE_CACHE_CONTROL),
            body: image.bytes,
        },
        Err(error) => ApiResponse::text(error.status_code(), &error.to_string()),
    }
}
