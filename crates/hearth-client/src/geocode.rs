// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use hearth_app::{Address, Viewport};
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";
pub const API_KEY_NAME: &str = "GOOGLE_MAPS_API_KEY";

/// Coordinates and viewport for a geocoded address. Every field is
/// best-effort; callers must tolerate any of them being absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct GeocodeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

#[derive(Debug, Clone)]
pub struct MapImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Client for the authoritative geocoder and its static-map sibling.
#[derive(Debug, Clone)]
pub struct GeocodeClient {
    geocode_url: Url,
    static_map_url: Url,
    api_key: String,
    http: HttpClient,
}

impl GeocodeClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Self::with_endpoints(DEFAULT_GEOCODE_URL, DEFAULT_STATIC_MAP_URL, api_key, timeout)
    }

    /// Endpoint override used by tests to point at a mock server.
    pub fn with_endpoints(
        geocode_url: &str,
        static_map_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let geocode_url = Url::parse(geocode_url)
            .with_context(|| format!("parse geocode URL {geocode_url:?}"))?;
        let static_map_url = Url::parse(static_map_url)
            .with_context(|| format!("parse static map URL {static_map_url:?}"))?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            geocode_url,
            static_map_url,
            api_key: api_key.to_owned(),
            http,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Geocode a complete address. Zero results (or a non-OK geocoder
    /// status) is `NoResults`; transport failure is `UpstreamUnavailable`.
    pub fn geocode(&self, address: &Address) -> ClientResult<GeocodeResult> {
        if !address.is_complete() {
            return Err(ClientError::Validation(
                "address1, city, state, and zip are all required".to_owned(),
            ));
        }
        if !self.has_api_key() {
            return Err(ClientError::MissingApiKey(API_KEY_NAME));
        }

        let mut url = self.geocode_url.clone();
        url.query_pairs_mut()
            .append_pair("address", &address.formatted())
            .append_pair("key", &self.api_key);

        let printable = self.geocode_url.to_string();
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|source| ClientError::UpstreamUnavailable {
                url: printable.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UpstreamStatus {
                url: printable,
                status: status.as_u16(),
            });
        }

        let parsed: GeocodingResponse = response.json().map_err(|_| {
            ClientError::UpstreamFormat("geocoder response is not valid JSON".to_owned())
        })?;

        if parsed.status != "OK" || parsed.results.is_empty() {
            return Err(ClientError::NoResults(format!(
                "geocoding returned status {}",
                parsed.status
            )));
        }

        let first = &parsed.results[0];
        let mut result = GeocodeResult::default();
        if let Some(geometry) = &first.geometry {
            if let Some(location) = &geometry.location {
                result.lat = Some(location.lat);
                result.lng = Some(location.lng);
            }
            if let Some(viewport) = &geometry.viewport
                && let (Some(northeast), Some(southwest)) =
                    (&viewport.northeast, &viewport.southwest)
            {
                result.viewport = Some(Viewport {
                    north: northeast.lat,
                    east: northeast.lng,
                    south: southwest.lat,
                    west: southwest.lng,
                });
            }
        }
        Ok(result)
    }

    /// Fetch a static map tile centered on an address, with a marker.
    pub fn fetch_map_image(&self, address: &str) -> ClientResult<MapImage> {
        if address.trim().is_empty() {
            return Err(ClientError::Validation("address must not be empty".to_owned()));
        }
        if !self.has_api_key() {
            return Err(ClientError::MissingApiKey(API_KEY_NAME));
        }

        let mut url = self.static_map_url.clone();
        url.query_pairs_mut()
            .append_pair("center", address)
            .append_pair("zoom", "15")
            .append_pair("size", "640x400")
            .append_pair("maptype", "roadmap")
            .append_pair("markers", &format!("color:red|{address}"))
            .append_pair("key", &self.api_key);

        let printable = self.static_map_url.to_string();
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|source| ClientError::UpstreamUnavailable {
                url: printable.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UpstreamStatus {
                url: printable,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/png")
            .to_owned();
        let bytes = response
            .bytes()
            .map_err(|_| ClientError::UpstreamFormat("map image body could not be read".to_owned()))?
            .to_vec();
        Ok(MapImage {
            content_type,
            bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodingEntry>,
}

#[derive(Debug, Deserialize)]
struct GeocodingEntry {
    #[serde(default)]
    geometry: Option<GeocodingGeometry>,
}

#[derive(Debug, Deserialize)]
struct GeocodingGeometry {
    #[serde(default)]
    location: Option<LatLng>,
    #[serde(default)]
    viewport: Option<GeocodingViewport>,
}

#[derive(Debug, Deserialize)]
struct GeocodingViewport {
    #[serde(default)]
    northeast: Option<LatLng>,
    #[serde(default)]
    southwest: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}
