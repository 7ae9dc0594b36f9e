// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use hearth_app::{Address, ListingId, ListingRef, LotteryPreference, MercatorExtent};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

// The upstream eligibility API requires applicant/member identity fields it
// never uses for the boundary check. These placeholders satisfy its contract
// and are not caller input.
const STUB_FIRST_NAME: &str = "First";
const STUB_LAST_NAME: &str = "Last";
const STUB_DOB: &str = "1960-01-01";

/// Client for the municipal housing API: the listings feed, per-listing
/// lottery buckets, and the address eligibility check.
#[derive(Debug, Clone)]
pub struct HousingClient {
    base_url: String,
    http: HttpClient,
}

impl HousingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("upstream.housing_base_url must not be empty");
        }
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the full listings payload verbatim. The response is kept as raw
    /// JSON because the proxy passes it through unchanged and the cache
    /// stores it wholesale.
    pub fn fetch_listings(&self) -> ClientResult<Value> {
        let url = format!("{}/listings.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|source| ClientError::UpstreamUnavailable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .map_err(|_| ClientError::UpstreamFormat("listings response is not valid JSON".to_owned()))
    }

    /// Fetch the lottery buckets for one listing and normalize them to the
    /// internal `preferences` shape. A 200 response without a
    /// `lotteryBuckets` array is an upstream-format error, not a network
    /// error.
    pub fn fetch_preferences(&self, listing_id: &ListingId) -> ClientResult<Vec<LotteryPreference>> {
        if listing_id.as_str().trim().is_empty() {
            return Err(ClientError::Validation("listing id must not be empty".to_owned()));
        }

        let url = format!("{}/listings/{}/lottery_buckets", self.base_url, listing_id);
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|source| ClientError::UpstreamUnavailable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        let parsed: Value = response.json().map_err(|_| {
            ClientError::UpstreamFormat("lottery buckets response is not valid JSON".to_owned())
        })?;
        let buckets = parsed
            .get("lotteryBuckets")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ClientError::UpstreamFormat(
                    "lottery buckets response is missing the lotteryBuckets array".to_owned(),
                )
            })?;

        buckets
            .iter()
            .map(|bucket| {
                serde_json::from_value(bucket.clone()).map_err(|_| {
                    ClientError::UpstreamFormat(
                        "lottery bucket entry is missing preferenceShortCode".to_owned(),
                    )
                })
            })
            .collect()
    }

    /// Ask the eligibility API whether an address falls inside the listing's
    /// boundary. Returns the raw `gis_data` object; classification happens
    /// in the resolution pipeline.
    pub fn check_address(&self, address: &Address, listing: &ListingRef) -> ClientResult<GisData> {
        let url = format!("{}/addresses/gis-data.json", self.base_url);
        let payload = GisCheckRequest {
            address,
            listing: GisCheckListing {
                id: listing.id.as_str(),
                name: &listing.name,
            },
            project_id: listing
                .project_id
                .as_ref()
                .map_or("", |project_id| project_id.as_str()),
            member: StubIdentity::default(),
            applicant: StubIdentity::default(),
        };

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|source| ClientError::UpstreamUnavailable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        let parsed: GisCheckResponse = response.json().map_err(|_| {
            ClientError::UpstreamFormat("gis-data response is not valid JSON".to_owned())
        })?;
        parsed.gis_data.ok_or_else(|| {
            ClientError::UpstreamFormat("gis-data response is missing gis_data".to_owned())
        })
    }
}

/// Raw boundary-check payload from the eligibility API. `boundary_match` is
/// kept as a JSON value because the upstream sometimes returns null (or
/// garbage) and that case must stay distinguishable from `false`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GisData {
    #[serde(default)]
    pub boundary_match: Option<Value>,
    #[serde(default)]
    pub extent: Option<MercatorExtent>,
}

impl GisData {
    /// `Some(value)` when the upstream committed to a boolean answer,
    /// `None` for null, absent, or non-boolean values.
    pub fn boundary_match(&self) -> Option<bool> {
        match &self.boundary_match {
            Some(Value::Bool(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GisCheckResponse {
    #[serde(default)]
    gis_data: Option<GisData>,
}

#[derive(Debug, Serialize)]
struct GisCheckRequest<'a> {
    address: &'a Address,
    listing: GisCheckListing<'a>,
    project_id: &'a str,
    member: StubIdentity,
    applicant: StubIdentity,
}

#[derive(Debug, Serialize)]
struct GisCheckListing<'a> {
    #[serde(rename = "Id")]
    id: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct StubIdentity {
    #[serde(rename = "firstName")]
    first_name: &'static str,
    #[serde(rename = "lastName")]
    last_name: &'static str,
    dob: &'static str,
}

impl Default for StubIdentity {
    fn default() -> Self {
        Self {
            first_name: STUB_FIRST_NAME,
            last_name: STUB_LAST_NAME,
            dob: STUB_DOB,
        }
    }
}
