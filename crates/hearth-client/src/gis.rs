// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use hearth_app::{FEATURE_COLLECTION_TYPE, ProjectId};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Upstream result caps can silently truncate; we ask for an explicit bound
/// instead and treat it as the contract.
pub const MAX_GEOMETRY_RECORDS: &str = "2000";

/// Client for the GIS feature service holding the neighborhood-preference
/// boundary polygons.
#[derive(Debug, Clone)]
pub struct GisClient {
    query_url: Url,
    http: HttpClient,
}

impl GisClient {
    pub fn new(query_url: &str, timeout: Duration) -> Result<Self> {
        if query_url.trim().is_empty() {
            bail!("upstream.gis_query_url must not be empty");
        }
        let query_url = Url::parse(query_url)
            .with_context(|| format!("parse GIS query URL {query_url:?}"))?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { query_url, http })
    }

    pub fn query_url(&self) -> &str {
        self.query_url.as_str()
    }

    /// Fetch the boundary polygon(s) for a project as GeoJSON in SRID 4326.
    /// Anything whose top-level `type` is not `FeatureCollection` is an
    /// upstream-format error.
    pub fn fetch_geometry(&self, project_id: &ProjectId) -> ClientResult<Value> {
        if project_id.as_str().trim().is_empty() {
            return Err(ClientError::Validation("project id must not be empty".to_owned()));
        }

        let mut url = self.query_url.clone();
        url.query_pairs_mut()
            .append_pair("where", &format!("ProjId='{project_id}'"))
            .append_pair("f", "geojson")
            .append_pair("returnGeometry", "true")
            .append_pair("geometryPrecision", "6")
            .append_pair("outSR", "4326")
            .append_pair("outFields", "*")
            .append_pair("resultRecordCount", MAX_GEOMETRY_RECORDS);

        let printable = url.to_string();
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

        let parsed: Value = response.json().map_err(|_| {
            ClientError::UpstreamFormat("GIS response is not valid JSON".to_owned())
        })?;

        let kind = parsed.get("type").and_then(Value::as_str);
        if kind != Some(FEATURE_COLLECTION_TYPE) {
            return Err(ClientError::UpstreamFormat(format!(
                "GIS response type is {kind:?}, expected FeatureCollection"
            )));
        }

        Ok(parsed)
    }
}
