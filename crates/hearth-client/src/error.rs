// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Failure taxonomy for the upstream clients. The proxy maps each variant
/// to an HTTP status; none of them is retried automatically.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The caller supplied missing or malformed input. Maps to 400.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Transport-level failure talking to an upstream service. Maps to 502.
    #[error("cannot reach {url}: {source}")]
    UpstreamUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status. Maps to 502.
    #[error("upstream returned {status} from {url}")]
    UpstreamStatus { url: String, status: u16 },

    /// The upstream answered 200 with a shape the normalization layer
    /// cannot interpret. Equivalent to unavailability from the caller's
    /// perspective. Maps to 502.
    #[error("unexpected upstream payload: {0}")]
    UpstreamFormat(String),

    /// The service answered but had nothing for the query. Maps to 404.
    #[error("{0}")]
    NoResults(String),

    /// A required API key is unset. Maps to 500.
    #[error("{0} is not configured")]
    MissingApiKey(&'static str),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// The HTTP status the proxy reports for this failure.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NoResults(_) => 404,
            Self::UpstreamUnavailable { .. }
            | Self::UpstreamStatus { .. }
            | Self::UpstreamFormat(_) => 502,
            Self::MissingApiKey(_) => 500,
        }
    }
}
