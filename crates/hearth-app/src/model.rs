// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
}

/// One published opportunity from the upstream housing API. The upstream
/// payload carries many more descriptive and media fields; only the ones the
/// finder and the eligibility check consume are modeled. Unknown fields are
/// ignored on decode and the proxy passes the raw payload through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "Id")]
    pub id: ListingId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Listing_Type", default, skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<String>,
    #[serde(rename = "Tenure", default, skip_serializing_if = "Option::is_none")]
    pub tenure: Option<String>,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Units_Available", default, skip_serializing_if = "Option::is_none")]
    pub units_available: Option<u32>,
    /// Raw upstream date string; may be absent or unparseable. Parsing happens
    /// at comparison time so a malformed value degrades to "unscheduled".
    #[serde(
        rename = "Application_Due_Date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub application_due_date: Option<String>,
    #[serde(rename = "RecordType", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    #[serde(rename = "Project_ID", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(rename = "Building_Name", default, skip_serializing_if = "Option::is_none")]
    pub building_name: Option<String>,
    #[serde(
        rename = "Building_Street_Address",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub building_street_address: Option<String>,
    #[serde(rename = "Building_City", default, skip_serializing_if = "Option::is_none")]
    pub building_city: Option<String>,
    #[serde(rename = "Building_State", default, skip_serializing_if = "Option::is_none")]
    pub building_state: Option<String>,
    #[serde(
        rename = "Building_Zip_Code",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub building_zip_code: Option<String>,
    #[serde(rename = "Lottery_Status", default, skip_serializing_if = "Option::is_none")]
    pub lottery_status: Option<String>,
    #[serde(
        rename = "Accepting_Online_Applications",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub accepting_online_applications: Option<bool>,
}

impl Listing {
    pub fn record_type_name(&self) -> Option<&str> {
        self.record_type.as_ref().map(|record| record.name.as_str())
    }

    pub fn summary(&self) -> ListingSummary {
        ListingSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status.clone(),
            listing_type: self.listing_type.clone(),
            units_available: self.units_available,
            application_due_date: self.application_due_date.clone(),
        }
    }

    pub fn to_ref(&self) -> ListingRef {
        ListingRef {
            id: self.id.clone(),
            name: self.name.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

/// Reduced projection used for list rendering; related 1:1 to [`Listing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    #[serde(rename = "Id")]
    pub id: ListingId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Listing_Type", default, skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<String>,
    #[serde(rename = "Units_Available", default, skip_serializing_if = "Option::is_none")]
    pub units_available: Option<u32>,
    #[serde(
        rename = "Application_Due_Date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub application_due_date: Option<String>,
}

/// The listing fields the eligibility-check request carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRef {
    #[serde(rename = "Id")]
    pub id: ListingId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Project_ID", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingsResponse {
    pub listings: Vec<Listing>,
}

/// A lottery eligibility tag attached to a listing, e.g. "NRHP".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryPreference {
    #[serde(rename = "preferenceShortCode")]
    pub preference_short_code: String,
}

pub const NRHP_PREFERENCE_CODE: &str = "NRHP";

/// Free-form address used for a single eligibility check; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    pub fn formatted(&self) -> String {
        format!("{}, {}, {} {}", self.address1, self.city, self.state, self.zip)
    }

    pub fn is_complete(&self) -> bool {
        !self.address1.trim().is_empty()
            && !self.city.trim().is_empty()
            && !self.state.trim().is_empty()
            && !self.zip.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Bounding box in Web Mercator (EPSG:3857) meters, as returned by the GIS
/// boundary service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MercatorExtent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// Outcome of an address eligibility check. `indeterminate` records that the
/// boundary service returned a non-boolean match value; the wire contract
/// still collapses that case to `isMatch = false` and the message text is
/// what distinguishes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCheck {
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(skip)]
    pub indeterminate: bool,
}

/// Minimal GeoJSON shape for the boundary polygons; features are kept as raw
/// JSON because the proxy returns them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<serde_json::Value>,
}

pub const FEATURE_COLLECTION_TYPE: &str = "FeatureCollection";

/// The Rental/Sales filter axis of the finder pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingScope {
    All,
    Rental,
    Sales,
}

impl ListingScope {
    pub const ALL: [Self; 3] = [Self::All, Self::Rental, Self::Sales];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Rental => "Rental",
            Self::Sales => "Sales",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "All" => Some(Self::All),
            "Rental" => Some(Self::Rental),
            "Sales" => Some(Self::Sales),
            _ => None,
        }
    }

    /// The upstream `RecordType.Name` this scope keeps, or `None` for all.
    pub const fn record_type_name(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Rental => Some("Rental"),
            Self::Sales => Some("Ownership"),
        }
    }

    /// A listing without a record type belongs to neither narrowed bucket.
    pub fn admits(self, listing: &Listing) -> bool {
        match self.record_type_name() {
            None => true,
            Some(required) => listing.record_type_name() == Some(required),
        }
    }

    pub const fn next(self) -> Self {
        match self {
            Self::All => Self::Rental,
            Self::Rental => Self::Sales,
            Self::Sales => Self::All,
        }
    }
}

impl Default for ListingScope {
    fn default() -> Self {
        Self::All
    }
}
