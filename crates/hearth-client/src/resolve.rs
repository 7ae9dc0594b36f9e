// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use hearth_app::{Address, BoundaryCheck, ListingRef};

use crate::error::{ClientError, ClientResult};
use crate::geocode::GeocodeClient;
use crate::housing::{GisData, HousingClient};
use crate::mercator::viewport_from_extent;

pub const WITHIN_BOUNDARY_MESSAGE: &str = "✅ Address is within the listing boundary.";
pub const OUTSIDE_BOUNDARY_MESSAGE: &str = "❌ Address is NOT within the listing boundary.";
pub const INDETERMINATE_BOUNDARY_MESSAGE: &str =
    "Could not determine boundary match from API response (null or invalid value received).";

/// The pipeline output plus the geocoding failure it swallowed, if any.
/// Geocoding is best-effort: its failure never fails the overall check, but
/// the caller is expected to log it.
#[derive(Debug)]
pub struct AddressResolution {
    pub check: BoundaryCheck,
    pub geocode_failure: Option<ClientError>,
}

/// Classify the raw boundary answer. A strictly boolean value is taken at
/// face value; null, absent, or non-boolean collapses to a non-match whose
/// message says the value was indeterminate (observed upstream behavior,
/// deliberately preserved).
pub fn classify_boundary(gis_data: &GisData) -> (bool, bool, &'static str) {
    match gis_data.boundary_match() {
        Some(true) => (true, false, WITHIN_BOUNDARY_MESSAGE),
        Some(false) => (false, false, OUTSIDE_BOUNDARY_MESSAGE),
        None => (false, true, INDETERMINATE_BOUNDARY_MESSAGE),
    }
}

/// Resolve a free-form address against a listing's boundary:
///
/// 1. validate the inputs;
/// 2. ask the eligibility API for the boundary answer and classify it;
/// 3. geocode the address for map coordinates, swallowing any failure;
/// 4. when the geocoder yielded no viewport but the boundary payload
///    carried a Web Mercator extent, derive the viewport from the extent.
pub fn resolve_address(
    housing: &HousingClient,
    geocoder: &GeocodeClient,
    address: &Address,
    listing: &ListingRef,
) -> ClientResult<AddressResolution> {
    if !address.is_complete() {
        return Err(ClientError::Validation(
            "address1, city, state, and zip are all required".to_owned(),
        ));
    }
    if listing.id.as_str().trim().is_empty() || listing.name.trim().is_empty() {
        return Err(ClientError::Validation(
            "listing Id and Name are required".to_owned(),
        ));
    }

    let gis_data = housing.check_address(address, listing)?;
    let (is_match, indeterminate, message) = classify_boundary(&gis_data);

    let mut check = BoundaryCheck {
        is_match,
        message: message.to_owned(),
        lat: None,
        lng: None,
        viewport: None,
        indeterminate,
    };

    let geocode_failure = match geocoder.geocode(address) {
        Ok(result) => {
            check.lat = result.lat;
            check.lng = result.lng;
            check.viewport = result.viewport;
            None
        }
        Err(error) => Some(error),
    };

    if check.viewport.is_none()
        && let Some(extent) = &gis_data.extent
    {
        check.viewport = Some(viewport_from_extent(extent));
    }

    Ok(AddressResolution {
        check,
        geocode_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        INDETERMINATE_BOUNDARY_MESSAGE, OUTSIDE_BOUNDARY_MESSAGE, WITHIN_BOUNDARY_MESSAGE,
        classify_boundary,
    };
    use crate::housing::GisData;
    use serde_json::json;

    fn gis_data(boundary_match: serde_json::Value) -> GisData {
        serde_json::from_value(json!({ "boundary_match": boundary_match })).expect("decode")
    }

    #[test]
    fn boolean_answers_are_taken_at_face_value() {
        let (is_match, indeterminate, message) = classify_boundary(&gis_data(json!(true)));
        assert!(is_match);
        assert!(!indeterminate);
        assert_eq!(message, WITHIN_BOUNDARY_MESSAGE);

        let (is_match, indeterminate, message) = classify_boundary(&gis_data(json!(false)));
        assert!(!is_match);
        assert!(!indeterminate);
        assert_eq!(message, OUTSIDE_BOUNDARY_MESSAGE);
    }

    #[test]
    fn null_and_garbage_collapse_to_indeterminate() {
        for raw in [json!(null), json!("true"), json!(1)] {
            let (is_match, indeterminate, message) = classify_boundary(&gis_data(raw.clone()));
            assert!(!is_match, "value {raw}");
            assert!(indeterminate, "value {raw}");
            assert_eq!(message, INDETERMINATE_BOUNDARY_MESSAGE);
        }
    }
}
