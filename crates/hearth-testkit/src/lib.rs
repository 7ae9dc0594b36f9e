// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use hearth_app::{Listing, ListingId, ProjectId, RecordType};
use serde_json::json;
use time::macros::format_description;
use time::{Date, Duration, Month};

const BUILDING_ADJECTIVES: [&str; 12] = [
    "Sunset", "Harbor", "Mission", "Alamo", "Portola", "Dolores", "Marina", "Presidio", "Balboa",
    "Crestview", "Juniper", "Shoreline",
];

const BUILDING_NOUNS: [&str; 10] = [
    "Commons", "Terrace", "Court", "Flats", "Gardens", "Residences", "Crossing", "Lofts", "Place",
    "Apartments",
];

const STREET_NAMES: [&str; 12] = [
    "Folsom", "Howard", "Bryant", "Valencia", "Guerrero", "Clement", "Irving", "Judah", "Taraval",
    "Geary", "Fulton", "Cortland",
];

const STATUSES: [&str; 4] = ["Active", "Lease Up", "Closed", "Pending"];

const TENURES: [&str; 4] = [
    "New rental",
    "Re-rental",
    "First come, first served",
    "Resale",
];

const RECORD_TYPE_NAMES: [&str; 2] = ["Rental", "Ownership"];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Deterministic listing generator for tests. The same seed always yields
/// the same sequence, so assertions can rely on exact values.
#[derive(Debug, Clone)]
pub struct ListingFaker {
    rng: DeterministicRng,
    counter: u64,
}

impl ListingFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(if seed == 0 { 1 } else { seed }),
            counter: 0,
        }
    }

    pub fn listing(&mut self) -> Listing {
        self.counter += 1;
        // Counter prefix keeps ids unique within a batch; the random suffix
        // keeps them from looking sequential.
        let id = format!(
            "a0W{:07}{:06}",
            self.counter,
            self.rng.next_u64() % 1_000_000
        );
        let name = format!(
            "{} {}",
            self.pick(&BUILDING_ADJECTIVES),
            self.pick(&BUILDING_NOUNS),
        );
        let record_type_name = self.pick(&RECORD_TYPE_NAMES).to_owned();
        let listing_type = if record_type_name == "Rental" {
            "Affordable Rental Units"
        } else {
            "BMR Ownership Units"
        };

        // Roughly one in six listings has no due date and one in ten carries
        // an unparseable one, matching what the live feed actually contains.
        let due_roll = self.rng.int_n(30);
        let application_due_date = if due_roll < 5 {
            None
        } else if due_roll < 8 {
            Some("TBD".to_owned())
        } else {
            Some(self.due_date_string())
        };

        Listing {
            id: ListingId::new(id),
            name,
            listing_type: Some(listing_type.to_owned()),
            tenure: Some(self.pick(&TENURES).to_owned()),
            status: Some(self.pick(&STATUSES).to_owned()),
            units_available: Some(self.rng.int_n(120) as u32),
            application_due_date,
            record_type: Some(RecordType {
                id: Some(format!("012{:012}", self.counter)),
                name: record_type_name,
            }),
            project_id: Some(ProjectId::new(format!(
                "{}-{:03}",
                REFERENCE_YEAR - 10 + self.rng.int_n(10) as i32,
                self.rng.int_n(900) + 100,
            ))),
            building_name: None,
            building_street_address: Some(format!(
                "{} {} St",
                self.rng.int_n(2000) + 1,
                self.pick(&STREET_NAMES),
            )),
            building_city: Some("San Francisco".to_owned()),
            building_state: Some("CA".to_owned()),
            building_zip_code: Some(format!("941{:02}", self.rng.int_n(34))),
            lottery_status: Some("Not Yet Run".to_owned()),
            accepting_online_applications: Some(self.rng.int_n(4) != 0),
        }
    }

    pub fn listings(&mut self, count: usize) -> Vec<Listing> {
        (0..count).map(|_| self.listing()).collect()
    }

    fn due_date_string(&mut self) -> String {
        let base = Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1)
            .expect("valid reference date");
        let date = base + Duration::days(self.rng.int_n(540) as i64);
        let formatted = date
            .format(&format_description!("[year]-[month]-[day]"))
            .expect("date format is valid");
        format!("{formatted}T01:00:00.000Z")
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// The `/listings.json` payload shape, serialized for mock upstreams.
pub fn listings_payload(listings: &[Listing]) -> serde_json::Value {
    json!({ "listings": listings })
}

/// The upstream lottery-buckets payload. Pass `None` to produce the
/// malformed variant without the `lotteryBuckets` array.
pub fn lottery_buckets_payload(codes: Option<&[&str]>) -> serde_json::Value {
    match codes {
        Some(codes) => json!({
            "lotteryBuckets": codes
                .iter()
                .map(|code| json!({ "preferenceShortCode": code }))
                .collect::<Vec<_>>(),
        }),
        None => json!({ "listing": { "Id": "a0W0" } }),
    }
}

/// The eligibility-check (`gis-data`) response. `boundary_match` of `None`
/// serializes as JSON null; `extent` is `(xmin, ymin, xmax, ymax)` in Web
/// Mercator meters.
pub fn gis_data_payload(
    boundary_match: Option<bool>,
    extent: Option<(f64, f64, f64, f64)>,
) -> serde_json::Value {
    let mut gis_data = json!({ "boundary_match": boundary_match });
    if let Some((xmin, ymin, xmax, ymax)) = extent {
        gis_data["extent"] = json!({
            "xmin": xmin,
            "ymin": ymin,
            "xmax": xmax,
            "ymax": ymax,
        });
    }
    json!({ "gis_data": gis_data })
}

/// A Google geocoder response with one result.
pub fn geocode_payload(lat: f64, lng: f64, viewport_margin: f64) -> serde_json::Value {
    json!({
        "status": "OK",
        "results": [{
            "geometry": {
                "location": { "lat": lat, "lng": lng },
                "viewport": {
                    "northeast": { "lat": lat + viewport_margin, "lng": lng + viewport_margin },
                    "southwest": { "lat": lat - viewport_margin, "lng": lng - viewport_margin },
                },
            },
        }],
    })
}

/// A Google geocoder response carrying zero results.
pub fn geocode_zero_results_payload() -> serde_json::Value {
    json!({ "status": "ZERO_RESULTS", "results": [] })
}

/// A minimal one-polygon GeoJSON FeatureCollection.
pub fn feature_collection_payload(project_id: &str) -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "ProjId": project_id },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-122.45, 37.75],
                    [-122.40, 37.75],
                    [-122.40, 37.78],
                    [-122.45, 37.78],
                    [-122.45, 37.75],
                ]],
            },
        }],
    })
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}
