// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use hearth_client::{GeocodeClient, GisClient, HousingClient};
use hearth_proxy::{
    GEOMETRY_CACHE_CONTROL, MAP_IMAGE_CACHE_CONTROL, ProxyContext, dispatch,
};
use hearth_store::Store;
use hearth_testkit::{
    ListingFaker, feature_collection_payload, geocode_payload, gis_data_payload,
    listings_payload, lottery_buckets_payload,
};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const DEAD_UPSTREAM: &str = "http://127.0.0.1:1";

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid content type header")
}

fn spawn_json_responses(server: Server, bodies: Vec<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for body in bodies {
            let request = server.recv().expect("request expected");
            let response = Response::from_string(body)
                .with_status_code(200)
                .with_header(json_header());
            request.respond(response).expect("response should succeed");
        }
    })
}

fn mock_server() -> Result<(Server, String)> {
    let server = Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock: {error}"))?;
    let base = format!("http://{}", server.server_addr());
    Ok((server, base))
}

/// Context with every upstream pointed at an unreachable address; individual
/// tests override the client they exercise.
fn dead_context() -> Result<ProxyContext> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(ProxyContext::new(
        HousingClient::new(DEAD_UPSTREAM, Duration::from_millis(100))?,
        GisClient::new(&format!("{DEAD_UPSTREAM}/query"), Duration::from_millis(100))?,
        GeocodeClient::with_endpoints(
            &format!("{DEAD_UPSTREAM}/geocode"),
            &format!("{DEAD_UPSTREAM}/staticmap"),
            "test-key",
            Duration::from_millis(100),
        )?,
        store,
    ))
}

#[test]
fn listings_round_trip_and_cache_fallback() -> Result<()> {
    let (server, base) = mock_server()?;
    let mut faker = ListingFaker::new(5);
    let payload = listings_payload(&faker.listings(4));
    let handle = spawn_json_responses(server, vec![payload.to_string()]);

    let mut ctx = dead_context()?;
    ctx.housing = HousingClient::new(&base, Duration::from_secs(1))?;

    // First hit reaches the upstream and populates the cache.
    let first = dispatch(&ctx, "GET", "/listings", None, &[]);
    assert_eq!(first.status, 200);
    let decoded = first.body_json().expect("json body");
    assert_eq!(decoded, payload);
    handle.join().expect("server thread should join");

    // Upstream is now gone; the cached payload is served silently.
    ctx.housing = HousingClient::new(DEAD_UPSTREAM, Duration::from_millis(100))?;
    let second = dispatch(&ctx, "GET", "/listings", None, &[]);
    assert_eq!(second.status, 200);
    assert_eq!(second.body_json().expect("json body"), decoded);
    Ok(())
}

#[test]
fn listings_error_propagates_when_cache_is_empty() -> Result<()> {
    let ctx = dead_context()?;
    let response = dispatch(&ctx, "GET", "/listings", None, &[]);
    assert_eq!(response.status, 502);
    let body = response.body_json().expect("json body");
    assert!(body.get("error").is_some());
    assert!(body.get("listings").is_none());
    Ok(())
}

#[test]
fn preferences_normalize_and_map_format_errors_to_502() -> Result<()> {
    let (server, base) = mock_server()?;
    let handle = spawn_json_responses(
        server,
        vec![
            lottery_buckets_payload(Some(&["NRHP"])).to_string(),
            lottery_buckets_payload(None).to_string(),
        ],
    );

    let mut ctx = dead_context()?;
    ctx.housing = HousingClient::new(&base, Duration::from_secs(1))?;

    let ok = dispatch(&ctx, "GET", "/preferences/a0W1", None, &[]);
    assert_eq!(ok.status, 200);
    let body = ok.body_json().expect("json body");
    assert_eq!(body["preferences"][0]["preferenceShortCode"], "NRHP");

    let malformed = dispatch(&ctx, "GET", "/preferences/a0W1", None, &[]);
    assert_eq!(malformed.status, 502);
    let body = malformed.body_json().expect("json body");
    assert!(body.get("preferences").is_none());
    assert!(body.get("error").is_some());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn preferences_require_a_listing_id() -> Result<()> {
    let ctx = dead_context()?;
    let response = dispatch(&ctx, "GET", "/preferences/", None, &[]);
    assert_eq!(response.status, 400);
    Ok(())
}

#[test]
fn geometry_serves_upstream_then_cache() -> Result<()> {
    let (server, base) = mock_server()?;
    let payload = feature_collection_payload("2016-023");
    // Only one upstream response: the second request must come from cache.
    let handle = spawn_json_responses(server, vec![payload.to_string()]);

    let mut ctx = dead_context()?;
    ctx.gis = GisClient::new(&format!("{base}/query"), Duration::from_secs(1))?;

    let first = dispatch(&ctx, "GET", "/nrhp-geometry/2016-023", None, &[]);
    assert_eq!(first.status, 200);
    assert_eq!(first.cache_control, Some(GEOMETRY_CACHE_CONTROL));
    assert_eq!(first.body_json().expect("json")["type"], "FeatureCollection");
    handle.join().expect("server thread should join");

    ctx.gis = GisClient::new(&format!("{DEAD_UPSTREAM}/query"), Duration::from_millis(100))?;
    let second = dispatch(&ctx, "GET", "/nrhp-geometry/2016-023", None, &[]);
    assert_eq!(second.status, 200);
    assert_eq!(second.body_json().expect("json")["type"], "FeatureCollection");
    Ok(())
}

#[test]
fn geometry_upstream_failure_is_502_without_cache() -> Result<()> {
    let ctx = dead_context()?;
    let response = dispatch(&ctx, "GET", "/nrhp-geometry/2016-023", None, &[]);
    assert_eq!(response.status, 502);
    assert!(response.body_json().expect("json").get("message").is_some());
    Ok(())
}

#[test]
fn check_address_returns_match_and_fallback_viewport() -> Result<()> {
    let (server, base) = mock_server()?;
    let handle = spawn_json_responses(
        server,
        vec![
            gis_data_payload(
                Some(true),
                Some((-13_630_000.0, 4_540_000.0, -13_620_000.0, 4_550_000.0)),
            )
            .to_string(),
        ],
    );

    let mut ctx = dead_context()?;
    ctx.housing = HousingClient::new(&base, Duration::from_secs(1))?;
    // Geocoder stays dead: the viewport must come from the extent fallback
    // and the failure must not surface.

    let body = serde_json::json!({
        "address": {
            "address1": "123 Valencia St",
            "city": "San Francisco",
            "state": "CA",
            "zip": "94103",
        },
        "listing": { "Id": "a0W1", "Name": "Sunset Commons", "Project_ID": "2016-023" },
    });
    let response = dispatch(
        &ctx,
        "POST",
        "/check-address",
        None,
        body.to_string().as_bytes(),
    );
    assert_eq!(response.status, 200);
    let decoded = response.body_json().expect("json body");
    assert_eq!(decoded["isMatch"], true);
    assert!(decoded["message"].as_str().expect("message").contains("within"));
    assert!(decoded.get("lat").is_none());
    assert!(decoded["viewport"]["north"].as_f64().is_some());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn check_address_rejects_malformed_bodies() -> Result<()> {
    let ctx = dead_context()?;

    let response = dispatch(&ctx, "POST", "/check-address", None, b"not json");
    assert_eq!(response.status, 400);

    let missing_zip = serde_json::json!({
        "address": { "address1": "1 Main", "city": "SF", "state": "CA", "zip": "" },
        "listing": { "Id": "a0W1", "Name": "Sunset Commons" },
    });
    let response = dispatch(
        &ctx,
        "POST",
        "/check-address",
        None,
        missing_zip.to_string().as_bytes(),
    );
    assert_eq!(response.status, 400);
    Ok(())
}

#[test]
fn check_address_upstream_failure_is_500() -> Result<()> {
    let ctx = dead_context()?;
    let body = serde_json::json!({
        "address": {
            "address1": "123 Valencia St",
            "city": "San Francisco",
            "state": "CA",
            "zip": "94103",
        },
        "listing": { "Id": "a0W1", "Name": "Sunset Commons" },
    });
    let response = dispatch(
        &ctx,
        "POST",
        "/check-address",
        None,
        body.to_string().as_bytes(),
    );
    assert_eq!(response.status, 500);
    Ok(())
}

#[test]
fn geocode_maps_statuses_per_failure_kind() -> Result<()> {
    let (server, base) = mock_server()?;
    let handle = spawn_json_responses(
        server,
        vec![geocode_payload(37.76, -122.42, 0.01).to_string()],
    );

    let mut ctx = dead_context()?;
    ctx.geocoder = GeocodeClient::with_endpoints(
        &format!("{base}/geocode"),
        &format!("{base}/staticmap"),
        "test-key",
        Duration::from_secs(1),
    )?;

    let body = serde_json::json!({
        "address": {
            "address1": "123 Valencia St",
            "city": "San Francisco",
            "state": "CA",
            "zip": "94103",
        },
    });
    let ok = dispatch(&ctx, "POST", "/geocode", None, body.to_string().as_bytes());
    assert_eq!(ok.status, 200);
    assert_eq!(ok.body_json().expect("json")["lat"], 37.76);
    handle.join().expect("server thread should join");

    // Transport failure -> 502.
    ctx.geocoder = GeocodeClient::with_endpoints(
        &format!("{DEAD_UPSTREAM}/geocode"),
        &format!("{DEAD_UPSTREAM}/staticmap"),
        "test-key",
        Duration::from_millis(100),
    )?;
    let unavailable = dispatch(&ctx, "POST", "/geocode", None, body.to_string().as_bytes());
    assert_eq!(unavailable.status, 502);

    // Missing key -> 500.
    ctx.geocoder = GeocodeClient::with_endpoints(
        &format!("{DEAD_UPSTREAM}/geocode"),
        &format!("{DEAD_UPSTREAM}/staticmap"),
        "",
        Duration::from_millis(100),
    )?;
    let unconfigured = dispatch(&ctx, "POST", "/geocode", None, body.to_string().as_bytes());
    assert_eq!(unconfigured.status, 500);

    // Malformed body -> 400.
    let malformed = dispatch(&ctx, "POST", "/geocode", None, b"{}");
    assert_eq!(malformed.status, 400);
    Ok(())
}

#[test]
fn map_image_requires_an_address_and_sets_cache_headers() -> Result<()> {
    let (server, base) = mock_server()?;
    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        let response = Response::from_data(vec![0x89, 0x50, 0x4E, 0x47])
            .with_status_code(200)
            .with_header(
                Header::from_bytes("Content-Type", "image/png").expect("valid header"),
            );
        request.respond(response).expect("response should succeed");
    });

    let mut ctx = dead_context()?;
    ctx.geocoder = GeocodeClient::with_endpoints(
        &format!("{base}/geocode"),
        &format!("{base}/staticmap"),
        "test-key",
        Duration::from_secs(1),
    )?;

    let missing = dispatch(&ctx, "GET", "/map-image", None, &[]);
    assert_eq!(missing.status, 400);

    let ok = dispatch(
        &ctx,
        "GET",
        "/map-image",
        Some("address=123%20Valencia%20St%2C%20SF"),
        &[],
    );
    assert_eq!(ok.status, 200);
    assert_eq!(ok.content_type, "image/png");
    assert_eq!(ok.cache_control, Some(MAP_IMAGE_CACHE_CONTROL));
    assert_eq!(ok.body, vec![0x89, 0x50, 0x4E, 0x47]);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn map_image_without_key_is_500() -> Result<()> {
    let mut ctx = dead_context()?;
    ctx.geocoder = GeocodeClient::with_endpoints(
        &format!("{DEAD_UPSTREAM}/geocode"),
        &format!("{DEAD_UPSTREAM}/staticmap"),
        "",
        Duration::from_millis(100),
    )?;
    let response = dispatch(&ctx, "GET", "/map-image", Some("address=1%20Main"), &[]);
    assert_eq!(response.status, 500);
    Ok(())
}

#[test]
fn unknown_routes_are_404() -> Result<()> {
    let ctx = dead_context()?;
    let response = dispatch(&ctx, "GET", "/nope", None, &[]);
    assert_eq!(response.status, 404);
    let response = dispatch(&ctx, "DELETE", "/listings", None, &[]);
    assert_eq!(response.status, 404);
    Ok(())
}
