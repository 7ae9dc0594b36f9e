// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use hearth_app::{MercatorExtent, Viewport};
use std::f64::consts::FRAC_PI_2;

/// WGS84 equatorial radius in meters, the sphere radius of EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Spherical inverse Web Mercator projection: planar meters to geographic
/// degrees. Returns `(lat, lng)`.
pub fn mercator_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lng = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    (lat, lng)
}

/// Project an EPSG:3857 extent into a geographic viewport: `(xmin, ymin)`
/// becomes the southwest corner and `(xmax, ymax)` the northeast corner.
pub fn viewport_from_extent(extent: &MercatorExtent) -> Viewport {
    let (south, west) = mercator_to_lat_lng(extent.xmin, extent.ymin);
    let (north, east) = mercator_to_lat_lng(extent.xmax, extent.ymax);
    Viewport {
        north,
        south,
        east,
        west,
    }
}
