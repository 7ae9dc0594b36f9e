// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod error;
pub mod geocode;
pub mod gis;
pub mod housing;
pub mod mercator;
pub mod resolve;

pub use error::*;
pub use geocode::*;
pub use gis::*;
pub use housing::*;
pub use mercator::*;
pub use resolve::*;
