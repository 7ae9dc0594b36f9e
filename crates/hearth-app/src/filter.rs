// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::model::{Listing, ListingScope};

/// Parse an upstream due-date string. The API emits RFC 3339 datetimes but
/// bare dates appear in older records; anything else is treated as
/// "unscheduled" rather than an error.
pub fn parse_due_date(raw: &str) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed);
    }
    time::Date::parse(trimmed, &format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn due_date(listing: &Listing) -> Option<OffsetDateTime> {
    listing
        .application_due_date
        .as_deref()
        .and_then(parse_due_date)
}

/// Total order over listings: most recent due date first, unscheduled (or
/// unparseable) last. Undated pairs compare equal so a stable sort keeps
/// their input order.
pub fn compare_due_dates(a: &Listing, b: &Listing) -> Ordering {
    match (due_date(a), due_date(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a_due), Some(b_due)) => b_due.cmp(&a_due),
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| value.to_lowercase().contains(needle))
}

fn matches_term(listing: &Listing, term: &str, needle: &str) -> bool {
    // Exact id match is an operator escape hatch and bypasses every other
    // predicate. Case-sensitive on purpose.
    if listing.id.as_str() == term {
        return true;
    }
    listing.name.to_lowercase().contains(needle)
        || contains_ci(listing.tenure.as_deref(), needle)
        || contains_ci(listing.status.as_deref(), needle)
        || contains_ci(listing.listing_type.as_deref(), needle)
        || contains_ci(listing.record_type_name(), needle)
}

/// Narrow by scope, then by search term, then order by due date. Pure and
/// deterministic; filtering an already-filtered result with the same
/// arguments is a no-op.
pub fn filter_listings(listings: &[Listing], term: &str, scope: ListingScope) -> Vec<Listing> {
    let mut narrowed: Vec<Listing> = if term.is_empty() {
        listings
            .iter()
            .filter(|listing| scope.admits(listing))
            .cloned()
            .collect()
    } else {
        let needle = term.to_lowercase();
        listings
            .iter()
            .filter(|listing| scope.admits(listing))
            .filter(|listing| matches_term(listing, term, &needle))
            .cloned()
            .collect()
    };
    narrowed.sort_by(compare_due_dates);
    narrowed
}

/// The finder status line.
pub fn results_text(
    filtered_count: usize,
    loading: bool,
    error: Option<&str>,
    term: &str,
    scope: ListingScope,
) -> String {
    if loading {
        return "Loading listings...".to_owned();
    }
    if error.is_some() {
        return "Error loading listings".to_owned();
    }

    let scoped = scope != ListingScope::All;
    if filtered_count == 0 {
        return if !term.is_empty() && scoped {
            format!("No listings match {term:?} with filter: {}", scope.as_str())
        } else if !term.is_empty() {
            format!("No listings match {term:?}")
        } else if scoped {
            format!("No {} listings found", scope.as_str())
        } else {
            "No listings found".to_owned()
        };
    }

    if !term.is_empty() && scoped {
        format!("{filtered_count} {} listings match {term:?}", scope.as_str())
    } else if !term.is_empty() {
        format!("{filtered_count} listings match {term:?}")
    } else if scoped {
        format!("{filtered_count} {} listings", scope.as_str())
    } else {
        format!("{filtered_count} listings")
    }
}
