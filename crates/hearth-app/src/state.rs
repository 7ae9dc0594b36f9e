// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::ListingId;
use crate::model::Listing;

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Repair the selected listing id against the full list and then the
/// filtered view, in that order. Both tiers must run on every change to
/// either input:
///
/// - empty full list clears the selection;
/// - a selection that is absent from the full list (or was never made)
///   resets to the first full-list element;
/// - an empty filtered view clears the selection ("nothing matches" is
///   distinct from "nothing selected yet");
/// - a selection absent from a non-empty filtered view resets to the first
///   filtered element.
///
/// Returns the repaired id; callers compare against the current value to
/// avoid redundant reassignment.
pub fn reconcile_selection(
    selected: Option<&ListingId>,
    full: &[Listing],
    filtered: &[Listing],
) -> Option<ListingId> {
    if full.is_empty() {
        return None;
    }

    let mut current = selected.cloned();
    let in_full = current
        .as_ref()
        .is_some_and(|id| full.iter().any(|listing| &listing.id == id));
    if !in_full {
        current = Some(full[0].id.clone());
    }

    if filtered.is_empty() {
        return None;
    }
    let in_filtered = current
        .as_ref()
        .is_some_and(|id| filtered.iter().any(|listing| &listing.id == id));
    if !in_filtered {
        current = Some(filtered[0].id.clone());
    }

    current
}

/// Directional and paging keys the finder list understands. Any other key
/// is left unhandled so the caller's default behavior proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Down,
    Up,
    PageDown,
    PageUp,
    Home,
    End,
}

/// Map a key press to a new selection index over the filtered list.
/// `current` is the position of the selected listing in that list, or
/// `None` when the selection is absent (treated as index -1). Returns
/// `None` when nothing should change: empty list, or already clamped at
/// the boundary the key moves toward.
pub fn navigate(
    key: NavKey,
    len: usize,
    current: Option<usize>,
    page_size: usize,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let last = (len - 1) as isize;
    let index = current.map_or(-1, |value| value.min(len - 1) as isize);
    let page = page_size.max(1) as isize;

    let target = match key {
        NavKey::Down => index + 1,
        NavKey::Up => index - 1,
        NavKey::PageDown => index + page,
        NavKey::PageUp => index - page,
        NavKey::Home => 0,
        NavKey::End => last,
    };

    let clamped = target.clamp(0, last);
    if clamped == index {
        None
    } else {
        Some(clamped as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PAGE_SIZE, NavKey, navigate, reconcile_selection};
    use crate::ids::ListingId;
    use crate::model::Listing;

    fn listing(id: &str) -> Listing {
        Listing {
            id: ListingId::new(id),
            name: format!("Listing {id}"),
            listing_type: None,
            tenure: None,
            status: None,
            units_available: None,
            application_due_date: None,
            record_type: None,
            project_id: None,
            building_name: None,
            building_street_address: None,
            building_city: None,
            building_state: None,
            building_zip_code: None,
            lottery_status: None,
            accepting_online_applications: None,
        }
    }

    fn listings(ids: &[&str]) -> Vec<Listing> {
        ids.iter().map(|id| listing(id)).collect()
    }

    #[test]
    fn empty_full_list_clears_selection() {
        let selected = ListingId::new("a");
        assert_eq!(reconcile_selection(Some(&selected), &[], &[]), None);
        assert_eq!(reconcile_selection(None, &[], &[]), None);
    }

    #[test]
    fn missing_selection_resets_to_first_full_element() {
        let full = listings(&["a", "b", "c"]);
        let got = reconcile_selection(None, &full, &full);
        assert_eq!(got, Some(ListingId::new("a")));

        let stale = ListingId::new("gone");
        let got = reconcile_selection(Some(&stale), &full, &full);
        assert_eq!(got, Some(ListingId::new("a")));
    }

    #[test]
    fn empty_filtered_view_clears_selection() {
        let full = listings(&["a", "b"]);
        let selected = ListingId::new("a");
        assert_eq!(reconcile_selection(Some(&selected), &full, &[]), None);
    }

    #[test]
    fn selection_outside_filtered_view_resets_to_first_filtered() {
        let full = listings(&["a", "b", "c"]);
        let filtered = listings(&["b", "c"]);
        let selected = ListingId::new("a");
        let got = reconcile_selection(Some(&selected), &full, &filtered);
        assert_eq!(got, Some(ListingId::new("b")));
    }

    #[test]
    fn valid_selection_is_left_untouched() {
        let full = listings(&["a", "b", "c"]);
        let filtered = listings(&["b", "c"]);
        let selected = ListingId::new("c");
        let got = reconcile_selection(Some(&selected), &full, &filtered);
        assert_eq!(got, Some(selected));
    }

    #[test]
    fn both_tiers_run_in_order() {
        // Selection fell out of the full list AND the full-list first element
        // is filtered out: tier one resets to "a", tier two repairs to "b".
        let full = listings(&["a", "b", "c"]);
        let filtered = listings(&["b"]);
        let stale = ListingId::new("gone");
        let got = reconcile_selection(Some(&stale), &full, &filtered);
        assert_eq!(got, Some(ListingId::new("b")));
    }

    #[test]
    fn arrow_down_clamps_at_end() {
        assert_eq!(navigate(NavKey::Down, 3, Some(0), DEFAULT_PAGE_SIZE), Some(1));
        assert_eq!(navigate(NavKey::Down, 3, Some(2), DEFAULT_PAGE_SIZE), None);
    }

    #[test]
    fn arrow_up_clamps_at_start() {
        assert_eq!(navigate(NavKey::Up, 3, Some(2), DEFAULT_PAGE_SIZE), Some(1));
        assert_eq!(navigate(NavKey::Up, 3, Some(0), DEFAULT_PAGE_SIZE), None);
    }

    #[test]
    fn paging_never_overshoots() {
        for page_size in [1, 2, 5, 100] {
            let got = navigate(NavKey::PageDown, 4, Some(1), page_size);
            assert!(got.is_none_or(|index| index <= 3), "page {page_size}");
        }
        assert_eq!(navigate(NavKey::PageDown, 10, Some(2), 5), Some(7));
        assert_eq!(navigate(NavKey::PageDown, 10, Some(8), 5), Some(9));
        assert_eq!(navigate(NavKey::PageUp, 10, Some(7), 5), Some(2));
        assert_eq!(navigate(NavKey::PageUp, 10, Some(3), 5), Some(0));
    }

    #[test]
    fn home_then_end_visits_both_endpoints() {
        let len = 6;
        let home = navigate(NavKey::Home, len, Some(3), DEFAULT_PAGE_SIZE);
        assert_eq!(home, Some(0));
        let end = navigate(NavKey::End, len, home, DEFAULT_PAGE_SIZE);
        assert_eq!(end, Some(len - 1));
    }

    #[test]
    fn absent_selection_is_treated_as_index_before_start() {
        assert_eq!(navigate(NavKey::Down, 3, None, DEFAULT_PAGE_SIZE), Some(0));
        assert_eq!(navigate(NavKey::Up, 3, None, DEFAULT_PAGE_SIZE), Some(0));
        assert_eq!(navigate(NavKey::End, 3, None, DEFAULT_PAGE_SIZE), Some(2));
    }

    #[test]
    fn empty_list_is_a_no_op_for_every_key() {
        for key in [
            NavKey::Down,
            NavKey::Up,
            NavKey::PageDown,
            NavKey::PageUp,
            NavKey::Home,
            NavKey::End,
        ] {
            assert_eq!(navigate(key, 0, None, DEFAULT_PAGE_SIZE), None);
        }
    }

    #[test]
    fn page_size_zero_falls_back_to_single_step() {
        assert_eq!(navigate(NavKey::PageDown, 5, Some(1), 0), Some(2));
    }
}
