// Result ordering. All sorts are stable and listings missing the sort key go last.

use crate::models::{SortBy, VehicleListing};
use std::cmp::Ordering;

fn distance_key(listing: &VehicleListing) -> Option<f64> {
    listing.distance.filter(|d| !d.is_nan())
}

// Ascending on present keys, missing keys after every present one
fn missing_last<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn by_distance(a: &VehicleListing, b: &VehicleListing) -> Ordering {
    missing_last(distance_key(a), distance_key(b), |x, y| x.total_cmp(&y))
}

fn by_price_low(a: &VehicleListing, b: &VehicleListing) -> Ordering {
    missing_last(a.price, b.price, |x, y| x.cmp(&y))
}

fn by_price_high(a: &VehicleListing, b: &VehicleListing) -> Ordering {
    missing_last(a.price, b.price, |x, y| y.cmp(&x))
}

fn by_mileage_low(a: &VehicleListing, b: &VehicleListing) -> Ordering {
    missing_last(a.mileage, b.mileage, |x, y| x.cmp(&y))
}

fn by_year_new(a: &VehicleListing, b: &VehicleListing) -> Ordering {
    missing_last(a.year, b.year, |x, y| y.cmp(&x))
}

type Comparator = fn(&VehicleListing, &VehicleListing) -> Ordering;

/// Comparator for `sort_by`; `None` for relevance, which keeps backend order.
fn comparator(sort_by: SortBy) -> Option<Comparator> {
    match sort_by {
        SortBy::Relevance => None,
        SortBy::Distance => Some(by_distance as Comparator),
        SortBy::PriceLow => Some(by_price_low as Comparator),
        SortBy::PriceHigh => Some(by_price_high as Comparator),
        SortBy::MileageLow => Some(by_mileage_low as Comparator),
        SortBy::YearNew => Some(by_year_new as Comparator),
    }
}

pub fn sort_in_place(results: &mut [VehicleListing], sort_by: SortBy) {
    if let Some(cmp) = comparator(sort_by) {
        // slice::sort_by is stable
        results.sort_by(cmp);
    }
}

/// Returns a newly ordered copy of `results`.
#[cfg(test)]
pub fn sort_listings(results: &[VehicleListing], sort_by: SortBy) -> Vec<VehicleListing> {
    let mut sorted = results.to_vec();
    sort_in_place(&mut sorted, sort_by);
    sorted
}
