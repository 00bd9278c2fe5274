// Attribute filtering of listing sets against FilterCriteria

use crate::models::{FilterCriteria, VehicleListing};

fn eq_text(constraint: &Option<String>, value: &Option<String>) -> bool {
    match constraint {
        None => true,
        Some(wanted) => value.as_deref() == Some(wanted.as_str()),
    }
}

fn eq_number(constraint: Option<u32>, value: Option<u32>) -> bool {
    match constraint {
        None => true,
        Some(wanted) => value == Some(wanted),
    }
}

// A listing without the attribute fails any bound that is set
fn in_range(from: Option<u32>, to: Option<u32>, value: Option<u32>) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    from.is_none_or(|f| v >= f) && to.is_none_or(|t| v <= t)
}

/// Returns true when `listing` satisfies every constraint set in `criteria`.
///
/// String comparisons are exact and case-sensitive. Sort order and radius do
/// not take part in attribute filtering.
pub fn matches(listing: &VehicleListing, criteria: &FilterCriteria) -> bool {
    criteria
        .make
        .as_ref()
        .is_none_or(|make| listing.make == *make)
        && criteria
            .model
            .as_ref()
            .is_none_or(|model| listing.model == *model)
        && eq_text(&criteria.submodel, &listing.variant)
        && eq_text(&criteria.colour, &listing.colour)
        && eq_text(&criteria.body_type, &listing.body_type)
        && eq_text(&criteria.gearbox, &listing.transmission)
        && eq_text(&criteria.fuel_type, &listing.fuel_type)
        && eq_number(criteria.doors, listing.doors)
        && eq_number(criteria.seats, listing.seats)
        && in_range(criteria.price_from, criteria.price_to, listing.price)
        && in_range(criteria.year_from, criteria.year_to, listing.year)
        && in_range(criteria.mileage_from, criteria.mileage_to, listing.mileage)
}

/// Keeps the listings that satisfy all constraints, preserving input order.
/// Always returns a fresh vector, even when nothing is filtered out.
pub fn evaluate(listings: &[VehicleListing], criteria: &FilterCriteria) -> Vec<VehicleListing> {
    if !criteria.has_constraints() {
        return listings.to_vec();
    }
    let filtered: Vec<VehicleListing> = listings
        .iter()
        .filter(|listing| matches(listing, criteria))
        .cloned()
        .collect();
    tracing::debug!(
        input = listings.len(),
        output = filtered.len(),
        "Applied attribute filters"
    );
    filtered
}
