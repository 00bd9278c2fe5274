// Display shaping for result pages: car cards and the results heading

use crate::models::{AdvertStatus, FilterCriteria, Radius, SearchResultSet, VehicleListing};
use serde::Serialize;

fn thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_price(price: Option<u32>) -> String {
    match price {
        Some(p) => format!("£{}", thousands(p)),
        None => "POA".to_string(),
    }
}

pub fn format_mileage(mileage: u32) -> String {
    if mileage == 1 {
        "1 mile".to_string()
    } else {
        format!("{} miles", thousands(mileage))
    }
}

/// Engine size in litres. Values of 100 or more are taken to be cc.
pub fn format_engine_size(size: f64) -> Option<String> {
    if !size.is_finite() || size <= 0.0 {
        return None;
    }
    let litres = if size >= 100.0 { size / 1000.0 } else { size };
    Some(format!("{:.1}L", litres))
}

pub fn format_distance(miles: f64) -> String {
    if miles < 1.0 {
        "Less than a mile away".to_string()
    } else {
        format!("{:.1} miles away", miles)
    }
}

pub fn listing_title(listing: &VehicleListing) -> String {
    let year = listing.year.map(|y| y.to_string());
    [
        year.as_deref(),
        Some(listing.make.as_str()),
        Some(listing.model.as_str()),
        listing.variant.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Summary card for one listing in the results grid.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CarCard {
    pub id: String,
    pub title: String,
    pub price: String,
    pub mileage: Option<String>,
    pub year: Option<u32>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub engine: Option<String>,
    pub distance: Option<String>,
    pub image: Option<String>,
    pub badge: Option<&'static str>,
    pub saved: bool,
}

impl CarCard {
    pub fn from_listing(listing: &VehicleListing, saved: bool) -> Self {
        let badge = match listing.advert_status {
            AdvertStatus::Active => None,
            AdvertStatus::Draft => Some("Draft"),
            AdvertStatus::Sold => Some("Sold"),
            AdvertStatus::Expired => Some("Expired"),
        };
        Self {
            id: listing.id.clone(),
            title: listing_title(listing),
            price: format_price(listing.price),
            mileage: listing.mileage.map(format_mileage),
            year: listing.year,
            fuel_type: listing.fuel_type.clone(),
            transmission: listing.transmission.clone(),
            engine: listing.engine_size.and_then(format_engine_size),
            distance: listing.distance.filter(|d| !d.is_nan()).map(format_distance),
            image: listing.images.first().cloned(),
            badge,
            saved,
        }
    }

    // Template accessors; askama renders "" for an absent value this way

    pub fn image_url(&self) -> &str {
        self.image.as_deref().unwrap_or_default()
    }

    pub fn badge_label(&self) -> &str {
        self.badge.unwrap_or_default()
    }

    pub fn distance_label(&self) -> &str {
        self.distance.as_deref().unwrap_or_default()
    }

    /// Year, mileage, fuel, gearbox and engine chips, skipping unknowns.
    pub fn specs(&self) -> Vec<String> {
        let year = self.year.map(|y| y.to_string());
        [
            year,
            self.mileage.clone(),
            self.fuel_type.clone(),
            self.transmission.clone(),
            self.engine.clone(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect()
    }
}

/// Heading, notices and empty-state hints for a result set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultSummary {
    pub heading: String,
    pub notice: Option<String>,
    pub suggestions: Vec<String>,
}

impl ResultSummary {
    pub fn new(set: &SearchResultSet, criteria: &FilterCriteria) -> Self {
        let radius_search = match (set.postcode(), set.radius()) {
            (Some(postcode), Radius::Miles(miles)) => Some((postcode, miles)),
            _ => None,
        };

        let notice = match radius_search {
            Some((postcode, miles)) if set.showing_all_cars() => Some(format!(
                "No cars found within {} miles of {}. Showing all cars that match your filters instead.",
                miles, postcode
            )),
            _ => None,
        };

        if set.count() == 0 {
            let mut suggestions = Vec::new();
            if radius_search.is_some() {
                suggestions.push("Increase your search radius".to_string());
            }
            if criteria.has_constraints() {
                suggestions.push("Clear some of your filters".to_string());
            }
            return Self {
                heading: "No cars found".to_string(),
                notice,
                suggestions,
            };
        }

        let noun = if set.count() == 1 { "car" } else { "cars" };
        let heading = match radius_search {
            Some((postcode, miles)) if !set.showing_all_cars() => format!(
                "{} {} found within {} miles of {}",
                thousands(set.count() as u32),
                noun,
                miles,
                postcode
            ),
            _ => format!("{} {} found", thousands(set.count() as u32), noun),
        };
        Self {
            heading,
            notice,
            suggestions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_and_mileage_get_separators() {
        assert_eq!(format_price(Some(12_000)), "£12,000");
        assert_eq!(format_price(Some(999)), "£999");
        assert_eq!(format_price(Some(1_250_000)), "£1,250,000");
        assert_eq!(format_price(None), "POA");
        assert_eq!(format_mileage(45_000), "45,000 miles");
        assert_eq!(format_mileage(1), "1 mile");
    }

    #[test]
    fn engine_size_accepts_litres_or_cc() {
        assert_eq!(format_engine_size(1998.0).as_deref(), Some("2.0L"));
        assert_eq!(format_engine_size(1.6).as_deref(), Some("1.6L"));
        assert_eq!(format_engine_size(0.0), None);
    }

    #[test]
    fn card_from_listing() {
        let listing = VehicleListing {
            id: "42".into(),
            make: "Audi".into(),
            model: "A3".into(),
            variant: Some("S line".into()),
            year: Some(2019),
            price: Some(18_000),
            mileage: Some(32_500),
            engine_size: Some(1968.0),
            distance: Some(3.24),
            images: vec!["https://img.test/1.jpg".into(), "https://img.test/2.jpg".into()],
            advert_status: AdvertStatus::Sold,
            ..Default::default()
        };
        let card = CarCard::from_listing(&listing, true);
        assert_eq!(card.title, "2019 Audi A3 S line");
        assert_eq!(card.price, "£18,000");
        assert_eq!(card.mileage.as_deref(), Some("32,500 miles"));
        assert_eq!(card.engine.as_deref(), Some("2.0L"));
        assert_eq!(card.distance.as_deref(), Some("3.2 miles away"));
        assert_eq!(card.image.as_deref(), Some("https://img.test/1.jpg"));
        assert_eq!(card.badge, Some("Sold"));
        assert!(card.saved);
        assert_eq!(card.specs(), ["2019", "32,500 miles", "2.0L"]);
    }

    #[test]
    fn accessors_blank_for_missing_values() {
        let card = CarCard::from_listing(&VehicleListing::default(), false);
        assert_eq!(card.image_url(), "");
        assert_eq!(card.badge_label(), "");
        assert_eq!(card.distance_label(), "");
        assert!(card.specs().is_empty());
    }

    #[test]
    fn title_skips_missing_parts() {
        let listing = VehicleListing {
            make: "Ford".into(),
            model: "Fiesta".into(),
            ..Default::default()
        };
        assert_eq!(listing_title(&listing), "Ford Fiesta");
    }

    #[test]
    fn summary_for_radius_hits() {
        let set = SearchResultSet::new(
            Some("SW1A 1AA".into()),
            Radius::Miles(25),
            vec![VehicleListing::default(); 12],
            false,
        );
        let summary = ResultSummary::new(&set, &FilterCriteria::default());
        assert_eq!(summary.heading, "12 cars found within 25 miles of SW1A 1AA");
        assert_eq!(summary.notice, None);
    }

    #[test]
    fn summary_for_fallback_and_empty() {
        let criteria = FilterCriteria {
            make: Some("Audi".into()),
            ..Default::default()
        };
        let fallback = SearchResultSet::new(
            Some("SW1A 1AA".into()),
            Radius::Miles(25),
            vec![VehicleListing::default()],
            true,
        );
        let summary = ResultSummary::new(&fallback, &criteria);
        assert_eq!(summary.heading, "1 car found");
        assert!(summary.notice.unwrap().starts_with("No cars found within 25 miles of SW1A 1AA"));

        let empty = SearchResultSet::new(Some("SW1A 1AA".into()), Radius::Miles(25), vec![], true);
        let summary = ResultSummary::new(&empty, &criteria);
        assert_eq!(summary.heading, "No cars found");
        assert_eq!(
            summary.suggestions,
            ["Increase your search radius", "Clear some of your filters"]
        );
    }
}
