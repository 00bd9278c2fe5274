// Data structures shared by the search pipeline, the backend client and storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Lifecycle state of an advert as reported by the backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdvertStatus {
    Draft,
    #[default]
    Active,
    Sold,
    Expired,
}

// A single vehicle advertisement as returned by the marketplace backend
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VehicleListing {
    pub id: String,
    pub make: String,
    pub model: String,
    #[serde(default, alias = "submodel")]
    pub variant: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub mileage: Option<u32>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub transmission: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default, alias = "color")]
    pub colour: Option<String>,
    #[serde(default)]
    pub doors: Option<u32>,
    #[serde(default)]
    pub seats: Option<u32>,
    #[serde(default)]
    pub engine_size: Option<f64>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    // Only populated by postcode-anchored searches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default)]
    pub advert_status: AdvertStatus,
}

// Ordering applied to a result set before display
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    #[default]
    Relevance,
    Distance,
    PriceLow,
    PriceHigh,
    MileageLow,
    YearNew,
}

impl SortBy {
    pub const ALL: [SortBy; 6] = [
        SortBy::Relevance,
        SortBy::Distance,
        SortBy::PriceLow,
        SortBy::PriceHigh,
        SortBy::MileageLow,
        SortBy::YearNew,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::Distance => "distance",
            SortBy::PriceLow => "price-low",
            SortBy::PriceHigh => "price-high",
            SortBy::MileageLow => "mileage-low",
            SortBy::YearNew => "year-new",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortBy::Relevance => "Relevance",
            SortBy::Distance => "Distance",
            SortBy::PriceLow => "Price (lowest)",
            SortBy::PriceHigh => "Price (highest)",
            SortBy::MileageLow => "Mileage (lowest)",
            SortBy::YearNew => "Age (newest first)",
        }
    }
}

// Search radius around a postcode. `National` means no radius at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radius {
    #[default]
    National,
    Miles(u32),
}

impl fmt::Display for Radius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Radius::National => f.write_str("national"),
            Radius::Miles(m) => write!(f, "{}", m),
        }
    }
}

// Stored and sent as the same string used in URLs ("national" or a mile count)
impl Serialize for Radius {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Radius {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(m) => Ok(Radius::Miles(m)),
            Raw::Text(s) if s == "national" || s.is_empty() => Ok(Radius::National),
            Raw::Text(s) => s
                .parse()
                .map(Radius::Miles)
                .map_err(|_| serde::de::Error::custom(format!("invalid radius `{}`", s))),
        }
    }
}

// Values the filter UIs use for "no constraint"
pub const WILDCARDS: [&str; 3] = ["", "Any", "All"];

pub fn is_wildcard(value: &str) -> bool {
    WILDCARDS.contains(&value)
}

// User-chosen constraints narrowing a listing set. `None` means no constraint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub make: Option<String>,
    pub model: Option<String>,
    pub submodel: Option<String>,
    pub colour: Option<String>,
    pub body_type: Option<String>,
    pub doors: Option<u32>,
    pub seats: Option<u32>,
    pub gearbox: Option<String>,
    pub fuel_type: Option<String>,
    pub price_from: Option<u32>,
    pub price_to: Option<u32>,
    pub year_from: Option<u32>,
    pub year_to: Option<u32>,
    pub mileage_from: Option<u32>,
    pub mileage_to: Option<u32>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub radius: Radius,
}

impl FilterCriteria {
    /// True when at least one attribute constraint is set. Sort order and
    /// radius are not attribute constraints.
    pub fn has_constraints(&self) -> bool {
        self.make.is_some()
            || self.model.is_some()
            || self.submodel.is_some()
            || self.colour.is_some()
            || self.body_type.is_some()
            || self.doors.is_some()
            || self.seats.is_some()
            || self.gearbox.is_some()
            || self.fuel_type.is_some()
            || self.price_from.is_some()
            || self.price_to.is_some()
            || self.year_from.is_some()
            || self.year_to.is_some()
            || self.mileage_from.is_some()
            || self.mileage_to.is_some()
    }

    /// Text constraints trimmed, with wildcard values dropped. Decoded
    /// criteria are always in this form.
    pub fn normalized(&self) -> Self {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !is_wildcard(v))
                .map(str::to_string)
        };
        Self {
            make: text(&self.make),
            model: text(&self.model),
            submodel: text(&self.submodel),
            colour: text(&self.colour),
            body_type: text(&self.body_type),
            gearbox: text(&self.gearbox),
            fuel_type: text(&self.fuel_type),
            ..self.clone()
        }
    }
}

// Everything a search results URL carries
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub postcode: Option<String>,
    #[serde(flatten)]
    pub criteria: FilterCriteria,
    // Which sidebar section was expanded; carried in URLs only
    pub open_filter: Option<String>,
}

// Outcome of one search cycle, ready for sorting and display
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    postcode: Option<String>,
    radius: Radius,
    results: Vec<VehicleListing>,
    count: usize,
    showing_all_cars: bool,
}

impl SearchResultSet {
    pub fn new(
        postcode: Option<String>,
        radius: Radius,
        results: Vec<VehicleListing>,
        showing_all_cars: bool,
    ) -> Self {
        let count = results.len();
        Self {
            postcode,
            radius,
            results,
            count,
            showing_all_cars,
        }
    }

    pub fn postcode(&self) -> Option<&str> {
        self.postcode.as_deref()
    }

    pub fn radius(&self) -> Radius {
        self.radius
    }

    pub fn results(&self) -> &[VehicleListing] {
        &self.results
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn showing_all_cars(&self) -> bool {
        self.showing_all_cars
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct YearRange {
    pub min: u32,
    pub max: u32,
}

// Valid values for the filter sidebar, from GET /vehicles/filter-options
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    #[serde(default)]
    pub makes: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub fuel_types: Vec<String>,
    #[serde(default)]
    pub transmissions: Vec<String>,
    #[serde(default)]
    pub body_types: Vec<String>,
    #[serde(default)]
    pub colours: Vec<String>,
    #[serde(default)]
    pub year_range: YearRange,
}

// Timestamped snapshot appended by "save this search"
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub postcode: Option<String>,
    pub radius: Radius,
    pub filters: FilterCriteria,
    pub date: DateTime<Utc>,
}

// --- Backend wire formats ---

// GET /vehicles/search
#[derive(Debug, Deserialize)]
pub struct VehicleSearchResponse {
    #[serde(default)]
    pub cars: Vec<VehicleListing>,
    #[serde(default)]
    pub total: usize,
}

// GET /postcode/search
#[derive(Debug, Deserialize)]
pub struct PostcodeSearchResponse {
    pub postcode: String,
    #[serde(default)]
    pub results: Vec<VehicleListing>,
}
