// CSV export of a search result set

use crate::models::{AdvertStatus, SearchResultSet, VehicleListing};
use anyhow::{Context, Result};
use serde::Serialize;

// One flat row per listing; csv cannot serialize nested sequences
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingRow<'a> {
    id: &'a str,
    make: &'a str,
    model: &'a str,
    variant: Option<&'a str>,
    year: Option<u32>,
    price: Option<u32>,
    mileage: Option<u32>,
    fuel_type: Option<&'a str>,
    transmission: Option<&'a str>,
    body_type: Option<&'a str>,
    colour: Option<&'a str>,
    doors: Option<u32>,
    seats: Option<u32>,
    engine_size: Option<f64>,
    postcode: Option<&'a str>,
    distance: Option<f64>,
    advert_status: AdvertStatus,
    image: Option<&'a str>,
}

impl<'a> From<&'a VehicleListing> for ListingRow<'a> {
    fn from(l: &'a VehicleListing) -> Self {
        Self {
            id: &l.id,
            make: &l.make,
            model: &l.model,
            variant: l.variant.as_deref(),
            year: l.year,
            price: l.price,
            mileage: l.mileage,
            fuel_type: l.fuel_type.as_deref(),
            transmission: l.transmission.as_deref(),
            body_type: l.body_type.as_deref(),
            colour: l.colour.as_deref(),
            doors: l.doors,
            seats: l.seats,
            engine_size: l.engine_size,
            postcode: l.postcode.as_deref(),
            distance: l.distance,
            advert_status: l.advert_status,
            image: l.images.first().map(String::as_str),
        }
    }
}

// Column names of ListingRow, written up front so an empty export still has them
const HEADER: [&str; 18] = [
    "id",
    "make",
    "model",
    "variant",
    "year",
    "price",
    "mileage",
    "fuelType",
    "transmission",
    "bodyType",
    "colour",
    "doors",
    "seats",
    "engineSize",
    "postcode",
    "distance",
    "advertStatus",
    "image",
];

pub fn results_to_csv(set: &SearchResultSet) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(HEADER)
        .context("Failed to write CSV header")?;
    for listing in set.results() {
        writer
            .serialize(ListingRow::from(listing))
            .with_context(|| format!("Failed to write CSV row for listing {}", listing.id))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    tracing::debug!(rows = set.count(), bytes = bytes.len(), "Exported results to CSV");
    Ok(bytes)
}
