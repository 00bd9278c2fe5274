// Mapping between SearchQuery and the query string of a search results URL.
// Decoding is also where user input is validated: nothing past this point
// sees raw strings.

use crate::models::{is_wildcard, FilterCriteria, Radius, SearchQuery, SortBy};
use serde::Serialize;
use std::fmt;
use url::form_urlencoded;

const NATIONAL: &str = "national";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every invalid parameter of one query, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message recorded for `field`, for inline display next to the input.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "invalid search input ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !is_wildcard(v))
        .map(str::to_string)
}

// Prices and mileages are often typed as "£12,000" or "45 000"
fn money_like(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '£' | ',') && !c.is_whitespace())
        .collect()
}

fn number(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    lenient: bool,
) -> Option<u32> {
    let raw = value.map(str::trim).filter(|v| !is_wildcard(v))?;
    let cleaned = if lenient { money_like(raw) } else { raw.to_string() };
    match cleaned.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            errors.push(field, format!("`{}` is not a whole number", raw));
            None
        }
    }
}

fn check_range(
    errors: &mut ValidationErrors,
    to_field: &str,
    from: Option<u32>,
    to: Option<u32>,
) {
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            errors.push(to_field, format!("must be at least {}", f));
        }
    }
}

/// Normalizes a UK postcode to upper case with one space before the inward
/// code, e.g. `sw1a1aa` -> `SW1A 1AA`. Returns `None` if the shape is wrong.
pub fn normalize_postcode(input: &str) -> Option<String> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !(5..=7).contains(&compact.len()) || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let (outward, inward) = compact.split_at(compact.len() - 3);
    let inward_ok = {
        let b = inward.as_bytes();
        b[0].is_ascii_digit() && b[1].is_ascii_alphabetic() && b[2].is_ascii_alphabetic()
    };
    let outward_ok = outward.starts_with(|c: char| c.is_ascii_alphabetic())
        && outward.chars().any(|c| c.is_ascii_digit());
    (inward_ok && outward_ok).then(|| format!("{} {}", outward, inward))
}

fn radius(errors: &mut ValidationErrors, value: Option<&str>) -> Radius {
    let Some(raw) = value.map(str::trim).filter(|v| !is_wildcard(v)) else {
        return Radius::National;
    };
    if raw.eq_ignore_ascii_case(NATIONAL) {
        return Radius::National;
    }
    match raw.parse::<u32>() {
        Ok(0) => {
            errors.push("radius", "must be greater than zero");
            Radius::National
        }
        Ok(miles) => Radius::Miles(miles),
        Err(_) => {
            errors.push("radius", format!("`{}` is not a distance in miles", raw));
            Radius::National
        }
    }
}

fn sort_by(errors: &mut ValidationErrors, value: Option<&str>) -> SortBy {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => SortBy::Relevance,
        Some(raw) => SortBy::parse(raw).unwrap_or_else(|| {
            errors.push("sortBy", format!("unknown sort order `{}`", raw));
            SortBy::Relevance
        }),
    }
}

// Last occurrence of a parameter wins
struct Params<'a>(Vec<(&'a str, &'a str)>);

impl<'a> Params<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        self.0.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// Decodes already-split query pairs. Unknown parameters are ignored.
pub fn decode_pairs<K, V>(pairs: &[(K, V)]) -> Result<SearchQuery, ValidationErrors>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let params = Params(
        pairs
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect(),
    );
    let mut errors = ValidationErrors::default();

    let postcode = match text(params.get("postcode")) {
        None => None,
        Some(raw) => match normalize_postcode(&raw) {
            Some(pc) => Some(pc),
            None => {
                errors.push("postcode", format!("`{}` is not a valid postcode", raw));
                None
            }
        },
    };

    let criteria = FilterCriteria {
        make: text(params.get("make")),
        model: text(params.get("model")),
        submodel: text(params.get("submodel")),
        colour: text(params.get("colour").or_else(|| params.get("color"))),
        body_type: text(params.get("bodyType")),
        doors: number(&mut errors, "doors", params.get("doors"), false),
        seats: number(&mut errors, "seats", params.get("seats"), false),
        gearbox: text(params.get("gearbox")),
        fuel_type: text(params.get("fuelType")),
        price_from: number(&mut errors, "priceFrom", params.get("priceFrom"), true),
        price_to: number(&mut errors, "priceTo", params.get("priceTo"), true),
        year_from: number(&mut errors, "yearFrom", params.get("yearFrom"), false),
        year_to: number(&mut errors, "yearTo", params.get("yearTo"), false),
        mileage_from: number(&mut errors, "mileageFrom", params.get("mileageFrom"), true),
        mileage_to: number(&mut errors, "mileageTo", params.get("mileageTo"), true),
        sort_by: sort_by(&mut errors, params.get("sortBy")),
        radius: radius(&mut errors, params.get("radius")),
    };
    check_range(&mut errors, "priceTo", criteria.price_from, criteria.price_to);
    check_range(&mut errors, "yearTo", criteria.year_from, criteria.year_to);
    check_range(&mut errors, "mileageTo", criteria.mileage_from, criteria.mileage_to);

    if !errors.is_empty() {
        tracing::debug!(%errors, "Rejected search query");
        return Err(errors);
    }

    Ok(SearchQuery {
        postcode,
        criteria,
        open_filter: text(params.get("openFilter")),
    })
}

/// Decodes only the parameters `errors` does not mention, so links built after
/// a rejected submission keep the parts the user got right.
pub fn decode_valid<K, V>(pairs: &[(K, V)], errors: &ValidationErrors) -> SearchQuery
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let valid: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .filter(|(k, _)| errors.for_field(k).is_none())
        .collect();
    decode_pairs(&valid).unwrap_or_default()
}

/// Decodes a raw query string (without the leading `?`).
pub fn decode(query_string: &str) -> Result<SearchQuery, ValidationErrors> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query_string.as_bytes())
        .into_owned()
        .collect();
    decode_pairs(&pairs)
}

/// Non-default attribute constraints as (parameter, value) pairs, in a fixed
/// order. Shared by URL encoding and the backend search request.
pub fn criteria_pairs(criteria: &FilterCriteria) -> Vec<(&'static str, String)> {
    let criteria = &criteria.normalized();
    let text_fields = [
        ("make", &criteria.make),
        ("model", &criteria.model),
        ("submodel", &criteria.submodel),
        ("colour", &criteria.colour),
        ("bodyType", &criteria.body_type),
    ];
    let mut pairs: Vec<(&'static str, String)> = text_fields
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k, v)))
        .collect();

    let mut push_number = |key: &'static str, value: Option<u32>| {
        if let Some(v) = value {
            pairs.push((key, v.to_string()));
        }
    };
    push_number("doors", criteria.doors);
    push_number("seats", criteria.seats);

    if let Some(gearbox) = &criteria.gearbox {
        pairs.push(("gearbox", gearbox.clone()));
    }
    if let Some(fuel) = &criteria.fuel_type {
        pairs.push(("fuelType", fuel.clone()));
    }

    let ranges = [
        ("priceFrom", criteria.price_from),
        ("priceTo", criteria.price_to),
        ("yearFrom", criteria.year_from),
        ("yearTo", criteria.year_to),
        ("mileageFrom", criteria.mileage_from),
        ("mileageTo", criteria.mileage_to),
    ];
    pairs.extend(
        ranges
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v.to_string()))),
    );
    pairs
}

/// Encodes only the non-default parts of `query`, so shared links stay short.
pub fn encode(query: &SearchQuery) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(postcode) = &query.postcode {
        serializer.append_pair("postcode", postcode);
    }
    if let Radius::Miles(miles) = query.criteria.radius {
        serializer.append_pair("radius", &miles.to_string());
    }
    for (key, value) in criteria_pairs(&query.criteria) {
        serializer.append_pair(key, &value);
    }
    if query.criteria.sort_by != SortBy::Relevance {
        serializer.append_pair("sortBy", query.criteria.sort_by.as_str());
    }
    if let Some(open) = text(query.open_filter.as_deref()) {
        serializer.append_pair("openFilter", &open);
    }
    serializer.finish()
}

/// The same query with a different sort order, as a query string.
pub fn with_sort(query: &SearchQuery, sort_by: SortBy) -> String {
    let mut next = query.clone();
    next.criteria.sort_by = sort_by;
    encode(&next)
}

/// Keeps postcode, radius and sort order, drops every attribute constraint.
pub fn cleared(query: &SearchQuery) -> String {
    let next = SearchQuery {
        postcode: query.postcode.clone(),
        criteria: FilterCriteria {
            sort_by: query.criteria.sort_by,
            radius: query.criteria.radius,
            ..Default::default()
        },
        open_filter: None,
    };
    encode(&next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_query_encodes_to_nothing() {
        assert_eq!(encode(&SearchQuery::default()), "");
        assert_eq!(decode("").unwrap(), SearchQuery::default());
    }

    #[test]
    fn round_trip_keeps_every_set_field() {
        let query = SearchQuery {
            postcode: Some("SW1A 1AA".into()),
            criteria: FilterCriteria {
                make: Some("Land Rover".into()),
                model: Some("Defender".into()),
                colour: Some("Grey & Black".into()),
                doors: Some(5),
                fuel_type: Some("Diesel".into()),
                price_from: Some(10_000),
                price_to: Some(40_000),
                mileage_to: Some(60_000),
                sort_by: SortBy::PriceHigh,
                radius: Radius::Miles(25),
                ..Default::default()
            },
            open_filter: Some("price".into()),
        };
        let encoded = encode(&query);
        assert!(!encoded.contains("seats"));
        assert_eq!(decode(&encoded).unwrap(), query);
    }

    #[test]
    fn wildcards_mean_no_constraint() {
        let q = decode("make=Any&model=All&colour=&doors=Any&fuelType=Petrol").unwrap();
        assert_eq!(q.criteria.make, None);
        assert_eq!(q.criteria.model, None);
        assert_eq!(q.criteria.colour, None);
        assert_eq!(q.criteria.doors, None);
        assert_eq!(q.criteria.fuel_type.as_deref(), Some("Petrol"));
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let q = decode("utm_source=mail&make=Audi&page=3").unwrap();
        assert_eq!(q.criteria.make.as_deref(), Some("Audi"));
    }

    #[test]
    fn defaults_are_not_encoded() {
        let q = decode("radius=national&sortBy=relevance&make=BMW").unwrap();
        assert_eq!(encode(&q), "make=BMW");
    }

    #[test]
    fn non_numeric_input_is_rejected_not_zeroed() {
        let err = decode("priceFrom=cheap&doors=five&yearTo=2020").unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(err.for_field("priceFrom").is_some());
        assert!(err.for_field("doors").is_some());
        assert!(err.for_field("yearTo").is_none());
    }

    #[test]
    fn prices_tolerate_currency_formatting() {
        let q = decode("priceFrom=%C2%A312%2C000&mileageTo=45%20000").unwrap();
        assert_eq!(q.criteria.price_from, Some(12_000));
        assert_eq!(q.criteria.mileage_to, Some(45_000));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = decode("priceFrom=20000&priceTo=10000").unwrap_err();
        assert_eq!(err.for_field("priceTo"), Some("must be at least 20000"));
    }

    #[test]
    fn radius_and_sort_are_validated() {
        assert_eq!(decode("radius=25").unwrap().criteria.radius, Radius::Miles(25));
        assert!(decode("radius=far").unwrap_err().for_field("radius").is_some());
        assert!(decode("radius=0").is_err());
        assert!(decode("sortBy=cheapest").unwrap_err().for_field("sortBy").is_some());
    }

    #[test]
    fn color_is_accepted_as_alias() {
        let q = decode("color=Red").unwrap();
        assert_eq!(q.criteria.colour.as_deref(), Some("Red"));
        assert_eq!(encode(&q), "colour=Red");
    }

    #[test]
    fn postcodes_are_normalized_and_checked() {
        assert_eq!(normalize_postcode("sw1a1aa").as_deref(), Some("SW1A 1AA"));
        assert_eq!(normalize_postcode(" M1  1AE ").as_deref(), Some("M1 1AE"));
        assert_eq!(normalize_postcode("12345"), None);
        assert_eq!(normalize_postcode("SW1A"), None);
        assert!(decode("postcode=nowhere").unwrap_err().for_field("postcode").is_some());
        assert_eq!(
            decode("postcode=ec1a+1bb").unwrap().postcode.as_deref(),
            Some("EC1A 1BB")
        );
    }

    #[test]
    fn last_duplicate_wins() {
        let q = decode("make=Ford&make=Audi").unwrap();
        assert_eq!(q.criteria.make.as_deref(), Some("Audi"));
    }

    #[test]
    fn sort_links_and_clearing() {
        let q = decode("postcode=SW1A1AA&radius=10&make=Audi&sortBy=distance").unwrap();
        assert_eq!(
            with_sort(&q, SortBy::PriceLow),
            "postcode=SW1A+1AA&radius=10&make=Audi&sortBy=price-low"
        );
        assert_eq!(cleared(&q), "postcode=SW1A+1AA&radius=10&sortBy=distance");
    }

    #[test]
    fn valid_parameters_survive_a_rejected_query() {
        let pairs = [
            ("postcode", "m1 1ae"),
            ("radius", "10"),
            ("make", "Audi"),
            ("priceFrom", "cheap"),
            ("yearFrom", "2020"),
            ("yearTo", "2010"),
        ];
        let errors = decode_pairs(&pairs).unwrap_err();
        let kept = decode_valid(&pairs, &errors);
        assert_eq!(kept.postcode.as_deref(), Some("M1 1AE"));
        assert_eq!(kept.criteria.radius, Radius::Miles(10));
        assert_eq!(kept.criteria.make.as_deref(), Some("Audi"));
        assert_eq!(kept.criteria.price_from, None);
        assert_eq!(kept.criteria.year_from, Some(2020));
        assert_eq!(kept.criteria.year_to, None);
    }

    #[test]
    fn encode_normalizes_criteria_built_in_code() {
        let query = SearchQuery {
            criteria: FilterCriteria {
                make: Some("Any".into()),
                model: Some(" A3 ".into()),
                ..Default::default()
            },
            open_filter: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(encode(&query), "model=A3");
        assert_eq!(decode(&encode(&query)).unwrap().criteria, query.criteria.normalized());
    }

    fn arb_text() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop_oneof![
            Just("Any".to_string()),
            Just("All".to_string()),
            "[ -~]{0,12}",
        ])
    }

    // Ranges are generated in order; an inverted range is a validation error
    fn arb_range() -> impl Strategy<Value = (Option<u32>, Option<u32>)> {
        (prop::option::of(0u32..1_000_000), prop::option::of(0u32..1_000_000)).prop_map(
            |range| match range {
                (Some(from), Some(to)) if from > to => (Some(to), Some(from)),
                other => other,
            },
        )
    }

    fn arb_query() -> impl Strategy<Value = SearchQuery> {
        let text_fields = (
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
        );
        let numbers = (
            prop::option::of(0u32..10),
            prop::option::of(0u32..10),
            arb_range(),
            arb_range(),
            arb_range(),
        );
        let location = (
            prop::option::of(prop::sample::select(vec!["SW1A 1AA", "M1 1AE", "EC1A 1BB", "LS1 4AP"])),
            prop_oneof![Just(Radius::National), (1u32..500).prop_map(Radius::Miles)],
            prop::sample::select(SortBy::ALL.to_vec()),
            arb_text(),
        );
        (text_fields, numbers, location).prop_map(
            |(
                (make, model, submodel, colour, body_type, gearbox, fuel_type),
                (doors, seats, price, year, mileage),
                (postcode, radius, sort_by, open_filter),
            )| SearchQuery {
                postcode: postcode.map(str::to_string),
                criteria: FilterCriteria {
                    make,
                    model,
                    submodel,
                    colour,
                    body_type,
                    doors,
                    seats,
                    gearbox,
                    fuel_type,
                    price_from: price.0,
                    price_to: price.1,
                    year_from: year.0,
                    year_to: year.1,
                    mileage_from: mileage.0,
                    mileage_to: mileage.1,
                    sort_by,
                    radius,
                },
                open_filter,
            },
        )
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(query in arb_query()) {
            let expected = SearchQuery {
                postcode: query.postcode.clone(),
                criteria: query.criteria.normalized(),
                open_filter: text(query.open_filter.as_deref()),
            };
            let encoded = encode(&query);
            prop_assert_eq!(decode(&encoded), Ok(expected), "encoded as {}", encoded);
        }
    }
}
