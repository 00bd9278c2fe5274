// Server-rendered search results page

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use futures::future;
use std::collections::HashSet;

use crate::{
    error::{AppError, AppResult},
    models::{FilterOptions, Radius, SearchQuery, SortBy},
    presentation::{CarCard, ResultSummary},
    query::{self, ValidationErrors},
    AppState,
};

use super::run_search;

const RADIUS_CHOICES: [u32; 15] = [1, 5, 10, 15, 20, 25, 30, 40, 50, 60, 70, 80, 90, 100, 200];

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

// One sidebar control, either a dropdown (options non-empty) or a text input
pub struct FilterField {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub options: Vec<SelectOption>,
    pub error: String,
}

impl FilterField {
    pub fn is_select(&self) -> bool {
        !self.options.is_empty()
    }
}

pub struct FilterGroup {
    pub key: &'static str,
    pub title: &'static str,
    pub open: bool,
    pub fields: Vec<FilterField>,
}

pub struct SortLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

#[derive(Template)]
#[template(path = "search.html")]
struct SearchTemplate {
    groups: Vec<FilterGroup>,
    sort_value: String,
    has_results_section: bool,
    heading: String,
    notice: String,
    suggestions: Vec<String>,
    cards: Vec<CarCard>,
    sort_links: Vec<SortLink>,
    clear_href: String,
    share_href: String,
    error_banner: String,
}

// Raw submitted values, so the form shows exactly what the user typed
struct RawForm<'a>(&'a [(String, String)]);

impl RawForm<'_> {
    fn get(&self, key: &str) -> String {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim().to_string())
            .unwrap_or_default()
    }
}

fn select_options(choices: &[String], current: &str) -> Vec<SelectOption> {
    let mut options = vec![SelectOption {
        value: String::new(),
        label: "Any".to_string(),
        selected: current.is_empty(),
    }];
    options.extend(choices.iter().map(|choice| SelectOption {
        value: choice.clone(),
        label: choice.clone(),
        selected: choice == current,
    }));
    // Keep a submitted value that the option list doesn't know about
    if !current.is_empty() && !choices.iter().any(|c| c == current) {
        options.push(SelectOption {
            value: current.to_string(),
            label: current.to_string(),
            selected: true,
        });
    }
    options
}

fn radius_options(current: &str) -> Vec<SelectOption> {
    let national = current.is_empty() || current.eq_ignore_ascii_case("national");
    let mut options = vec![SelectOption {
        value: "national".to_string(),
        label: "National".to_string(),
        selected: national,
    }];
    options.extend(RADIUS_CHOICES.iter().map(|miles| SelectOption {
        value: miles.to_string(),
        label: format!("Within {} miles", miles),
        selected: current == miles.to_string(),
    }));
    options
}

fn build_groups(
    form: &RawForm<'_>,
    options: &FilterOptions,
    errors: &ValidationErrors,
    open_filter: &str,
) -> Vec<FilterGroup> {
    let field = |name: &'static str, label: &'static str, choices: Option<&[String]>| {
        let value = form.get(name);
        FilterField {
            name,
            label,
            options: choices.map(|c| select_options(c, &value)).unwrap_or_default(),
            error: errors.for_field(name).unwrap_or_default().to_string(),
            value,
        }
    };

    let radius_value = form.get("radius");
    let location = vec![
        field("postcode", "Postcode", None),
        FilterField {
            name: "radius",
            label: "Distance",
            options: radius_options(&radius_value),
            error: errors.for_field("radius").unwrap_or_default().to_string(),
            value: radius_value,
        },
    ];
    let vehicle = vec![
        field("make", "Make", Some(options.makes.as_slice())),
        field("model", "Model", Some(options.models.as_slice())),
        field("submodel", "Variant", None),
    ];
    let specification = vec![
        field("colour", "Colour", Some(options.colours.as_slice())),
        field("bodyType", "Body type", Some(options.body_types.as_slice())),
        field("gearbox", "Gearbox", Some(options.transmissions.as_slice())),
        field("fuelType", "Fuel type", Some(options.fuel_types.as_slice())),
        field("doors", "Doors", None),
        field("seats", "Seats", None),
    ];
    let price = vec![
        field("priceFrom", "Min price (£)", None),
        field("priceTo", "Max price (£)", None),
    ];
    let year = vec![
        field("yearFrom", "From year", None),
        field("yearTo", "To year", None),
    ];
    let mileage = vec![
        field("mileageFrom", "Min mileage", None),
        field("mileageTo", "Max mileage", None),
    ];

    [
        ("location", "Location", location),
        ("vehicle", "Make & model", vehicle),
        ("specification", "Specification", specification),
        ("price", "Price", price),
        ("year", "Year", year),
        ("mileage", "Mileage", mileage),
    ]
    .into_iter()
    .map(|(key, title, fields)| FilterGroup {
        key,
        title,
        open: key == "location"
            || key == open_filter
            || fields.iter().any(|f| !f.error.is_empty()),
        fields,
    })
    .collect()
}

fn sort_links(search_query: &SearchQuery) -> Vec<SortLink> {
    let radius_search = search_query.postcode.is_some()
        && matches!(search_query.criteria.radius, Radius::Miles(_));
    SortBy::ALL
        .into_iter()
        .filter(|sort| *sort != SortBy::Distance || radius_search)
        .map(|sort| SortLink {
            label: sort.label(),
            href: format!("/search?{}", query::with_sort(search_query, sort)),
            active: sort == search_query.criteria.sort_by,
        })
        .collect()
}

pub async fn search_page(
    State(app_state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<impl IntoResponse> {
    let decoded = query::decode_pairs(&pairs);

    // Invalid input is never dispatched; the sidebar options are still loaded
    let search = async {
        match &decoded {
            Ok(search_query) => Some(run_search(&app_state, search_query).await),
            Err(_) => None,
        }
    };
    let (options, outcome) = future::join(app_state.backend.filter_options(), search).await;

    let options = options.unwrap_or_else(|e| {
        tracing::warn!("Filter options unavailable, rendering empty sidebar: {}", e);
        FilterOptions::default()
    });

    let saved: HashSet<String> = match app_state.saved.saved_ids().await {
        Ok(ids) => ids.into_iter().collect(),
        Err(e) => {
            tracing::warn!("Could not read saved cars: {}", e);
            HashSet::new()
        }
    };

    let form = RawForm(&pairs);
    let no_errors = ValidationErrors::default();
    let (errors, search_query) = match &decoded {
        Ok(q) => (&no_errors, q.clone()),
        Err(errors) => (errors, query::decode_valid(&pairs, errors)),
    };

    let mut template = SearchTemplate {
        groups: build_groups(
            &form,
            &options,
            errors,
            search_query.open_filter.as_deref().unwrap_or_default(),
        ),
        sort_value: search_query.criteria.sort_by.as_str().to_string(),
        has_results_section: false,
        heading: String::new(),
        notice: String::new(),
        suggestions: Vec::new(),
        cards: Vec::new(),
        sort_links: Vec::new(),
        clear_href: format!("/search?{}", query::cleared(&search_query)),
        share_href: format!("/search?{}", query::encode(&search_query)),
        error_banner: String::new(),
    };

    if let Some(outcome) = outcome {
        match outcome {
            Ok(results) => {
                let summary = ResultSummary::new(&results, &search_query.criteria);
                template.has_results_section = true;
                template.heading = summary.heading;
                template.notice = summary.notice.unwrap_or_default();
                template.suggestions = summary.suggestions;
                template.cards = results
                    .results()
                    .iter()
                    .map(|listing| CarCard::from_listing(listing, saved.contains(&listing.id)))
                    .collect();
                template.sort_links = sort_links(&search_query);
            }
            Err(e) => {
                tracing::error!("Search failed while rendering results page: {:?}", e);
                template.error_banner =
                    "We couldn't reach the vehicle search service. Please try your search again."
                        .to_string();
            }
        }
    }

    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render search template: {}", e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}
