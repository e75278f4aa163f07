//! Country to region lookup.
//!
//! The table is scraped from the Wikimedia "List of countries by regional
//! classification" page and cached like any other request.

use crate::client::WorldCatClient;
use crate::error::{HoldingsError, OptionExt, Result};
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::info;

/// Source page for the region table
pub const DEFAULT_REGIONS_URL: &str =
    "https://meta.wikimedia.org/wiki/List_of_countries_by_regional_classification";

/// Table rows that are not countries
const EXCLUDED_ENTRIES: &[&str] = &["Anonymous Proxy", "Invalid IP", "Satellite Provider", "Europe"];

/// WorldCat country names that differ from the table's spelling
const COUNTRY_ALIASES: &[(&str, &str)] = &[("Viet Nam", "Vietnam"), ("Macao", "Macau")];

/// Country name -> region name
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: HashMap<String, String>,
}

impl RegionTable {
    /// Region for a WorldCat country name, after alias normalization
    pub fn region_for(&self, country: &str) -> Option<&str> {
        let country = COUNTRY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == country)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(country);
        self.regions.get(country).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl FromIterator<(String, String)> for RegionTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            regions: iter.into_iter().collect(),
        }
    }
}

/// Parse the first table body of the page: country in the first cell, region in the second.
pub fn parse_region_table(html: &str) -> Result<RegionTable> {
    let document = Html::parse_document(html);

    let tbody_selector = Selector::parse("tbody").map_err(|e| HoldingsError::Parse(e.to_string()))?;
    let row_selector = Selector::parse("tr").map_err(|e| HoldingsError::Parse(e.to_string()))?;
    let cell_selector = Selector::parse("td").map_err(|e| HoldingsError::Parse(e.to_string()))?;

    let tbody = document.select(&tbody_selector).next().ok_or_parse("Region page has no table")?;

    let mut regions = HashMap::new();
    // First row holds the column headers
    for row in tbody.select(&row_selector).skip(1) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .take(2)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();
        let [country, region] = cells.as_slice() else {
            continue;
        };
        if EXCLUDED_ENTRIES.contains(&country.as_str()) {
            continue;
        }
        regions.insert(country.clone(), region.clone());
    }

    Ok(RegionTable { regions })
}

/// Fetch (or read from cache) and parse the region table
pub async fn fetch_region_table(client: &mut WorldCatClient, url: &str) -> Result<RegionTable> {
    let html = client.get_page(url).await?;
    let table = parse_region_table(&html)?;
    info!(countries = table.len(), "Loaded country to region table");
    Ok(table)
}
