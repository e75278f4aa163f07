//! Per-title aggregation of holding libraries.

use crate::locations::Library;
use crate::ordered::OrderedMap;
use crate::regions::RegionTable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Region bucket for libraries with no country
pub const UNKNOWN_REGION: &str = "Unknown";

/// Library counts for one title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub number_of_libraries: usize,
    /// WorldCat country name -> libraries, in first-seen order
    pub country_distribution: OrderedMap<usize>,
    /// Region -> libraries, in first-seen order
    pub region_distribution: OrderedMap<usize>,
}

/// Keep the first library for each OCLC symbol, preserving order
pub fn dedupe_libraries(libraries: Vec<Library>) -> Vec<Library> {
    let mut seen: HashSet<String> = HashSet::new();
    libraries
        .into_iter()
        .filter(|library| seen.insert(library.oclc_symbol.clone()))
        .collect()
}

/// Count libraries by country and by region.
///
/// Libraries without a country count toward [`UNKNOWN_REGION`]. Countries
/// missing from the region table are logged and left out of the region counts.
pub fn summarize(libraries: &[Library], regions: &RegionTable) -> DataSummary {
    let mut summary = DataSummary {
        number_of_libraries: libraries.len(),
        ..Default::default()
    };

    for library in libraries {
        *summary.country_distribution.entry_or_default(&library.country) += 1;

        if library.country.is_empty() {
            *summary.region_distribution.entry_or_default(UNKNOWN_REGION) += 1;
        } else if let Some(region) = regions.region_for(&library.country) {
            *summary.region_distribution.entry_or_default(region) += 1;
        } else {
            warn!(country = %library.country, "Country not found in region table");
        }
    }

    summary
}
