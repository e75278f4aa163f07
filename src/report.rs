//! Results CSV built from the catalog, the tricky-titles list and the
//! gathered stats.

use crate::catalog::{TitleCatalog, TitleRecord, TrickyTitles};
use crate::error::Result;
use crate::ordered::OrderedMap;
use crate::pipeline::{IdentifierType, TitleStats, WorldcatStats};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Region columns, in output order
pub const REPORT_REGIONS: [&str; 7] = [
    "Africa",
    "Asia & Pacific",
    "Arab States",
    "Europe",
    "North America",
    "South/Latin America",
    "Unknown",
];

const EXCLUDED_LABEL: &str = "Record excluded from analysis";
const NOT_APPLICABLE: &str = "N/A";

/// One row of the results CSV
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(rename = "Unique Identifier")]
    pub unique_identifier: String,
    #[serde(rename = "Prefix")]
    pub prefix: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Subtitle")]
    pub subtitle: String,
    #[serde(rename = "ISBN/OCLC")]
    pub isbn_or_oclc: String,
    #[serde(rename = "Identifiers Searched")]
    pub identifiers_searched: String,
    #[serde(rename = "OCLC Collection Method")]
    pub oclc_collection_method: String,
    #[serde(rename = "Bibliographic Resource - FRBR Grouping")]
    pub bibliographic_frbr_grouping: String,
    #[serde(rename = "Library Locations - FRBR Grouping")]
    pub library_frbr_grouping: String,
    #[serde(rename = "Records Found")]
    pub records_found: String,
    #[serde(rename = "Number of Libraries")]
    pub number_of_libraries: String,
    #[serde(rename = "Country Distribution")]
    pub country_distribution: String,
    #[serde(rename = "Libraries in Africa")]
    pub africa: String,
    #[serde(rename = "Libraries in Asia & Pacific")]
    pub asia_pacific: String,
    #[serde(rename = "Libraries in Arab States")]
    pub arab_states: String,
    #[serde(rename = "Libraries in Europe")]
    pub europe: String,
    #[serde(rename = "Libraries in North America")]
    pub north_america: String,
    #[serde(rename = "Libraries in South/Latin America")]
    pub south_latin_america: String,
    #[serde(rename = "Libraries' Location Unknown")]
    pub unknown: String,
}

impl ResultRow {
    fn set_region_counts(&mut self, counts: [usize; 7]) {
        let [africa, asia, arab, europe, north, south, unknown] = counts.map(|n| n.to_string());
        self.africa = africa;
        self.asia_pacific = asia;
        self.arab_states = arab;
        self.europe = europe;
        self.north_america = north;
        self.south_latin_america = south;
        self.unknown = unknown;
    }
}

/// Render counts as "Key: n; Key: n", highest count first.
///
/// Ties keep their original order.
pub fn make_dictionary_string(counts: &OrderedMap<usize>) -> String {
    let mut pairs: Vec<(&str, &usize)> = counts.iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(a.1));
    pairs
        .iter()
        .map(|(key, count)| format!("{}: {}", key, count))
        .collect::<Vec<_>>()
        .join("; ")
}

fn base_row(key: &str, record: &TitleRecord) -> ResultRow {
    ResultRow {
        unique_identifier: key.to_string(),
        prefix: record.prefix.clone(),
        title: record.title.clone(),
        subtitle: record.subtitle.clone(),
        ..Default::default()
    }
}

fn excluded_row(key: &str, record: &TitleRecord) -> ResultRow {
    ResultRow {
        isbn_or_oclc: EXCLUDED_LABEL.to_string(),
        identifiers_searched: NOT_APPLICABLE.to_string(),
        oclc_collection_method: NOT_APPLICABLE.to_string(),
        bibliographic_frbr_grouping: NOT_APPLICABLE.to_string(),
        library_frbr_grouping: NOT_APPLICABLE.to_string(),
        records_found: NOT_APPLICABLE.to_string(),
        ..base_row(key, record)
    }
}

fn title_row(key: &str, record: &TitleRecord, stats: &TitleStats, tricky_titles: &TrickyTitles) -> ResultRow {
    let mut row = base_row(key, record);
    row.isbn_or_oclc = stats.identifier_type.as_str().to_string();
    row.identifiers_searched = match stats.identifier_type {
        IdentifierType::Isbn => stats.isbns_searched.join("; "),
        IdentifierType::Oclc => stats.oclc_numbers_searched.join("; "),
        IdentifierType::None => String::new(),
    };

    match tricky_titles.get(key) {
        Some(tricky) => {
            row.oclc_collection_method = tricky.method.as_str().to_string();
            row.bibliographic_frbr_grouping = tricky.bibliographic_frbr.clone();
            row.library_frbr_grouping = tricky.library_frbr.clone();
        }
        None => {
            let (method, frbr) = if stats.identifier_type == IdentifierType::Oclc {
                ("Bibliographic", "TRUE")
            } else {
                (NOT_APPLICABLE, NOT_APPLICABLE)
            };
            row.oclc_collection_method = method.to_string();
            row.bibliographic_frbr_grouping = frbr.to_string();
            row.library_frbr_grouping = "TRUE".to_string();
        }
    }

    match &stats.data_summary {
        Some(summary) => {
            row.records_found = "True".to_string();
            row.number_of_libraries = summary.number_of_libraries.to_string();
            row.country_distribution = make_dictionary_string(&summary.country_distribution);
            row.set_region_counts(
                REPORT_REGIONS.map(|region| summary.region_distribution.get(region).copied().unwrap_or(0)),
            );
        }
        None => row.records_found = "False".to_string(),
    }

    row
}

/// Build one row per catalog record, up to `last_record`.
///
/// Records missing from the stats (a run stopped at the API limit) are
/// skipped with a warning.
pub fn build_rows(
    catalog: &TitleCatalog,
    tricky_titles: &TrickyTitles,
    stats: &WorldcatStats,
    last_record: usize,
) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    for (key, record) in catalog.iter().take(last_record) {
        match stats.get(key) {
            Some(None) => rows.push(excluded_row(key, record)),
            Some(Some(title_stats)) => rows.push(title_row(key, record, title_stats, tricky_titles)),
            None => warn!(title_key = key, "No stats gathered for record, skipping"),
        }
    }
    rows
}

/// Write rows as UTF-8 CSV with a byte-order mark
pub fn save_results_csv(path: &Path, rows: &[ResultRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all("\u{feff}".as_bytes())?;

    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(file);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    info!(rows = rows.len(), path = ?path, "Saved results CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DataSummary;
    use crate::catalog::{CollectionMethod, TrickyTitle};
    use crate::pipeline::OclcLookup;
    use tempfile::TempDir;

    fn counts(pairs: &[(&str, usize)]) -> OrderedMap<usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn record(title: &str) -> TitleRecord {
        TitleRecord {
            prefix: "The".to_string(),
            title: title.to_string(),
            subtitle: "N/A".to_string(),
            ..Default::default()
        }
    }

    fn stats(identifier_type: IdentifierType, summary: Option<DataSummary>) -> TitleStats {
        TitleStats {
            identifier_type,
            isbns_searched: vec!["111".to_string(), "222".to_string()],
            isbn_lookup_skipped: false,
            oclc_lookup: Some(OclcLookup::Manual),
            oclc_numbers_searched: vec!["999".to_string()],
            library_frbr_grouping: Some(true),
            response_metadata: Vec::new(),
            match_check: None,
            libraries: Vec::new(),
            data_summary: summary,
        }
    }

    #[test]
    fn test_make_dictionary_string_sorts_by_count() {
        let c = counts(&[("Japan", 2), ("United States", 5), ("Korea", 2), ("", 1)]);
        assert_eq!(
            make_dictionary_string(&c),
            "United States: 5; Japan: 2; Korea: 2; : 1"
        );
        assert_eq!(make_dictionary_string(&OrderedMap::new()), "");
    }

    #[test]
    fn test_build_rows() {
        let catalog: TitleCatalog = vec![
            ("1".to_string(), record("Found")),
            ("2".to_string(), record("Tricky")),
            ("3".to_string(), record("Nothing")),
            ("191".to_string(), record("Excluded")),
            ("400".to_string(), record("Not gathered")),
        ]
        .into_iter()
        .collect();

        let summary = DataSummary {
            number_of_libraries: 4,
            country_distribution: counts(&[("Japan", 1), ("United States", 3)]),
            region_distribution: counts(&[("Asia & Pacific", 1), ("North America", 3)]),
        };

        let mut gathered: WorldcatStats = OrderedMap::new();
        gathered.insert("1", Some(stats(IdentifierType::Isbn, Some(summary.clone()))));
        gathered.insert("2", Some(stats(IdentifierType::Oclc, Some(summary))));
        gathered.insert("3", Some(stats(IdentifierType::None, None)));
        gathered.insert("191", None);

        let tricky: TrickyTitles = vec![(
            "2".to_string(),
            TrickyTitle {
                method: CollectionMethod::Manual,
                bibliographic_frbr: "N/A".to_string(),
                library_frbr: "FALSE".to_string(),
                oclc_numbers: vec!["999".to_string()],
            },
        )]
        .into_iter()
        .collect();

        let rows = build_rows(&catalog, &tricky, &gathered, 372);
        assert_eq!(rows.len(), 4);

        let isbn = &rows[0];
        assert_eq!(isbn.isbn_or_oclc, "ISBN");
        assert_eq!(isbn.identifiers_searched, "111; 222");
        assert_eq!(isbn.oclc_collection_method, "N/A");
        assert_eq!(isbn.library_frbr_grouping, "TRUE");
        assert_eq!(isbn.records_found, "True");
        assert_eq!(isbn.number_of_libraries, "4");
        assert_eq!(isbn.country_distribution, "United States: 3; Japan: 1");
        assert_eq!(isbn.africa, "0");
        assert_eq!(isbn.asia_pacific, "1");
        assert_eq!(isbn.north_america, "3");
        assert_eq!(isbn.unknown, "0");

        let manual = &rows[1];
        assert_eq!(manual.identifiers_searched, "999");
        assert_eq!(manual.oclc_collection_method, "Manual");
        assert_eq!(manual.bibliographic_frbr_grouping, "N/A");
        assert_eq!(manual.library_frbr_grouping, "FALSE");

        let nothing = &rows[2];
        assert_eq!(nothing.isbn_or_oclc, "N/A");
        assert_eq!(nothing.identifiers_searched, "");
        assert_eq!(nothing.records_found, "False");
        assert_eq!(nothing.number_of_libraries, "");
        assert_eq!(nothing.africa, "");

        let excluded = &rows[3];
        assert_eq!(excluded.unique_identifier, "191");
        assert_eq!(excluded.isbn_or_oclc, "Record excluded from analysis");
        assert_eq!(excluded.records_found, "N/A");
        assert_eq!(excluded.country_distribution, "");

        assert_eq!(build_rows(&catalog, &tricky, &gathered, 2).len(), 2);
    }

    #[test]
    fn test_save_results_csv_writes_bom_and_header() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("outputs").join("results.csv");
        let row = ResultRow {
            unique_identifier: "1".to_string(),
            title: "Rice, Reform".to_string(),
            ..Default::default()
        };
        save_results_csv(&path, &[row])?;

        let bytes = std::fs::read(&path)?;
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));

        let text = String::from_utf8_lossy(&bytes[3..]).into_owned();
        let mut lines = text.lines();
        let header = lines.next().unwrap_or_default();
        assert!(header.starts_with("Unique Identifier,Prefix,Title,Subtitle,ISBN/OCLC"));
        assert!(header.ends_with("Libraries in South/Latin America,Libraries' Location Unknown"));
        assert_eq!(header.split(',').count(), 19);
        assert!(lines.next().unwrap_or_default().starts_with("1,,\"Rice, Reform\","));
        Ok(())
    }
}
