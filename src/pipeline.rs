//! Holdings gathering pipeline.
//!
//! For every catalog title, in order:
//!
//! 1. Excluded titles get an empty entry.
//! 2. Titles with reliable ISBNs are looked up by ISBN; if that finds
//!    libraries, the response metadata is checked against the catalog record.
//! 3. Otherwise OCLC numbers are found by title search (or taken from the
//!    tricky-titles list) and looked up instead.
//!
//! Hitting the API limit stops the loop; everything gathered so far is kept
//! and, because all responses are cached, the next run resumes where this
//! one stopped.

use crate::analysis::{dedupe_libraries, summarize, DataSummary};
use crate::bibliographic::{look_up_oclc_numbers, OclcMatches};
use crate::catalog::{CollectionMethod, TitleCatalog, TitleRecord, TrickyTitle, TrickyTitles, EXCLUDED_RECORD_KEYS};
use crate::client::WorldCatClient;
use crate::error::{HoldingsError, Result};
use crate::locations::{collect_libraries_for_identifiers, IdentifierKind, Library, ResponseMetadata};
use crate::matching::{check_for_metadata_match, MatchCheck};
use crate::ordered::OrderedMap;
use crate::regions::RegionTable;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

/// Default number of catalog records to process
pub const DEFAULT_LAST_RECORD: usize = 372;

/// Identifier type that produced a title's library data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierType {
    #[serde(rename = "ISBN")]
    Isbn,
    #[serde(rename = "OCLC")]
    Oclc,
    #[serde(rename = "N/A")]
    None,
}

impl IdentifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Isbn => "ISBN",
            IdentifierType::Oclc => "OCLC",
            IdentifierType::None => "N/A",
        }
    }
}

/// Where a title's OCLC numbers came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OclcLookup {
    /// Title search against the Bibliographic Resource service
    Bibliographic(OclcMatches),
    /// Numbers listed by hand in the tricky-titles CSV
    Manual,
}

/// Everything gathered for one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleStats {
    pub identifier_type: IdentifierType,
    /// ISBNs requested; empty when the ISBN lookup was skipped
    pub isbns_searched: Vec<String>,
    /// True for tricky titles, whose ISBN results are known to be wrong
    pub isbn_lookup_skipped: bool,
    pub oclc_lookup: Option<OclcLookup>,
    pub oclc_numbers_searched: Vec<String>,
    /// FRBR grouping used for Library Locations, if any were requested
    pub library_frbr_grouping: Option<bool>,
    pub response_metadata: Vec<ResponseMetadata>,
    /// Only run for ISBN results
    pub match_check: Option<MatchCheck>,
    /// De-duplicated holding libraries
    pub libraries: Vec<Library>,
    /// Absent when no libraries were found
    pub data_summary: Option<DataSummary>,
}

/// Stats file contents: record key -> stats (`None` for excluded records)
pub type WorldcatStats = OrderedMap<Option<TitleStats>>;

/// Outcome of a gathering run
#[derive(Debug, Default)]
pub struct GatherReport {
    pub stats: WorldcatStats,
    /// Keys whose ISBN metadata did not reconcile with the catalog
    pub match_issues: Vec<String>,
    /// Keys with no libraries from either ISBNs or OCLC numbers
    pub no_records_found: Vec<String>,
    /// Keys skipped because of a non-recoverable error
    pub failed: Vec<String>,
    pub stopped_at_api_limit: bool,
}

enum TitleOutcome {
    Gathered {
        stats: Box<TitleStats>,
        match_issue: bool,
        no_records: bool,
    },
    ApiLimit,
}

/// Gather holdings for the first `last_record` catalog titles.
pub async fn gather(
    client: &mut WorldCatClient,
    catalog: &TitleCatalog,
    tricky_titles: &TrickyTitles,
    regions: &RegionTable,
    last_record: usize,
) -> GatherReport {
    let mut report = GatherReport::default();

    for (key, record) in catalog.iter().take(last_record) {
        info!(title_key = key, "Processing title");

        if EXCLUDED_RECORD_KEYS.contains(&key) {
            report.stats.insert(key, None);
            continue;
        }

        match gather_title(client, key, record, tricky_titles.get(key)).await {
            Ok(TitleOutcome::Gathered {
                stats,
                match_issue,
                no_records,
            }) => {
                if match_issue {
                    report.match_issues.push(key.to_string());
                }
                if no_records {
                    report.no_records_found.push(key.to_string());
                }
                report.stats.insert(key, Some(*stats));
            }
            Ok(TitleOutcome::ApiLimit) => {
                warn!(title_key = key, "Reached API limit, stopping");
                report.stopped_at_api_limit = true;
                break;
            }
            Err(e) => {
                error!(title_key = key, error = %e, "Failed to gather title");
                report.failed.push(key.to_string());
            }
        }
    }

    add_data_summaries(&mut report.stats, regions);
    report
}

async fn gather_title(
    client: &mut WorldCatClient,
    key: &str,
    record: &TitleRecord,
    tricky: Option<&TrickyTitle>,
) -> Result<TitleOutcome> {
    let mut isbns_searched = Vec::new();

    if tricky.is_none() {
        let results = collect_libraries_for_identifiers(client, &record.isbns(), IdentifierKind::Isbn, true).await?;
        if results.at_api_limit {
            return Ok(TitleOutcome::ApiLimit);
        }

        if !results.libraries.is_empty() {
            let check = check_for_metadata_match(record, &results.metadata);
            let match_issue = !check.matched;
            if match_issue {
                warn!(title_key = key, failures = ?check.failures, "Response metadata does not match record");
            }

            let stats = TitleStats {
                identifier_type: IdentifierType::Isbn,
                isbns_searched: results.searched,
                isbn_lookup_skipped: false,
                oclc_lookup: None,
                oclc_numbers_searched: Vec::new(),
                library_frbr_grouping: Some(true),
                response_metadata: results.metadata,
                match_check: Some(check),
                libraries: dedupe_libraries(results.libraries),
                data_summary: None,
            };
            return Ok(TitleOutcome::Gathered {
                stats: Box::new(stats),
                match_issue,
                no_records: false,
            });
        }

        isbns_searched = results.searched;
    }

    let (oclc_lookup, oclc_numbers) = match tricky {
        Some(t) if t.method == CollectionMethod::Manual => (OclcLookup::Manual, t.oclc_numbers.clone()),
        _ => {
            let frbr_grouping = tricky.map(TrickyTitle::bibliographic_frbr_grouping).unwrap_or(true);
            match look_up_oclc_numbers(client, record, frbr_grouping).await {
                Ok(matches) => {
                    let numbers = matches.oclc_numbers();
                    (OclcLookup::Bibliographic(matches), numbers)
                }
                Err(HoldingsError::ApiLimit) => return Ok(TitleOutcome::ApiLimit),
                Err(e) => return Err(e),
            }
        }
    };

    let mut stats = TitleStats {
        identifier_type: IdentifierType::None,
        isbns_searched,
        isbn_lookup_skipped: tricky.is_some(),
        oclc_lookup: Some(oclc_lookup),
        oclc_numbers_searched: Vec::new(),
        library_frbr_grouping: None,
        response_metadata: Vec::new(),
        match_check: None,
        libraries: Vec::new(),
        data_summary: None,
    };

    if oclc_numbers.is_empty() {
        info!(title_key = key, "No results found using ISBNs or OCLC numbers");
        return Ok(TitleOutcome::Gathered {
            stats: Box::new(stats),
            match_issue: false,
            no_records: true,
        });
    }

    let frbr_grouping = tricky.map(TrickyTitle::library_frbr_grouping).unwrap_or(true);
    let results = collect_libraries_for_identifiers(client, &oclc_numbers, IdentifierKind::Oclc, frbr_grouping).await?;
    if results.at_api_limit {
        return Ok(TitleOutcome::ApiLimit);
    }

    let no_records = results.libraries.is_empty();
    stats.identifier_type = IdentifierType::Oclc;
    stats.oclc_numbers_searched = results.searched;
    stats.library_frbr_grouping = Some(frbr_grouping);
    stats.response_metadata = results.metadata;
    stats.libraries = dedupe_libraries(results.libraries);

    Ok(TitleOutcome::Gathered {
        stats: Box::new(stats),
        match_issue: false,
        no_records,
    })
}

/// Attach a data summary to every entry that has libraries
pub fn add_data_summaries(stats: &mut WorldcatStats, regions: &RegionTable) {
    for (_, entry) in stats.iter_mut() {
        if let Some(title) = entry {
            title.data_summary = if title.libraries.is_empty() {
                None
            } else {
                Some(summarize(&title.libraries, regions))
            };
        }
    }
}

/// Write the stats file as pretty JSON
pub fn write_stats(path: &Path, stats: &WorldcatStats) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, content)?;
    info!(titles = stats.len(), path = ?path, "Saved worldcat stats");
    Ok(())
}

/// Read a stats file written by [`write_stats`]
pub fn read_stats(path: &Path) -> Result<WorldcatStats> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
