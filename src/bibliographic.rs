//! Bibliographic Resource (SRU) search for OCLC numbers.
//!
//! Used when ISBN lookups return nothing, or are known to be unreliable, for a
//! title: search WorldCat by title and keep the records whose title and
//! imprint reconcile with the catalog entry.

use crate::catalog::TitleRecord;
use crate::client::WorldCatClient;
use crate::error::{HoldingsError, OptionExt, Result};
use crate::marc::{parse_sru_response, MarcRecord};
use crate::matching::{compare_imprints, compare_titles};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// SRU endpoint path
const SRU_PATH: &str = "webservices/catalog/search/sru";

/// Records requested per search
const MAXIMUM_RECORDS: u32 = 100;

/// A search hit accepted as the catalog title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OclcMatch {
    pub oclc_number: String,
    pub marc_title: Option<String>,
    pub marc_imprint: Option<String>,
    pub marc_author: Option<String>,
    pub marc_series: Option<String>,
}

/// Outcome of a title search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OclcMatches {
    /// Total hits reported by WorldCat
    pub number_of_records: u64,
    /// CQL query sent
    pub query: String,
    pub frbr_grouping: bool,
    /// Accepted records, in response order
    pub matches: Vec<OclcMatch>,
}

impl OclcMatches {
    pub fn oclc_numbers(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.oclc_number.clone()).collect()
    }
}

/// Title and subtitle with characters that break CQL removed
pub fn search_title(record: &TitleRecord) -> Result<String> {
    let cleanup_regex = Regex::new(r##"[:,"#]"##).map_err(|e| HoldingsError::Parse(e.to_string()))?;
    let full_title = record.full_title().replace('&', "and");
    Ok(cleanup_regex.replace_all(&full_title, "").into_owned())
}

/// CQL query for a title
pub fn build_query(record: &TitleRecord) -> Result<String> {
    Ok(format!("srw.ti all \"{}\"", search_title(record)?))
}

/// Whether a MARC record reconciles with the catalog record
pub fn record_matches(record: &TitleRecord, marc: &MarcRecord) -> bool {
    let title_ok = marc
        .title
        .as_deref()
        .is_some_and(|title| compare_titles(&record.title, title));
    let imprint_ok = marc
        .imprint
        .as_deref()
        .is_some_and(|imprint| compare_imprints(&record.imprint, imprint));
    title_ok && imprint_ok
}

/// Search WorldCat by title and return the OCLC numbers of matching records.
///
/// # Errors
///
/// Propagates [`crate::HoldingsError::ApiLimit`]; returns a parse error if the
/// response is not a valid SRU document.
pub async fn look_up_oclc_numbers(
    client: &mut WorldCatClient,
    record: &TitleRecord,
    frbr_grouping: bool,
) -> Result<OclcMatches> {
    let url = client.endpoint(SRU_PATH);
    let query = build_query(record)?;

    let mut params = vec![
        ("query", query.clone()),
        ("maximumRecords", MAXIMUM_RECORDS.to_string()),
    ];
    if !frbr_grouping {
        params.push(("frbrGrouping", "off".to_string()));
    }

    debug!(query = %query, frbr_grouping = frbr_grouping, "Searching bibliographic records");
    let response = client.get_cached(&url, &params).await?;
    let body = response.as_text().ok_or_parse("SRU response was cached as JSON")?;
    let sru = parse_sru_response(body)?;

    let mut matches: Vec<OclcMatch> = Vec::new();
    for marc in &sru.records {
        if !record_matches(record, marc) {
            continue;
        }
        let Some(oclc_number) = marc.control_number.clone() else {
            warn!(title = ?marc.title, "Matching record has no control number");
            continue;
        };
        if matches.iter().any(|m| m.oclc_number == oclc_number) {
            continue;
        }
        matches.push(OclcMatch {
            oclc_number,
            marc_title: marc.title.clone(),
            marc_imprint: marc.imprint.clone(),
            marc_author: marc.author.clone(),
            marc_series: marc.series.clone(),
        });
    }

    info!(
        query = %query,
        hits = sru.number_of_records,
        matched = matches.len(),
        "Bibliographic search complete"
    );

    Ok(OclcMatches {
        number_of_records: sru.number_of_records,
        query,
        frbr_grouping,
        matches,
    })
}
