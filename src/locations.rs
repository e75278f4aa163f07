//! WorldCat Library Locations lookups.
//!
//! Collects the holding libraries for an ISBN or OCLC number, 100 libraries
//! per page, together with the bibliographic metadata WorldCat reports for
//! the identifier.

use crate::client::WorldCatClient;
use crate::error::{HoldingsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Diagnostic URI WorldCat returns for "record does not exist"
pub const NOT_FOUND_URI: &str = "info:srw/diagnostic/1/65";

/// Diagnostic message marking the end of pagination
const OUT_OF_RANGE_MESSAGE: &str = "First position out of range";

/// Libraries per page (service maximum)
const PAGE_SIZE: usize = 100;

/// Identifier type used for a Library Locations request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Isbn,
    Oclc,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Isbn => "isbn",
            IdentifierKind::Oclc => "oclc",
        }
    }

    fn path(&self, identifier: &str) -> String {
        match self {
            IdentifierKind::Isbn => format!("webservices/catalog/content/libraries/isbn/{}", identifier),
            IdentifierKind::Oclc => format!("webservices/catalog/content/libraries/{}", identifier),
        }
    }
}

/// A holding library as reported by WorldCat.
///
/// Fields other than the ones used for de-duplication and aggregation are
/// kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(rename = "institutionName", default)]
    pub institution_name: String,
    #[serde(rename = "oclcSymbol", default)]
    pub oclc_symbol: String,
    #[serde(default)]
    pub country: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Work metadata returned alongside library locations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// ISBN or OCLC number that was searched
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub date: String,
    pub oclc_number: String,
    /// Empty when the response provides no ISBNs
    pub isbn: Vec<String>,
    pub number_of_libraries: usize,
}

impl ResponseMetadata {
    fn from_response(identifier: &str, data: &Value) -> Self {
        let isbn = match data.get("ISBN") {
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(other) => vec![value_to_string(other)],
            None => Vec::new(),
        };

        Self {
            identifier: identifier.to_string(),
            title: field(data, "title"),
            author: field(data, "author"),
            publisher: field(data, "publisher"),
            date: field(data, "date"),
            oclc_number: field(data, "OCLCnumber"),
            isbn,
            number_of_libraries: 0,
        }
    }
}

/// Result of looking up a single identifier
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Metadata and every holding library (possibly none)
    Found {
        metadata: ResponseMetadata,
        libraries: Vec<Library>,
    },
    /// WorldCat answered with a diagnostic URI instead of data
    NotFound(String),
    /// Any other diagnostic or malformed response
    Unexpected(String),
}

/// Combined results for all identifiers of one title
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierResults {
    /// Identifiers actually requested, in order
    pub searched: Vec<String>,
    /// Metadata per identifier that returned data
    pub metadata: Vec<ResponseMetadata>,
    /// All libraries across identifiers (may contain duplicates)
    pub libraries: Vec<Library>,
    pub at_api_limit: bool,
}

/// Request parameters for one page
fn page_params(start_library: usize, frbr_grouping: bool) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("format", "json".to_string()),
        ("servicelevel", "default".to_string()),
        ("maximumLibraries", PAGE_SIZE.to_string()),
        ("startLibrary", start_library.to_string()),
    ];
    if !frbr_grouping {
        params.push(("frbrGrouping", "off".to_string()));
    }
    params
}

/// Look up all holding libraries for one identifier, following pagination.
///
/// # Errors
///
/// Propagates [`HoldingsError::ApiLimit`] and network/cache failures.
pub async fn collect_data_for_identifier(
    client: &mut WorldCatClient,
    identifier: &str,
    kind: IdentifierKind,
    frbr_grouping: bool,
) -> Result<LookupOutcome> {
    let url = client.endpoint(&kind.path(identifier));
    let mut start_library = 1;
    let mut metadata: Option<ResponseMetadata> = None;
    let mut libraries: Vec<Library> = Vec::new();

    loop {
        let response = client.get_cached(&url, &page_params(start_library, frbr_grouping)).await?;
        let data = response
            .as_json()
            .ok_or_else(|| HoldingsError::Parse(format!("Library Locations response for {} is not JSON", identifier)))?;

        if let Some(uri) = top_level_diagnostic(data) {
            if uri != NOT_FOUND_URI {
                warn!(identifier = identifier, uri = %uri, "Unexpected result; check cache");
            }
            return Ok(LookupOutcome::NotFound(uri));
        }

        let page = match data.get("library").and_then(Value::as_array) {
            Some(page) if !page.is_empty() => page,
            _ => {
                warn!(identifier = identifier, "Response has no library list; check cache");
                return Ok(LookupOutcome::Unexpected("Response has no library list".to_string()));
            }
        };

        if let Some(diagnostic) = page[0].get("diagnostic") {
            let message = field(diagnostic, "message");
            let uri = field(diagnostic, "uri");

            if uri == NOT_FOUND_URI {
                debug!(identifier = identifier, "Record exists but has no holdings");
                return Ok(LookupOutcome::Found {
                    metadata: ResponseMetadata::from_response(identifier, data),
                    libraries: Vec::new(),
                });
            } else if message == OUT_OF_RANGE_MESSAGE {
                break;
            } else {
                warn!(identifier = identifier, message = %message, "Unexpected result; check cache");
                return Ok(LookupOutcome::Unexpected(message));
            }
        }

        if metadata.is_none() {
            metadata = Some(ResponseMetadata::from_response(identifier, data));
        }
        for entry in page {
            libraries.push(serde_json::from_value(entry.clone())?);
        }
        start_library += PAGE_SIZE;
    }

    match metadata {
        Some(mut metadata) => {
            metadata.number_of_libraries = libraries.len();
            debug!(identifier = identifier, libraries = libraries.len(), "Collected libraries");
            Ok(LookupOutcome::Found { metadata, libraries })
        }
        None => {
            warn!(identifier = identifier, "Pagination ended before any libraries were returned");
            Ok(LookupOutcome::Unexpected(OUT_OF_RANGE_MESSAGE.to_string()))
        }
    }
}

/// Look up every identifier of a title and combine the results.
///
/// Stops at the API limit, reporting it through `at_api_limit`; the
/// identifier that hit the limit is still listed as searched.
pub async fn collect_libraries_for_identifiers(
    client: &mut WorldCatClient,
    identifiers: &[String],
    kind: IdentifierKind,
    frbr_grouping: bool,
) -> Result<IdentifierResults> {
    let mut results = IdentifierResults::default();

    for identifier in identifiers {
        results.searched.push(identifier.clone());

        match collect_data_for_identifier(client, identifier, kind, frbr_grouping).await {
            Ok(LookupOutcome::Found { metadata, libraries }) => {
                results.metadata.push(metadata);
                results.libraries.extend(libraries);
            }
            Ok(LookupOutcome::NotFound(uri)) => {
                if uri == NOT_FOUND_URI {
                    info!(identifier = %identifier, kind = kind.as_str(), "No records found");
                }
            }
            Ok(LookupOutcome::Unexpected(_)) => {}
            Err(HoldingsError::ApiLimit) => {
                results.at_api_limit = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(results)
}

/// Diagnostic URI from a `diagnostic` or `diagnostics.diagnostic` object
fn top_level_diagnostic(data: &Value) -> Option<String> {
    data.get("diagnostic")
        .or_else(|| data.get("diagnostics").and_then(|d| d.get("diagnostic")))
        .map(|d| field(d, "uri"))
}

fn field(data: &Value, key: &str) -> String {
    data.get(key).map(value_to_string).unwrap_or_default()
}

fn value_to_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RequestCache;
    use crate::client::ClientConfig;
    use mockito::{Matcher, Server, ServerGuard};
    use std::time::Duration;
    use tempfile::TempDir;

    fn client_for(server: &ServerGuard, dir: &TempDir) -> WorldCatClient {
        let config = ClientConfig {
            wskey: "k".to_string(),
            base_url: server.url(),
            timeout: Duration::from_secs(5),
        };
        WorldCatClient::new(config, RequestCache::load(dir.path().join("cache.json"))).expect("client")
    }

    fn libraries_json(start: usize, count: usize) -> String {
        let libs: Vec<Value> = (start..start + count)
            .map(|i| serde_json::json!({"institutionName": format!("Lib {}", i), "oclcSymbol": format!("S{}", i), "country": "Japan"}))
            .collect();
        serde_json::json!({
            "title": "Rice and reform",
            "author": "Smith, John",
            "publisher": "University of Michigan Press",
            "date": "1990",
            "OCLCnumber": "42",
            "library": libs,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_paginates_until_out_of_range() {
        let mut server = Server::new_async().await;
        let path = "/webservices/catalog/content/libraries/isbn/111";
        let _p1 = server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded("startLibrary".into(), "1".into()))
            .with_body(libraries_json(0, 100))
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded("startLibrary".into(), "101".into()))
            .with_body(libraries_json(100, 3))
            .create_async()
            .await;
        let _p3 = server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded("startLibrary".into(), "201".into()))
            .with_body(r#"{"title": "Rice and reform", "library": [{"diagnostic": {"message": "First position out of range", "uri": "info:srw/diagnostic/1/61"}}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        let mut client = client_for(&server, &dir);
        let outcome = collect_data_for_identifier(&mut client, "111", IdentifierKind::Isbn, true)
            .await
            .expect("lookup");

        match outcome {
            LookupOutcome::Found { metadata, libraries } => {
                assert_eq!(libraries.len(), 103);
                assert_eq!(metadata.number_of_libraries, 103);
                assert_eq!(metadata.title, "Rice and reform");
                assert!(metadata.isbn.is_empty());
                assert_eq!(libraries[0].oclc_symbol, "S0");
                assert_eq!(libraries[0].country, "Japan");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_top_level_diagnostic_is_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/webservices/catalog/content/libraries/isbn/222")
            .match_query(Matcher::Any)
            .with_body(r#"{"diagnostics": {"diagnostic": {"uri": "info:srw/diagnostic/1/65", "message": "Record does not exist"}}}"#)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        let mut client = client_for(&server, &dir);
        let outcome = collect_data_for_identifier(&mut client, "222", IdentifierKind::Isbn, true)
            .await
            .expect("lookup");
        assert_eq!(outcome, LookupOutcome::NotFound(NOT_FOUND_URI.to_string()));
    }

    #[tokio::test]
    async fn test_holdings_not_found_keeps_metadata() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/webservices/catalog/content/libraries/333")
            .match_query(Matcher::UrlEncoded("frbrGrouping".into(), "off".into()))
            .with_body(r#"{"title": "Lonely Book", "OCLCnumber": 333, "ISBN": ["9780000000001"], "library": [{"diagnostic": {"message": "Holding not found", "uri": "info:srw/diagnostic/1/65"}}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        let mut client = client_for(&server, &dir);
        let outcome = collect_data_for_identifier(&mut client, "333", IdentifierKind::Oclc, false)
            .await
            .expect("lookup");

        match outcome {
            LookupOutcome::Found { metadata, libraries } => {
                assert!(libraries.is_empty());
                assert_eq!(metadata.oclc_number, "333");
                assert_eq!(metadata.isbn, vec!["9780000000001"]);
                assert_eq!(metadata.number_of_libraries, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_diagnostic_is_unexpected() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/webservices/catalog/content/libraries/444")
            .match_query(Matcher::Any)
            .with_body(r#"{"title": "Odd", "library": [{"diagnostic": {"message": "System temporarily unavailable", "uri": "info:srw/diagnostic/1/1"}}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        let mut client = client_for(&server, &dir);
        let outcome = collect_data_for_identifier(&mut client, "444", IdentifierKind::Oclc, true)
            .await
            .expect("lookup");
        assert_eq!(
            outcome,
            LookupOutcome::Unexpected("System temporarily unavailable".to_string())
        );

        // Unexpected results contribute nothing to the combined results
        let results = collect_libraries_for_identifiers(&mut client, &["444".to_string()], IdentifierKind::Oclc, true)
            .await
            .expect("results");
        assert_eq!(results.searched, vec!["444"]);
        assert!(results.metadata.is_empty());
        assert!(results.libraries.is_empty());
        assert!(!results.at_api_limit);
    }

    #[tokio::test]
    async fn test_missing_or_empty_library_list_is_unexpected() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/webservices/catalog/content/libraries/isbn/555")
            .match_query(Matcher::Any)
            .with_body(r#"{"title": "No list"}"#)
            .create_async()
            .await;
        let _empty = server
            .mock("GET", "/webservices/catalog/content/libraries/isbn/666")
            .match_query(Matcher::Any)
            .with_body(r#"{"title": "Empty list", "library": []}"#)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        let mut client = client_for(&server, &dir);
        for id in ["555", "666"] {
            let outcome = collect_data_for_identifier(&mut client, id, IdentifierKind::Isbn, true)
                .await
                .expect("lookup");
            assert!(
                matches!(outcome, LookupOutcome::Unexpected(_)),
                "{} gave {:?}",
                id,
                outcome
            );
        }
    }

    #[tokio::test]
    async fn test_api_limit_stops_identifier_loop() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/webservices/catalog/content/libraries/isbn/1")
            .match_query(Matcher::UrlEncoded("startLibrary".into(), "1".into()))
            .with_body(libraries_json(0, 2))
            .create_async()
            .await;
        let _end = server
            .mock("GET", "/webservices/catalog/content/libraries/isbn/1")
            .match_query(Matcher::UrlEncoded("startLibrary".into(), "101".into()))
            .with_body(r#"{"library": [{"diagnostic": {"message": "First position out of range", "uri": "x"}}]}"#)
            .create_async()
            .await;
        let _limit = server
            .mock("GET", "/webservices/catalog/content/libraries/isbn/2")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        let mut client = client_for(&server, &dir);
        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let results = collect_libraries_for_identifiers(&mut client, &ids, IdentifierKind::Isbn, true)
            .await
            .expect("results");

        assert!(results.at_api_limit);
        assert_eq!(results.searched, vec!["1", "2"]);
        assert_eq!(results.metadata.len(), 1);
        assert_eq!(results.libraries.len(), 2);
    }

    #[test]
    fn test_library_keeps_extra_fields() {
        let lib: Library = serde_json::from_value(serde_json::json!({
            "institutionName": "Kyoto University",
            "oclcSymbol": "KYU",
            "country": "Japan",
            "city": "Kyoto"
        }))
        .expect("library");
        assert_eq!(lib.extra.get("city").and_then(Value::as_str), Some("Kyoto"));

        let back = serde_json::to_value(&lib).expect("serialize");
        assert_eq!(back["city"], "Kyoto");
        assert_eq!(back["oclcSymbol"], "KYU");
    }
}
