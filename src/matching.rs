//! Fuzzy reconciliation of WorldCat records against the title catalog.
//!
//! These are deliberately loose heuristics: normalized substring checks with a
//! token-overlap fallback for titles, and a few publisher spellings for
//! imprints (every catalog title is a University of Michigan publication).

use crate::catalog::TitleRecord;
use crate::locations::ResponseMetadata;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Share of catalog title tokens that must appear in the other title
const TITLE_TOKEN_THRESHOLD: f64 = 0.75;

const ASCII_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

const LEADING_ARTICLES: &[&str] = &["the", "a", "an"];

/// Lowercase, strip punctuation, split into tokens
fn title_tokens(title: &str, extra_removals: &[&str]) -> Vec<String> {
    let mut lowered = title.to_lowercase();
    for pattern in ["\"", ",", ".", ":"].iter().chain(extra_removals) {
        lowered = lowered.replace(pattern, "");
    }
    lowered
        .replace('-', " ")
        .split_whitespace()
        // Stray punctuation runs such as "&" or "()" are not words
        .filter(|word| !ASCII_PUNCTUATION.contains(word))
        .map(String::from)
        .collect()
}

/// Decide whether `other_title` names the same work as `record_title`.
///
/// After normalization, the titles match if either contains the other, or if
/// at least 75% of the catalog title's tokens occur in the other title. A
/// leading article is ignored on the other title. Empty titles never match.
pub fn compare_titles(record_title: &str, other_title: &str) -> bool {
    let record_tokens = title_tokens(record_title, &[]);
    let mut other_tokens = title_tokens(other_title, &["&quot;"]);
    if other_tokens
        .first()
        .is_some_and(|first| LEADING_ARTICLES.contains(&first.as_str()))
    {
        other_tokens.remove(0);
    }

    if record_tokens.is_empty() || other_tokens.is_empty() {
        return false;
    }

    let record = record_tokens.join(" ");
    let other = other_tokens.join(" ");
    if record.contains(&other) || other.contains(&record) {
        return true;
    }

    let other_set: HashSet<&str> = other_tokens.iter().map(String::as_str).collect();
    let shared = record_tokens
        .iter()
        .filter(|token| other_set.contains(token.as_str()))
        .count();

    shared as f64 / record_tokens.len() as f64 >= TITLE_TOKEN_THRESHOLD
}

/// Decide whether a WorldCat imprint/publisher matches the catalog imprint.
///
/// Matches when the normalized catalog imprint occurs in the other value, or
/// the other value names the University of Michigan or Ann Arbor, Michigan.
pub fn compare_imprints(record_imprint: &str, other_imprint: &str) -> bool {
    let record = record_imprint.to_lowercase().replace("um ", "").replace("u of m", "");
    let other = other_imprint
        .to_lowercase()
        .replace("univ.", "university")
        .replace("univ ", "university ")
        .replace("mich.", "michigan")
        .replace("centre", "center")
        .replace(',', "");

    other.contains(&record)
        || other.contains("university of michigan")
        || (other.contains("ann arbor") && other.contains("michigan"))
}

/// Result of checking response metadata against a catalog record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchCheck {
    /// False if any check failed for any identifier
    pub matched: bool,
    /// Identifier -> check name -> "<found> did not match <expected>"
    pub failures: BTreeMap<String, BTreeMap<String, String>>,
}

/// Compare title, publisher and author of each identifier's metadata with the record
pub fn check_for_metadata_match(record: &TitleRecord, metadata: &[ResponseMetadata]) -> MatchCheck {
    let mut check = MatchCheck {
        matched: true,
        failures: BTreeMap::new(),
    };

    for found in metadata {
        let mut record_title = record.title.clone();
        let mut found_title = found.title.as_str();
        if found_title.contains(':') {
            match record.subtitle() {
                Some(subtitle) => record_title = format!("{}: {}", record_title, subtitle),
                None => found_title = found_title.split(':').next().unwrap_or_default(),
            }
        }

        let title_ok = compare_titles(&record_title, found_title);
        let publisher_ok = compare_imprints(&record.imprint, &found.publisher);
        let author_ok = found
            .author
            .to_lowercase()
            .contains(&record.author_last.to_lowercase());

        let failures = check.failures.entry(found.identifier.clone()).or_default();
        if !title_ok {
            failures.insert("Title".to_string(), format!("{} did not match {}", found.title, record.title));
        }
        if !author_ok {
            failures.insert(
                "Author".to_string(),
                format!("{} did not match {}", found.author, record.author_last),
            );
        }
        if !publisher_ok {
            failures.insert(
                "Publisher".to_string(),
                format!("{} did not match {}", found.publisher, record.imprint),
            );
        }

        if !(title_ok && publisher_ok && author_ok) {
            check.matched = false;
        }
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_titles_containment() {
        assert!(compare_titles("Rice and Reform", "The rice and reform: village politics"));
        assert!(compare_titles("Chinese Village Politics in the Malaysian State", "Chinese village politics"));
        assert!(compare_titles("Japan's \"Economic Miracle\"", "Japan's economic miracle."));
    }

    #[test]
    fn test_compare_titles_token_ratio() {
        // 3 of 4 catalog tokens present
        assert!(compare_titles("Women in Meiji Japan", "Meiji women of Japan"));
        // 2 of 4
        assert!(!compare_titles("Women in Meiji Japan", "Meiji era women"));
    }

    #[test]
    fn test_compare_titles_counts_repeated_words() {
        // "the" occurs twice in the catalog title and counts twice
        assert!(compare_titles("The Land and the People", "People, the land"));
    }

    #[test]
    fn test_compare_titles_strips_article_and_entities() {
        assert!(compare_titles("Story of Stone", "A &quot;Story of Stone&quot;"));
        assert!(compare_titles("Post-war Korea", "Post war Korea: a history"));
    }

    #[test]
    fn test_compare_titles_empty_never_matches() {
        assert!(!compare_titles("", "Anything"));
        assert!(!compare_titles("Anything", "The"));
        // A bare article is not a wildcard
        assert!(!compare_titles("the the the", "the"));
    }

    #[test]
    fn test_compare_imprints() {
        assert!(compare_imprints("UM Center for Japanese Studies", "Center for Japanese Studies, Univ. of Michigan"));
        assert!(compare_imprints("Center for Chinese Studies", "Centre for Chinese Studies"));
        assert!(compare_imprints("Some Press", "Ann Arbor, Mich. : Some Other Press"));
        assert!(!compare_imprints("Center for Korean Studies", "Harvard University Press"));
    }

    fn record() -> TitleRecord {
        TitleRecord {
            title: "Rice and Reform".to_string(),
            subtitle: "Village Politics".to_string(),
            imprint: "Center for Chinese Studies".to_string(),
            author_last: "Smith".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_metadata_match_passes() {
        let found = ResponseMetadata {
            identifier: "111".to_string(),
            title: "Rice and reform : village politics".to_string(),
            author: "John Smith".to_string(),
            publisher: "Center for Chinese Studies, The University of Michigan".to_string(),
            ..Default::default()
        };
        let check = check_for_metadata_match(&record(), &[found]);
        assert!(check.matched);
        assert!(check.failures["111"].is_empty());
    }

    #[test]
    fn test_metadata_match_reports_failures() {
        let found = ResponseMetadata {
            identifier: "222".to_string(),
            title: "An unrelated cookbook".to_string(),
            author: "Jones, Mary".to_string(),
            publisher: "Center for Chinese Studies".to_string(),
            ..Default::default()
        };
        let check = check_for_metadata_match(&record(), &[found]);
        assert!(!check.matched);

        let failures = &check.failures["222"];
        assert_eq!(failures.len(), 2);
        assert_eq!(failures["Title"], "An unrelated cookbook did not match Rice and Reform");
        assert_eq!(failures["Author"], "Jones, Mary did not match Smith");
    }

    #[test]
    fn test_found_title_cut_at_colon_without_subtitle() {
        let mut record = record();
        record.subtitle = "N/A".to_string();
        let found = ResponseMetadata {
            identifier: "333".to_string(),
            title: "Rice and reform: a completely different long subtitle here".to_string(),
            author: "Smith".to_string(),
            publisher: "University of Michigan".to_string(),
            ..Default::default()
        };
        assert!(check_for_metadata_match(&record, &[found]).matched);
    }
}
