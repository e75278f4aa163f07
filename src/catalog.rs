//! Input catalogs: the reference title records and the hand-curated list of
//! "tricky" titles whose ISBN results are known to be unreliable.

use crate::error::{HoldingsError, Result};
use crate::ordered::OrderedMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Record keys excluded from analysis
pub const EXCLUDED_RECORD_KEYS: &[&str] = &["191", "241", "245", "259", "265", "266", "308", "365"];

/// ISBN column values that are placeholders rather than identifiers
const ISBN_PLACEHOLDERS: &[&str] = &["", "PB Only", "Paper Only", "See rights column", "N/A", "Not Available"];

/// Subtitle values meaning "no subtitle"
const NO_SUBTITLE: &[&str] = &["N/A", ""];

/// One title from the reference catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitleRecord {
    #[serde(rename = "Prefix", default)]
    pub prefix: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Subtitle", default)]
    pub subtitle: String,
    #[serde(rename = "Imprint", default)]
    pub imprint: String,
    #[serde(rename = "Author 1 - Last", default)]
    pub author_last: String,
    #[serde(rename = "HC ISBN", default)]
    pub hc_isbn: String,
    #[serde(rename = "PB ISBN", default)]
    pub pb_isbn: String,
    #[serde(rename = "EB ISBN", default)]
    pub eb_isbn: String,
    #[serde(rename = "EB (OA) ISBN", default)]
    pub eb_oa_isbn: String,
}

impl TitleRecord {
    /// Real ISBNs in column order (hardcover, paperback, ebook, open-access ebook)
    pub fn isbns(&self) -> Vec<String> {
        [&self.hc_isbn, &self.pb_isbn, &self.eb_isbn, &self.eb_oa_isbn]
            .into_iter()
            .filter(|isbn| !ISBN_PLACEHOLDERS.contains(&isbn.as_str()))
            .cloned()
            .collect()
    }

    /// Subtitle, unless it is a placeholder
    pub fn subtitle(&self) -> Option<&str> {
        if NO_SUBTITLE.contains(&self.subtitle.as_str()) {
            None
        } else {
            Some(&self.subtitle)
        }
    }

    /// Title and subtitle separated by a space
    pub fn full_title(&self) -> String {
        match self.subtitle() {
            Some(subtitle) => format!("{} {}", self.title, subtitle),
            None => self.title.clone(),
        }
    }
}

/// Ordered collection of title records, keyed by unique identifier
#[derive(Debug, Clone, Default)]
pub struct TitleCatalog {
    records: OrderedMap<TitleRecord>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(rename = "Title Records")]
    records: OrderedMap<TitleRecord>,
}

impl TitleCatalog {
    /// Load `{"Title Records": {key: record, ...}}`, keeping file order
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        info!(records = catalog.len(), path = ?path, "Loaded title catalog");
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Ok(Self { records: file.records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TitleRecord> {
        self.records.get(key)
    }

    /// Records in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TitleRecord)> {
        self.records.iter()
    }
}

impl FromIterator<(String, TitleRecord)> for TitleCatalog {
    fn from_iter<I: IntoIterator<Item = (String, TitleRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// How OCLC numbers are obtained for a tricky title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMethod {
    /// Search the Bibliographic Resource (SRU) service
    Bibliographic,
    /// Use the OCLC numbers listed in the CSV
    Manual,
}

impl CollectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMethod::Bibliographic => "Bibliographic",
            CollectionMethod::Manual => "Manual",
        }
    }
}

/// Instructions for a title whose ISBN results are unreliable
#[derive(Debug, Clone, PartialEq)]
pub struct TrickyTitle {
    pub method: CollectionMethod,
    /// Raw "Bibliographic Resource - FRBR Grouping" value
    pub bibliographic_frbr: String,
    /// Raw "Library Locations - FRBR Grouping" value
    pub library_frbr: String,
    pub oclc_numbers: Vec<String>,
}

impl TrickyTitle {
    pub fn bibliographic_frbr_grouping(&self) -> bool {
        frbr_flag(&self.bibliographic_frbr)
    }

    pub fn library_frbr_grouping(&self) -> bool {
        frbr_flag(&self.library_frbr)
    }
}

/// Parse a "TRUE"/"FALSE" FRBR grouping cell
pub fn parse_frbr(value: &str) -> Option<bool> {
    match value {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    }
}

/// FRBR grouping is only switched off by an explicit "FALSE"
fn frbr_flag(value: &str) -> bool {
    parse_frbr(value).unwrap_or_else(|| {
        warn!(value = value, "FRBR value not valid, keeping grouping on");
        true
    })
}

/// Tricky titles keyed by record key
#[derive(Debug, Clone, Default)]
pub struct TrickyTitles {
    titles: HashMap<String, TrickyTitle>,
}

impl TrickyTitles {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let titles = Self::from_reader(file)?;
        info!(titles = titles.len(), path = ?path, "Loaded tricky titles");
        Ok(titles)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let column = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| HoldingsError::Parse(format!("tricky titles CSV has no '{}' column", name)))
        };
        let method_col = column("Bibliographic/Manual")?;
        let bib_col = column("Bibliographic Resource - FRBR Grouping")?;
        let lib_col = column("Library Locations - FRBR Grouping")?;
        let oclc_col = column("OCLC Numbers")?;

        let mut titles = HashMap::new();
        for row in rdr.records() {
            let row = row?;
            let field = |i: usize| row.get(i).unwrap_or("").to_string();
            let key = field(0);

            let method = match field(method_col).as_str() {
                "Bibliographic" => CollectionMethod::Bibliographic,
                "Manual" => CollectionMethod::Manual,
                other => {
                    return Err(HoldingsError::Validation(format!(
                        "record {}: unknown collection method '{}'",
                        key, other
                    )))
                }
            };

            let oclc_numbers = field(oclc_col)
                .split("; ")
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();

            titles.insert(
                key,
                TrickyTitle {
                    method,
                    bibliographic_frbr: field(bib_col),
                    library_frbr: field(lib_col),
                    oclc_numbers,
                },
            );
        }

        Ok(Self { titles })
    }

    pub fn get(&self, key: &str) -> Option<&TrickyTitle> {
        self.titles.get(key)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl FromIterator<(String, TrickyTitle)> for TrickyTitles {
    fn from_iter<I: IntoIterator<Item = (String, TrickyTitle)>>(iter: I) -> Self {
        Self {
            titles: iter.into_iter().collect(),
        }
    }
}
