//! # worldcat-holdings
//!
//! WorldCat library holdings pipeline for a fixed title catalog.
//!
//! ## Modules
//!
//! - [`cache`] - Persistent request/response cache
//! - [`client`] - WorldCat HTTP access through the cache
//! - [`locations`] - Library Locations lookups by ISBN or OCLC number
//! - [`bibliographic`] - SRU title search for OCLC numbers
//! - [`marc`] - MARC XML parsing for SRU responses
//! - [`matching`] - Fuzzy title, imprint and author reconciliation
//! - [`regions`] - Country to region table
//! - [`analysis`] - Per-title country and region counts
//! - [`catalog`] - Title catalog and tricky-titles inputs
//! - [`pipeline`] - Holdings gathering driver
//! - [`report`] - Results CSV
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use worldcat_holdings::cache::RequestCache;
//! use worldcat_holdings::catalog::{TitleCatalog, TrickyTitles};
//! use worldcat_holdings::client::{ClientConfig, WorldCatClient};
//! use worldcat_holdings::{pipeline, regions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = RequestCache::load("worldcat_search_cache.json");
//!     let mut client = WorldCatClient::new(ClientConfig::new("my-wskey"), cache)?;
//!     let regions = regions::fetch_region_table(&mut client, regions::DEFAULT_REGIONS_URL).await?;
//!
//!     let catalog = TitleCatalog::load(Path::new("inputs/neh_title_records.json"))?;
//!     let tricky = TrickyTitles::load(Path::new("inputs/tricky_titles.csv"))?;
//!     let report = pipeline::gather(&mut client, &catalog, &tricky, &regions, 372).await;
//!     pipeline::write_stats(Path::new("outputs/worldcat_stats.json"), &report.stats)?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod bibliographic;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod error;
pub mod locations;
pub mod marc;
pub mod matching;
pub mod ordered;
pub mod pipeline;
pub mod regions;
pub mod report;

pub use error::{HoldingsError, Result};
