//! Readers for Australian Bureau of Statistics (ABS) and Reserve Bank of
//! Australia (RBA) time-series releases.
//!
//! The publishers expose their data as landing pages of spreadsheet and
//! zip-archive links, with layout conventions instead of schemas. This
//! crate scrapes the links, downloads the files through a transparent
//! on-disk byte cache, parses the workbooks, and assembles the results
//! into period-indexed tables paired with per-series metadata:
//!
//! ```no_run
//! use readabs::{Client, ReadConfig};
//!
//! let client = Client::new()?;
//! let bundle = client.read_abs_cat("6202.0", &ReadConfig::default())?;
//! for (name, table) in &bundle.tables {
//!     println!("{name}: {} series", table.columns().len());
//! }
//! # Ok::<(), readabs::ReadAbsError>(())
//! ```
//!
//! Everything is synchronous and best-effort: one unreadable file is
//! logged and skipped, never fatal to a multi-file request.

mod abs;
mod catalogue;
mod client;
mod error;
mod fetch;
mod helpers;
mod links;
mod metadata;
mod rba;
mod table;
mod workbook;

#[cfg(test)]
pub(crate) mod testkit;

pub use abs::grab_abs_url;
pub use abs::read_abs_cat;
pub use abs::ReadConfig;
pub use abs::ResultBundle;
pub use catalogue::abs_catalogue;
pub use catalogue::abs_catalogue_entry;
pub use catalogue::rba_catalogue;
pub use catalogue::rba_catalogue_entry;
pub use catalogue::AbsCatalogueEntry;
pub use catalogue::RbaCatalogueEntry;
pub use client::Client;
pub use error::ReadAbsError;
pub use fetch::FetchError;
pub use fetch::Fetcher;
pub use fetch::FileCache;
pub use links::get_data_links;
pub use links::scan;
pub use links::LinkSet;
pub use links::LinkType;
pub use metadata::SeriesMetadata;
pub use rba::read_rba_ocr;
pub use rba::read_rba_table;
pub use table::Column;
pub use table::Frequency;
pub use table::Period;
pub use table::Series;
pub use table::Table;
pub use workbook::Grid;
pub use workbook::Value;
pub use workbook::Workbook;
pub use workbook::WorkbookError;
