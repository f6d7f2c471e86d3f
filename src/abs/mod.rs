//! ABS catalogue and landing-page readers.
//!
//! [`read_abs_cat`] resolves a catalogue number to its landing page and
//! pulls every data file linked there; [`grab_abs_url`] does the same for
//! an arbitrary page, with finer file-selection controls. Both are
//! best-effort aggregators: one unreadable file is logged and skipped,
//! never fatal to the request. Only resolution failures before any fetch
//! propagate as errors.

mod extract;

use crate::catalogue;
use crate::error::ReadAbsError;
use crate::fetch::Fetcher;
use crate::links;
use crate::links::LinkSet;
use crate::links::LinkType;
use crate::metadata::SeriesMetadata;
use crate::table::Table;
use std::collections::BTreeMap;
use tracing::debug;
use tracing::warn;

/// File-selection controls for one read request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadConfig {
    /// Rewrite discovered links to a dated historical release.
    pub history: Option<String>,
    /// Process zip archive links.
    pub get_zip: bool,
    /// Process standalone workbook links even when archives are present.
    pub get_excel: bool,
    /// Process standalone workbook links when no archive link exists.
    pub get_excel_if_no_zip: bool,
    /// Fetch only the named workbook (file name without extension).
    pub single_excel_only: Option<String>,
    /// Fetch only the named archive (file name without extension).
    pub single_zip_only: Option<String>,
    /// Drop links whose file name contains "pivot".
    pub ignore_pivot: bool,
}

impl Default for ReadConfig {
    fn default() -> ReadConfig {
        ReadConfig {
            history: None,
            get_zip: true,
            get_excel: false,
            get_excel_if_no_zip: true,
            single_excel_only: None,
            single_zip_only: None,
            ignore_pivot: true,
        }
    }
}

impl ReadConfig {
    pub fn history(mut self, tag: impl Into<String>) -> ReadConfig {
        self.history = Some(tag.into());
        self
    }

    pub fn single_excel_only(mut self, name: impl Into<String>) -> ReadConfig {
        self.single_excel_only = Some(name.into());
        self
    }

    pub fn single_zip_only(mut self, name: impl Into<String>) -> ReadConfig {
        self.single_zip_only = Some(name.into());
        self
    }

    /// Stable string form of every field, for result-cache keys.
    pub(crate) fn cache_key(&self) -> String {
        format!(
            "history={:?};zip={};excel={};excel_if_no_zip={};single_excel={:?};single_zip={:?};pivot={}",
            self.history,
            self.get_zip,
            self.get_excel,
            self.get_excel_if_no_zip,
            self.single_excel_only,
            self.single_zip_only,
            self.ignore_pivot,
        )
    }
}

/// Everything one request produced: per-table data keyed by table name,
/// plus the concatenated metadata rows across all tables.
#[derive(Clone, Debug, Default)]
pub struct ResultBundle {
    pub tables: BTreeMap<String, Table>,
    pub metadata: Vec<SeriesMetadata>,
}

impl ResultBundle {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn absorb(&mut self, tables: BTreeMap<String, Table>, metadata: Vec<SeriesMetadata>) {
        // Dictionary semantics: a later same-named table overwrites
        self.tables.extend(tables);
        self.metadata.extend(metadata);
    }
}

/// Reads every data table published under an ABS catalogue number.
/// An unknown catalogue number fails before any fetch is attempted.
pub fn read_abs_cat(
    fetcher: &dyn Fetcher,
    catalogue_id: &str,
    config: &ReadConfig,
) -> Result<ResultBundle, ReadAbsError> {
    let entry = catalogue::abs_catalogue_entry(catalogue_id)
        .ok_or_else(|| ReadAbsError::CatalogueMiss(catalogue_id.to_string()))?;
    grab_abs_url(fetcher, entry.url, config)
}

/// Reads every data table linked from an ABS landing page.
pub fn grab_abs_url(
    fetcher: &dyn Fetcher,
    url: &str,
    config: &ReadConfig,
) -> Result<ResultBundle, ReadAbsError> {
    let links = links::get_data_links(fetcher, url, config.ignore_pivot, config.history.as_deref());
    let mut bundle = ResultBundle::default();
    if links.is_empty() {
        warn!(url, "no data files found");
        return Ok(bundle);
    }

    // Single-file requests short-circuit on first match
    if let Some(target) = &config.single_excel_only {
        if let Some(link) = find_url(&links, LinkType::Xlsx, target) {
            add_excel(fetcher, &mut bundle, &link);
            if !bundle.is_empty() {
                return Ok(bundle);
            }
        }
    }
    if let Some(target) = &config.single_zip_only {
        if let Some(link) = find_url(&links, LinkType::Zip, target) {
            add_zip(fetcher, &mut bundle, &link);
            if !bundle.is_empty() {
                return Ok(bundle);
            }
        }
    }

    // Archives first, they are the authoritative bulk downloads
    let has_zip = !links.get(LinkType::Zip).is_empty();
    for (kind, urls) in links.iter() {
        match kind {
            LinkType::Zip if config.get_zip => {
                for link in urls {
                    add_zip(fetcher, &mut bundle, link);
                }
            }
            LinkType::Xlsx => {
                let wanted = config.get_excel
                    || (config.get_excel_if_no_zip && (!config.get_zip || !has_zip));
                if wanted {
                    for link in urls {
                        add_excel(fetcher, &mut bundle, link);
                    }
                }
            }
            LinkType::Xls => {
                debug!(count = urls.len(), "ignoring legacy workbook links");
            }
            _ => {}
        }
    }
    Ok(bundle)
}

/// Finds the discovered link whose file name matches `{target}{suffix}`.
fn find_url(links: &LinkSet, kind: LinkType, target: &str) -> Option<String> {
    let goal = format!("{target}{}", kind.suffix());
    links
        .get(kind)
        .iter()
        .find(|link| link.ends_with(&goal))
        .cloned()
}

/// Fetches and unpacks one archive link into the bundle. Failures are
/// logged and the bundle is left as it was.
fn add_zip(fetcher: &dyn Fetcher, bundle: &mut ResultBundle, link: &str) {
    let bytes = match fetcher.get_file(link) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(link, %error, "skipping unfetchable archive");
            return;
        }
    };
    match extract::extract_archive(bytes) {
        Ok((tables, metadata)) => bundle.absorb(tables, metadata),
        Err(error) => warn!(link, %error, "skipping unreadable archive"),
    }
}

/// Fetches and extracts one standalone workbook link into the bundle.
fn add_excel(fetcher: &dyn Fetcher, bundle: &mut ResultBundle, link: &str) {
    let table_name = links::table_name(link);
    if bundle.tables.contains_key(&table_name) {
        return;
    }
    let bytes = match fetcher.get_file(link) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(link, %error, "skipping unfetchable workbook");
            return;
        }
    };
    match extract::extract_workbook(bytes, &table_name) {
        Ok(Some(extraction)) => {
            bundle.metadata.extend(extraction.metadata);
            bundle.tables.insert(table_name, extraction.table);
        }
        Ok(None) => {}
        Err(error) => warn!(link, %error, "skipping unreadable workbook"),
    }
}
