//! Fetch-by-URL collaborator with transparent on-disk caching.
//!
//! The extraction pipeline only ever asks for "the bytes at this URL"; this
//! module supplies that behind the [`Fetcher`] seam so tests can substitute
//! canned responses and the pipeline stays network-free in unit tests.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure kinds at the fetch boundary. Callers in the extraction pipeline
/// treat every kind as "no data for this link".
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for '{url}'")]
    Http { url: String, status: u16 },

    #[error("network error for '{url}': {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

/// External collaborator contract: fetch raw bytes for a URL.
pub trait Fetcher {
    fn get_file(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Disk-backed fetch cache over a blocking HTTP client.
/// Cache hits never touch the network; misses are written through.
pub struct FileCache {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl FileCache {
    /// Cache directory from `READABS_CACHE_DIR`, falling back to a
    /// temp-dir subdirectory.
    pub fn new() -> Result<FileCache, FetchError> {
        let cache_dir = match env::var_os("READABS_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::temp_dir().join("readabs-cache"),
        };
        Self::with_dir(cache_dir)
    }

    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Result<FileCache, FetchError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("readabs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Network {
                url: String::new(),
                source,
            })?;
        Ok(FileCache { cache_dir, client })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(url))
    }
}

impl Fetcher for FileCache {
    fn get_file(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let path = self.cache_path(url);
        if path.is_file() {
            debug!(url, "cache hit");
            return Ok(fs::read(&path)?);
        }

        debug!(url, "cache miss, downloading");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;
        fs::write(&path, &bytes)?;
        Ok(bytes.to_vec())
    }
}

/// Flattens a URL into a file name the cache directory can hold.
fn cache_file_name(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
