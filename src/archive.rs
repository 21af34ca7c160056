//! # Grid Fetcher
//!
//! Names, locates and (when absent locally) downloads the GFS 0.25° GRIB2
//! file for a `(model run, lead hours)` pair.
//!
//! The local cache file name is a pure function of the pair:
//! `{YYYY}{MM}{DD}{HH}{lead:03}.grib`. A file with that name is taken as
//! proof of a previous successful download; its content is never checked.
//! On a cache miss exactly one GET is issued and, on a 2xx response, the
//! body is written verbatim. A non-2xx response is reported as
//! [`ForecastError::DataNotReady`] and nothing is written, so the next
//! invocation tries the network again.
//!
//! The transport sits behind [`ArchiveClient`] so the fetch logic can run
//! against an in-memory archive.

use crate::error::{ForecastError, ForecastResult};
use crate::storage::{LocalStorage, StorageBackend, StorageError};
use crate::time::{ForecastLeadHours, ModelRun};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production NOMADS directory holding the GFS runs
pub const DEFAULT_ARCHIVE_URL: &str = "https://nomads.ncep.noaa.gov/pub/data/nccf/com/gfs/prod";

/// Extension of cached GRIB files
pub const CACHE_EXTENSION: &str = "grib";

/// Default whole-request timeout; a full 0.25° file is about 500 MB
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Status and body of an archive GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ArchiveResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by [`GridFetcher`] to reach the remote archive
#[async_trait::async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Issues a single GET for `url`.
    ///
    /// A non-success HTTP status is *not* an error at this level; it is
    /// returned in [`ArchiveResponse::status`].
    ///
    /// # Errors
    /// `FetchTimeout` when the transport times out, `Transport` for any
    /// other failure to obtain a response.
    async fn get(&self, url: &str) -> ForecastResult<ArchiveResponse>;
}

#[async_trait::async_trait]
impl<T: ArchiveClient + ?Sized> ArchiveClient for &T {
    async fn get(&self, url: &str) -> ForecastResult<ArchiveResponse> {
        (**self).get(url).await
    }
}

/// HTTP archive client backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpArchive {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpArchive {
    /// Builds a client whose requests fail with `FetchTimeout` after `timeout`.
    pub fn new(timeout: Duration) -> ForecastResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ForecastError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(HttpArchive {
            client,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::with_template(
                    "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})",
                ) {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        }
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> ForecastError {
    if e.is_timeout() {
        ForecastError::FetchTimeout {
            url: url.to_string(),
        }
    } else {
        ForecastError::Transport(format!("{}: {}", url, e))
    }
}

#[async_trait::async_trait]
impl ArchiveClient for HttpArchive {
    async fn get(&self, url: &str) -> ForecastResult<ArchiveResponse> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ArchiveResponse {
                status: status.as_u16(),
                body: Vec::new(),
            });
        }

        let total = response.content_length();
        let progress = self.progress_bar(total);
        let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(url, e))?
        {
            body.extend_from_slice(&chunk);
            progress.inc(chunk.len() as u64);
        }
        progress.finish_and_clear();

        debug!("Received {} bytes from {}", body.len(), url);
        Ok(ArchiveResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Local cache file name for a run and lead, e.g. `2024040812006.grib`
pub fn cache_file_name(run: ModelRun, lead: ForecastLeadHours) -> String {
    format!(
        "{}{}{}.{}",
        run.date_stamp(),
        run.hour_stamp(),
        lead.padded(),
        CACHE_EXTENSION
    )
}

/// Archive URL of the GFS 0.25° file for a run and lead
pub fn archive_url(base_url: &str, run: ModelRun, lead: ForecastLeadHours) -> String {
    let hour = run.hour_stamp();
    format!(
        "{}/gfs.{}/{}/atmos/gfs.t{}z.pgrb2.0p25.f{}",
        base_url.trim_end_matches('/'),
        run.date_stamp(),
        hour,
        hour,
        lead.padded()
    )
}

/// Downloads GRIB files into a local cache directory, at most once each
pub struct GridFetcher<C, S = LocalStorage> {
    client: C,
    storage: S,
    cache_dir: PathBuf,
    base_url: String,
}

impl<C: ArchiveClient> GridFetcher<C, LocalStorage> {
    /// Fetcher caching into `cache_dir` on the local filesystem
    pub fn new(client: C, cache_dir: impl AsRef<Path>, base_url: &str) -> Self {
        GridFetcher::with_storage(client, LocalStorage, cache_dir, base_url)
    }
}

impl<C: ArchiveClient, S: StorageBackend> GridFetcher<C, S> {
    pub fn with_storage(client: C, storage: S, cache_dir: impl AsRef<Path>, base_url: &str) -> Self {
        GridFetcher {
            client,
            storage,
            cache_dir: cache_dir.as_ref().to_path_buf(),
            base_url: base_url.to_string(),
        }
    }

    pub fn cache_path(&self, run: ModelRun, lead: ForecastLeadHours) -> PathBuf {
        self.cache_dir.join(cache_file_name(run, lead))
    }

    pub fn url(&self, run: ModelRun, lead: ForecastLeadHours) -> String {
        archive_url(&self.base_url, run, lead)
    }

    /// Returns the local path of the GRIB file for `run` and `lead`,
    /// downloading it first if it is not cached yet.
    ///
    /// # Errors
    ///
    /// - `DataNotReady` when the archive answers with a non-success status
    /// - `FetchTimeout` / `Transport` when no response could be obtained
    /// - `Storage` when the cache cannot be read or written
    pub async fn fetch(&self, run: ModelRun, lead: ForecastLeadHours) -> ForecastResult<PathBuf> {
        let path = self.cache_path(run, lead);
        let path_str = path
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;

        if self.storage.exists(path_str).await? {
            info!("Already downloaded {}", path.display());
            return Ok(path);
        }

        let url = self.url(run, lead);
        info!("Must download {}", url);
        let response = self.client.get(&url).await?;

        if !response.is_success() {
            warn!("Failed to download {} (HTTP {})", url, response.status);
            return Err(ForecastError::DataNotReady {
                url,
                status: response.status,
            });
        }

        self.storage.write(path_str, &response.body).await?;
        info!(
            "Saved {} bytes to {}",
            response.body.len(),
            path.display()
        );
        Ok(path)
    }
}
