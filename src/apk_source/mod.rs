//! Where APKs come from.
//!
//! [`ApkSource`] is the narrow contract the orchestrator needs: start a
//! download for a [`PatchJob`], then wait until the download directory has
//! settled. Two implementations exist. [`ChromeFetcher`] drives a real Chrome
//! through WebDriver and lets the browser drop files into the download
//! directory. [`ApkPureFetcher`] talks to the same endpoint over plain HTTP and
//! writes `*.crdownload` partials the way Chromium does, so the settle logic is
//! shared.

mod apkpure;
mod chrome;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use thirtyfour::prelude::WebDriverError;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::state_machine::PatchJob;

pub use apkpure::ApkPureFetcher;
pub use chrome::ChromeFetcher;

/// Suffix marking a download that has not finished yet.
pub const PARTIAL_SUFFIX: &str = ".crdownload";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("browser error: {0}")]
    Browser(#[from] WebDriverError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ApkSource {
    /// Directory downloads land in.
    fn download_dir(&self) -> &Path;

    /// Start downloading the package described by `job`.
    async fn fetch(&self, job: &PatchJob) -> Result<(), FetchError>;

    /// Block until no partial downloads remain, then wait out the settle delay.
    async fn wait_settle(&self) -> Result<(), FetchError>;
}

/// Which [`ApkSource`] a run downloads through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Chrome driven over WebDriver.
    #[default]
    Chrome,
    /// Direct HTTP requests with a browser user agent.
    Http,
}

/// The configured download backend.
pub enum Downloader {
    Chrome(ChromeFetcher),
    Http(ApkPureFetcher),
}

impl Downloader {
    pub fn from_config(config: &BotConfig, location: PathBuf) -> Result<Self, FetchError> {
        let downloader = match config.download_backend {
            Backend::Chrome => Downloader::Chrome(ChromeFetcher::new(
                &config.webdriver_url,
                &config.apk_base_url,
                location,
                config.headless,
                config.poll_interval(),
                config.settle_delay(),
            )?),
            Backend::Http => Downloader::Http(ApkPureFetcher::new(
                &config.apk_base_url,
                location,
                config.poll_interval(),
                config.settle_delay(),
            )?),
        };
        Ok(downloader)
    }
}

impl ApkSource for Downloader {
    fn download_dir(&self) -> &Path {
        match self {
            Downloader::Chrome(f) => f.download_dir(),
            Downloader::Http(f) => f.download_dir(),
        }
    }

    async fn fetch(&self, job: &PatchJob) -> Result<(), FetchError> {
        match self {
            Downloader::Chrome(f) => f.fetch(job).await,
            Downloader::Http(f) => f.fetch(job).await,
        }
    }

    async fn wait_settle(&self) -> Result<(), FetchError> {
        match self {
            Downloader::Chrome(f) => f.wait_settle().await,
            Downloader::Http(f) => f.wait_settle().await,
        }
    }
}

/// Poll `dir` until it holds no partials, then sleep for `settle_delay`.
pub async fn settle(
    dir: &Path,
    poll_interval: Duration,
    settle_delay: Duration,
) -> std::io::Result<()> {
    loop {
        let pending = pending_downloads(dir)?;
        if pending == 0 {
            break;
        }
        debug!(pending, "downloads still in progress");
        sleep(poll_interval).await;
    }
    info!(
        delay_secs = settle_delay.as_secs(),
        "downloads finished, waiting for late renames"
    );
    sleep(settle_delay).await;
    Ok(())
}

/// Delete partials left behind by an interrupted run. Nothing can still be
/// writing to them before this run starts fetching.
pub fn clear_partials(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if is_partial(&entry.path()) && entry.file_type()?.is_file() {
            warn!(path = %entry.path().display(), "removing stale partial download");
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Number of partial-download markers in `dir`.
pub fn pending_downloads(dir: &Path) -> std::io::Result<usize> {
    let mut pending = 0;
    for entry in std::fs::read_dir(dir)? {
        if is_partial(&entry?.path()) {
            pending += 1;
        }
    }
    Ok(pending)
}

/// Completed downloads in `dir`, sorted by name.
pub fn list_downloads(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if is_partial(&path) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn is_partial(path: &Path) -> bool {
    path.to_string_lossy().ends_with(PARTIAL_SUFFIX)
}
