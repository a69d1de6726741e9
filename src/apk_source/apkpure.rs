//! Direct HTTP downloads from APKPure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;
use tracing::debug;

use super::{ApkSource, FetchError, PARTIAL_SUFFIX, settle};
use crate::state_machine::PatchJob;
use crate::transfer;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Downloads APKs from APKPure's `/b/APK/<package>?version=` endpoint.
pub struct ApkPureFetcher {
    client: Client,
    base_url: String,
    location: PathBuf,
    poll_interval: Duration,
    settle_delay: Duration,
}

impl ApkPureFetcher {
    pub fn new(
        base_url: &str,
        location: PathBuf,
        poll_interval: Duration,
        settle_delay: Duration,
    ) -> Result<Self, FetchError> {
        std::fs::create_dir_all(&location)?;
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            location,
            poll_interval,
            settle_delay,
        })
    }

    pub fn url_for(&self, job: &PatchJob) -> String {
        job.download_url(&self.base_url)
    }
}

impl ApkSource for ApkPureFetcher {
    fn download_dir(&self) -> &Path {
        &self.location
    }

    async fn fetch(&self, job: &PatchJob) -> Result<(), FetchError> {
        let url = self.url_for(job);
        debug!(%job, %url, "downloading APK");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| fallback_file_name(job));

        let dest = self.location.join(file_name);
        let partial = transfer::with_suffix(&dest, PARTIAL_SUFFIX);
        transfer::stream_to_file::<FetchError>(response, &partial, &dest).await?;
        Ok(())
    }

    async fn wait_settle(&self) -> Result<(), FetchError> {
        settle(&self.location, self.poll_interval, self.settle_delay).await?;
        Ok(())
    }
}

/// Extract a safe file name from a `Content-Disposition` header value.
fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    // Keep only the last path component.
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

fn fallback_file_name(job: &PatchJob) -> String {
    format!("{}-{}.apk", job.package_id, job.version_or_latest())
}
