//! Downloads through a real Chrome, driven over WebDriver.
//!
//! Chrome is pointed at the download endpoint and saves the file into the
//! download directory on its own, writing `*.crdownload` while it does. The
//! session is opened on the first fetch and closed once the directory settles.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use thirtyfour::ChromeCapabilities;
use thirtyfour::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ApkSource, FetchError, settle};
use crate::state_machine::PatchJob;

pub struct ChromeFetcher {
    webdriver_url: String,
    base_url: String,
    location: PathBuf,
    headless: bool,
    poll_interval: Duration,
    settle_delay: Duration,
    driver: Mutex<Option<WebDriver>>,
}

impl ChromeFetcher {
    /// `webdriver_url` is where chromedriver listens, e.g. `http://localhost:4444`.
    pub fn new(
        webdriver_url: &str,
        base_url: &str,
        location: PathBuf,
        headless: bool,
        poll_interval: Duration,
        settle_delay: Duration,
    ) -> Result<Self, FetchError> {
        std::fs::create_dir_all(&location)?;
        // Chrome wants an absolute download directory.
        let location = std::path::absolute(&location)?;
        Ok(Self {
            webdriver_url: webdriver_url.to_string(),
            base_url: base_url.to_string(),
            location,
            headless,
            poll_interval,
            settle_delay,
            driver: Mutex::new(None),
        })
    }

    pub fn url_for(&self, job: &PatchJob) -> String {
        job.download_url(&self.base_url)
    }

    /// Chrome preferences that send every download to the download directory
    /// without prompting.
    fn download_prefs(&self) -> Value {
        json!({
            "download.default_directory": self.location.to_string_lossy(),
            "download.prompt_for_download": false,
            "download.directory_upgrade": true,
            "safebrowsing.enabled": true,
        })
    }

    fn capabilities(&self) -> WebDriverResult<ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_chrome_option("prefs", self.download_prefs())?;
        if self.headless {
            caps.set_headless()?;
        }
        Ok(caps)
    }

    async fn quit(&self) -> Result<(), FetchError> {
        let driver = self.driver.lock().await.take();
        if let Some(driver) = driver {
            debug!("closing browser session");
            driver.quit().await?;
        }
        Ok(())
    }
}

impl ApkSource for ChromeFetcher {
    fn download_dir(&self) -> &Path {
        &self.location
    }

    async fn fetch(&self, job: &PatchJob) -> Result<(), FetchError> {
        let url = self.url_for(job);
        let mut driver = self.driver.lock().await;
        if driver.is_none() {
            info!(webdriver = %self.webdriver_url, "starting browser session");
            let session = WebDriver::new(&self.webdriver_url, self.capabilities()?).await?;
            *driver = Some(session);
        }
        if let Some(driver) = driver.as_ref() {
            debug!(%job, %url, "opening download page");
            driver.goto(&url).await?;
        }
        Ok(())
    }

    async fn wait_settle(&self) -> Result<(), FetchError> {
        let settled = settle(&self.location, self.poll_interval, self.settle_delay).await;
        // The browser goes away whether or not the directory could be read.
        self.quit().await?;
        settled?;
        Ok(())
    }
}
