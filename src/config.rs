//! Configuration loaded from `revancedbot.toml`.
//!
//! Every field has a default, so a missing file (or a partial one) is fine.
//! `GITHUB_TOKEN` and `REVANCEDBOT_ROOT` take precedence over the file, and CLI
//! flags are applied on top by `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::apk_source::Backend;

pub const DEFAULT_CONFIG_FILE: &str = "revancedbot.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Staging root holding the toolchain and the APK directories.
    pub root: PathBuf,

    /// Java launcher used to run the patcher jar.
    pub java: PathBuf,

    /// Repository publishing the patch bundle (`.rvp`).
    pub patches_repo: String,

    /// Repository publishing the patcher (`.jar`).
    pub patcher_repo: String,

    pub github_api_url: String,

    /// Optional token to lift the anonymous API rate limit.
    pub github_token: Option<String>,

    /// Download endpoint; jobs are appended as `/<package>?version=<v>`.
    pub apk_base_url: String,

    /// `chrome` (WebDriver) or `http`.
    pub download_backend: Backend,

    /// chromedriver endpoint used by the `chrome` backend.
    pub webdriver_url: String,

    pub headless: bool,

    /// Extra wait after the last partial download disappears.
    pub settle_delay_secs: u64,

    pub poll_interval_ms: u64,

    /// Only process the first few discovered jobs.
    pub low_resource: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("revancedbot"),
            java: PathBuf::from("java"),
            patches_repo: "ReVanced/revanced-patches".to_string(),
            patcher_repo: "ReVanced/revanced-cli".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_token: None,
            apk_base_url: "https://d.apkpure.com/b/APK".to_string(),
            download_backend: Backend::Chrome,
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            settle_delay_secs: 300,
            poll_interval_ms: 1000,
            low_resource: false,
        }
    }
}

impl BotConfig {
    /// Load `path` if given, otherwise `revancedbot.toml` in the current
    /// directory when it exists. An explicit path that does not exist is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Environment wins over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            self.github_token = Some(token);
        }
        if let Some(root) = var("REVANCEDBOT_ROOT")
            && !root.is_empty()
        {
            self.root = PathBuf::from(root);
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
