//! Subset of the GitHub Releases API payload that the bootstrap step needs.

use serde::Deserialize;

/// A published release, as returned by `GET /repos/{repo}/releases/latest`.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl Release {
    /// First asset whose name ends in `extension` (e.g. `".rvp"`).
    pub fn asset_with_extension(&self, extension: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.ends_with(extension))
    }
}
