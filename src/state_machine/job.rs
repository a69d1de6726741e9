use std::fmt;

use serde::{Deserialize, Serialize};

const PACKAGE_MARKER: &str = "Package name: ";
const VERSIONS_MARKER: &str = "Most common compatible versions:";
const ANY_VERSION: &str = "Any";

/// One unit of fetch + patch work.
///
/// `package_version` of `None` means "whatever the source considers latest".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchJob {
    pub package_id: String,
    pub package_version: Option<String>,
}

impl PatchJob {
    pub fn new(package_id: impl Into<String>, package_version: Option<String>) -> Self {
        Self {
            package_id: package_id.into(),
            package_version,
        }
    }

    /// Version label used in URLs and file names.
    pub fn version_or_latest(&self) -> &str {
        self.package_version.as_deref().unwrap_or("latest")
    }

    /// Render `<base>/<package_id>?version=<version|latest>`.
    pub fn download_url(&self, base: &str) -> String {
        format!(
            "{}/{}?version={}",
            base.trim_end_matches('/'),
            self.package_id,
            self.version_or_latest()
        )
    }
}

impl fmt::Display for PatchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package_id, self.version_or_latest())
    }
}

/// Parse the patcher's `list-versions` output into jobs.
///
/// Each block reads `Package name: <id>` followed by
/// `Most common compatible versions:` and one version per line. Anything after
/// the first whitespace on a version line is an annotation and is dropped, and
/// `Any` means no pinned version. Blocks missing the versions marker are
/// skipped, so garbage input simply yields nothing.
///
/// The returned iterator borrows `data`; call again to restart.
pub fn parse_patch_jobs(data: &str) -> impl Iterator<Item = PatchJob> + '_ {
    data.split(PACKAGE_MARKER)
        .skip(1)
        .filter_map(|block| {
            let mut parts = block.split(VERSIONS_MARKER);
            let (id, versions) = (parts.next()?.trim(), parts.next()?);
            if parts.next().is_some() || id.is_empty() {
                return None;
            }
            Some((id, versions))
        })
        .flat_map(|(package_id, versions)| {
            versions.lines().filter_map(move |line| {
                let token = line.split_whitespace().next()?;
                let version = (token != ANY_VERSION).then(|| token.to_string());
                Some(PatchJob::new(package_id, version))
            })
        })
}
