//! On-disk layout of the staging root.
//!
//! ```text
//! <root>/
//!   patcher/patches.rvp
//!   patcher/patcher.jar
//!   downloaded_apks/
//!   patched_apks/
//! ```

use std::path::{Path, PathBuf};

pub const BUNDLE_EXTENSION: &str = "rvp";
pub const PATCHER_EXTENSION: &str = "jar";

#[derive(Debug, Clone)]
pub struct StagingLayout {
    root: PathBuf,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("patcher")
    }

    pub fn bundle(&self) -> PathBuf {
        self.tools_dir().join(format!("patches.{BUNDLE_EXTENSION}"))
    }

    pub fn patcher(&self) -> PathBuf {
        self.tools_dir().join(format!("patcher.{PATCHER_EXTENSION}"))
    }

    pub fn downloaded_apks(&self) -> PathBuf {
        self.root.join("downloaded_apks")
    }

    pub fn patched_apks(&self) -> PathBuf {
        self.root.join("patched_apks")
    }

    /// Where the patched copy of `apk` is written.
    pub fn patched_output(&self, apk: &Path) -> PathBuf {
        self.patched_apks()
            .join(apk.file_name().unwrap_or(apk.as_os_str()))
    }

    /// Paths the bootstrap step must produce.
    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            bundle: self.bundle(),
            patcher: self.patcher(),
        }
    }
}

/// Local copies of the patch bundle and the patcher executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub bundle: PathBuf,
    pub patcher: PathBuf,
}
