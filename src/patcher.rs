//! Running the ReVanced CLI as a subprocess.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::layout::Toolchain;

/// Mode that prints the compatible versions of each patched package.
pub const LIST_VERSIONS: &str = "list-versions";

#[derive(Debug, Error)]
pub enum PatcherError {
    #[error("could not run patcher: {0}")]
    Io(#[from] std::io::Error),

    #[error("patcher exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// The operations the orchestrator needs from the patcher executable.
pub trait Patcher {
    /// Run in listing mode and return captured stdout, whatever the exit code.
    async fn list_versions(&self, tools: &Toolchain) -> Result<String, PatcherError>;

    /// Patch `apk` into `out` using the bundle in `tools`.
    async fn patch(&self, tools: &Toolchain, apk: &Path, out: &Path) -> Result<(), PatcherError>;

    /// Forward `args` as-is with inherited stdio, returning the exit status.
    async fn passthrough(
        &self,
        tools: &Toolchain,
        args: &[OsString],
    ) -> Result<ExitStatus, PatcherError>;
}

/// Runs `<java> -jar patcher.jar ...`.
pub struct JavaPatcher {
    java: PathBuf,
}

impl JavaPatcher {
    pub fn new(java: impl Into<PathBuf>) -> Self {
        Self { java: java.into() }
    }

    fn base_command(&self, tools: &Toolchain) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.arg("-jar").arg(&tools.patcher).kill_on_drop(true);
        cmd
    }

    /// `<mode> <bundle> <args...>`: the bundle always follows the mode.
    fn mode_command<I, S>(&self, tools: &Toolchain, mode: &OsStr, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.base_command(tools);
        cmd.arg(mode).arg(&tools.bundle).args(args);
        cmd
    }

    fn patch_command(&self, tools: &Toolchain, apk: &Path, out: &Path) -> Command {
        let mut cmd = self.base_command(tools);
        cmd.arg("patch")
            .arg("-p")
            .arg(&tools.bundle)
            .arg("-o")
            .arg(out)
            .arg(apk);
        cmd
    }
}

async fn run_captured(mut cmd: Command) -> Result<Output, PatcherError> {
    debug!(command = ?cmd.as_std(), "running patcher");
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;
    Ok(output)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

impl Patcher for JavaPatcher {
    async fn list_versions(&self, tools: &Toolchain) -> Result<String, PatcherError> {
        let cmd = self.mode_command(tools, OsStr::new(LIST_VERSIONS), std::iter::empty::<&OsStr>());
        let output = run_captured(cmd).await?;
        // The listing is still printed when some patches fail to load.
        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %stderr_of(&output),
                "patcher listing exited unsuccessfully, parsing its output anyway"
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn patch(&self, tools: &Toolchain, apk: &Path, out: &Path) -> Result<(), PatcherError> {
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let output = run_captured(self.patch_command(tools, apk, out)).await?;
        if !output.status.success() {
            return Err(PatcherError::Failed {
                status: output.status,
                stderr: stderr_of(&output),
            });
        }
        Ok(())
    }

    async fn passthrough(
        &self,
        tools: &Toolchain,
        args: &[OsString],
    ) -> Result<ExitStatus, PatcherError> {
        let mut cmd = match args.split_first() {
            Some((mode, rest)) => self.mode_command(tools, mode, rest),
            None => self.base_command(tools),
        };
        debug!(command = ?cmd.as_std(), "forwarding to patcher");
        Ok(cmd.status().await?)
    }
}
