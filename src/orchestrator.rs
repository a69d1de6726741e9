use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apk_source::{self, ApkSource};
use crate::config::BotConfig;
use crate::error::BotError;
use crate::github::ReleaseSource;
use crate::layout::{BUNDLE_EXTENSION, PATCHER_EXTENSION, StagingLayout, Toolchain};
use crate::patcher::Patcher;
use crate::state_machine::{Phase, PatchJob, PhaseMachine, Transition, parse_patch_jobs};
use crate::ui::PhaseProgress;

/// Number of jobs kept in low-resource mode.
pub const LOW_RESOURCE_JOB_LIMIT: usize = 3;

/// Knobs the orchestrator needs from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub patches_repo: String,
    pub patcher_repo: String,
    pub low_resource: bool,
}

impl From<&BotConfig> for RunSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            patches_repo: config.patches_repo.clone(),
            patcher_repo: config.patcher_repo.clone(),
            low_resource: config.low_resource,
        }
    }
}

/// Result of patching a single downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Patched { input: PathBuf, output: PathBuf },
    Failed { input: PathBuf, error: String },
}

impl ArtifactOutcome {
    pub fn input(&self) -> &Path {
        match self {
            ArtifactOutcome::Patched { input, .. } | ArtifactOutcome::Failed { input, .. } => input,
        }
    }
}

/// Summary of the patch phase.
#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub outcomes: Vec<ArtifactOutcome>,
}

impl PatchReport {
    /// Output paths of the artifacts that were patched.
    pub fn succeeded(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|o| match o {
            ArtifactOutcome::Patched { output, .. } => Some(output.as_path()),
            ArtifactOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ArtifactOutcome::Failed { .. }))
    }
}

/// Drives one run through bootstrap, discovery, fetch and patch.
///
/// Every phase is computed on first access and cached for the lifetime of the
/// orchestrator; asking for a later phase forces the earlier ones.
pub struct RunOrchestrator<R, S, P> {
    layout: StagingLayout,
    settings: RunSettings,
    releases: R,
    source: S,
    patcher: P,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    machine: PhaseMachine,
    toolchain: Option<Toolchain>,
    jobs: Option<Vec<PatchJob>>,
    fetched: Option<Vec<PathBuf>>,
    report: Option<PatchReport>,
}

impl<R, S, P> RunOrchestrator<R, S, P>
where
    R: ReleaseSource,
    S: ApkSource,
    P: Patcher,
{
    pub fn new(
        layout: StagingLayout,
        settings: RunSettings,
        releases: R,
        source: S,
        patcher: P,
    ) -> Self {
        Self {
            layout,
            settings,
            releases,
            source,
            patcher,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            machine: PhaseMachine::default(),
            toolchain: None,
            jobs: None,
            fetched: None,
            report: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.machine.current()
    }

    pub fn phase_history(&self) -> &[Phase] {
        self.machine.history()
    }

    /// Patch bundle and patcher, downloaded at most once per run.
    pub async fn bootstrap(&mut self) -> Result<&Toolchain, BotError> {
        let toolchain = match self.toolchain.take() {
            Some(toolchain) => toolchain,
            None => {
                let toolchain = self.acquire_toolchain().await?;
                self.enter(Phase::Bootstrapped)?;
                toolchain
            }
        };
        let toolchain: &Toolchain = self.toolchain.insert(toolchain);
        Ok(toolchain)
    }

    /// Jobs reported by the patcher's listing mode.
    pub async fn jobs(&mut self) -> Result<&[PatchJob], BotError> {
        let jobs = match self.jobs.take() {
            Some(jobs) => jobs,
            None => {
                let jobs = self.discover_jobs().await?;
                self.enter(Phase::JobsDiscovered)?;
                jobs
            }
        };
        let jobs: &[PatchJob] = self.jobs.insert(jobs);
        Ok(jobs)
    }

    /// Artifacts present in the download directory after fetching every job.
    pub async fn fetched(&mut self) -> Result<&[PathBuf], BotError> {
        let fetched = match self.fetched.take() {
            Some(fetched) => fetched,
            None => {
                let fetched = self.fetch_all().await?;
                self.enter(Phase::Fetched)?;
                fetched
            }
        };
        let fetched: &[PathBuf] = self.fetched.insert(fetched);
        Ok(fetched)
    }

    /// Patch every fetched artifact; individual failures end up in the report.
    pub async fn patched(&mut self) -> Result<&PatchReport, BotError> {
        let report = match self.report.take() {
            Some(report) => report,
            None => {
                let report = self.patch_all().await?;
                self.enter(Phase::Patched)?;
                report
            }
        };
        let report: &PatchReport = self.report.insert(report);
        Ok(report)
    }

    /// Hand `args` to the patcher untouched (after bootstrapping it).
    pub async fn forward(&mut self, args: &[OsString]) -> Result<ExitStatus, BotError> {
        let tools = self.bootstrap().await?.clone();
        Ok(self.patcher.passthrough(&tools, args).await?)
    }

    fn enter(&mut self, phase: Phase) -> Result<(), BotError> {
        match self.machine.advance(phase) {
            Transition::Advanced(phase) => {
                info!(%phase, run_id = %self.run_id, "entered phase");
                Ok(())
            }
            Transition::AlreadyReached(_) => Ok(()),
            Transition::Rejected { from, to } => Err(BotError::InvalidTransition { from, to }),
        }
    }

    async fn acquire_toolchain(&self) -> Result<Toolchain, BotError> {
        tokio::fs::create_dir_all(self.layout.tools_dir()).await?;
        let toolchain = self.layout.toolchain();

        let wanted = [
            (&self.settings.patches_repo, BUNDLE_EXTENSION, &toolchain.bundle),
            (&self.settings.patcher_repo, PATCHER_EXTENSION, &toolchain.patcher),
        ];

        for (repo, extension, dest) in wanted {
            if dest.exists() {
                debug!(path = %dest.display(), "reusing cached download");
                continue;
            }
            let extension = format!(".{extension}");
            let release = self.releases.latest_release(repo).await?;
            let asset = release.asset_with_extension(&extension).ok_or_else(|| {
                BotError::MissingAsset {
                    repo: repo.clone(),
                    extension: extension.clone(),
                }
            })?;
            self.releases.download_asset(asset, dest).await?;
        }

        Ok(toolchain)
    }

    async fn discover_jobs(&mut self) -> Result<Vec<PatchJob>, BotError> {
        let tools = self.bootstrap().await?.clone();
        let listing = self.patcher.list_versions(&tools).await?;

        let mut jobs: Vec<PatchJob> = parse_patch_jobs(&listing).collect();
        let discovered = jobs.len();
        if self.settings.low_resource {
            jobs.truncate(LOW_RESOURCE_JOB_LIMIT);
        }
        info!(discovered, kept = jobs.len(), "discovered patch jobs");
        Ok(jobs)
    }

    async fn fetch_all(&mut self) -> Result<Vec<PathBuf>, BotError> {
        let jobs = self.jobs().await?.to_vec();

        let stale = apk_source::clear_partials(self.source.download_dir())?;
        if stale > 0 {
            debug!(stale, "cleared partial downloads from an earlier run");
        }

        let progress = PhaseProgress::start(jobs.len());
        for job in &jobs {
            progress.working_on(format!("Downloading {job}"));
            self.source.fetch(job).await?;
            progress.inc();
        }
        progress.working_on("Waiting for downloads to settle".to_string());
        self.source.wait_settle().await?;
        progress.finish("Downloads finished");

        let fetched = apk_source::list_downloads(self.source.download_dir())?;
        info!(count = fetched.len(), "fetched artifacts");
        Ok(fetched)
    }

    async fn patch_all(&mut self) -> Result<PatchReport, BotError> {
        let fetched = self.fetched().await?.to_vec();
        let tools = self.bootstrap().await?.clone();
        tokio::fs::create_dir_all(self.layout.patched_apks()).await?;

        let progress = PhaseProgress::start(fetched.len());
        let mut outcomes = Vec::with_capacity(fetched.len());
        for apk in fetched {
            let name = apk.file_name().unwrap_or_default().to_string_lossy().into_owned();
            progress.working_on(format!("Patching {name}"));

            let output = self.layout.patched_output(&apk);
            let outcome = match self.patcher.patch(&tools, &apk, &output).await {
                Ok(()) => {
                    info!(input = %apk.display(), output = %output.display(), "patched");
                    ArtifactOutcome::Patched { input: apk, output }
                }
                Err(e) => {
                    warn!(input = %apk.display(), error = %e, "patching failed, continuing");
                    ArtifactOutcome::Failed {
                        input: apk,
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
            progress.inc();
        }
        progress.finish("Patching finished");

        let completed_at = Utc::now();
        Ok(PatchReport {
            run_id: self.run_id,
            started_at: self.started_at,
            completed_at,
            duration_ms: (completed_at - self.started_at).num_milliseconds(),
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apk_source::FetchError;
    use crate::github::{Release, ReleaseAsset, ReleaseError};
    use crate::patcher::PatcherError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const LISTING: &str = "\
Package name: com.google.android.youtube
Most common compatible versions:
    19.16.39 (42 patches)
Package name: com.reddit.frontpage
Most common compatible versions:
    Any
Package name: com.spotify.music
Most common compatible versions:
    8.9.18
    8.9.20 (broken)
Package name: com.twitter.android
Most common compatible versions:
    10.48.0
";

    struct FakeReleases {
        assets: HashMap<String, Vec<&'static str>>,
        lookups: Mutex<Vec<String>>,
        downloads: AtomicUsize,
    }

    impl FakeReleases {
        fn revanced() -> Self {
            let mut assets = HashMap::new();
            assets.insert(
                "ReVanced/revanced-patches".to_string(),
                vec!["patches-5.0.0.rvp.asc", "patches-5.0.0.rvp"],
            );
            assets.insert(
                "ReVanced/revanced-cli".to_string(),
                vec!["revanced-cli-5.0.0-all.jar"],
            );
            Self {
                assets,
                lookups: Mutex::new(Vec::new()),
                downloads: AtomicUsize::new(0),
            }
        }
    }

    impl ReleaseSource for FakeReleases {
        async fn latest_release(&self, repo: &str) -> Result<Release, ReleaseError> {
            self.lookups.lock().unwrap().push(repo.to_string());
            let names = self
                .assets
                .get(repo)
                .ok_or_else(|| ReleaseError::NotFound(repo.to_string()))?;
            Ok(Release {
                tag_name: "v5.0.0".into(),
                assets: names
                    .iter()
                    .map(|name| ReleaseAsset {
                        name: name.to_string(),
                        browser_download_url: format!("https://example.com/{name}"),
                        size: 0,
                    })
                    .collect(),
            })
        }

        async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), ReleaseError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest, asset.name.as_bytes())?;
            Ok(())
        }
    }

    struct FakeSource {
        dir: PathBuf,
        fail_fetch: bool,
        requested: Mutex<Vec<PatchJob>>,
        settles: AtomicUsize,
    }

    impl FakeSource {
        fn new(dir: PathBuf) -> Self {
            std::fs::create_dir_all(&dir).unwrap();
            Self {
                dir,
                fail_fetch: false,
                requested: Mutex::new(Vec::new()),
                settles: AtomicUsize::new(0),
            }
        }
    }

    impl ApkSource for FakeSource {
        fn download_dir(&self) -> &Path {
            &self.dir
        }

        async fn fetch(&self, job: &PatchJob) -> Result<(), FetchError> {
            self.requested.lock().unwrap().push(job.clone());
            if self.fail_fetch {
                return Err(FetchError::Io(std::io::Error::other("connection reset")));
            }
            let name = format!("{}-{}.apk", job.package_id, job.version_or_latest());
            std::fs::write(self.dir.join(name), b"apk")?;
            Ok(())
        }

        async fn wait_settle(&self) -> Result<(), FetchError> {
            self.settles.fetch_add(1, Ordering::SeqCst);
            let settled = apk_source::settle(&self.dir, Duration::from_millis(10), Duration::ZERO);
            timeout(Duration::from_secs(2), settled)
                .await
                .expect("download directory never settled")?;
            Ok(())
        }
    }

    struct FakePatcher {
        listing: String,
        fail_listing: bool,
        fail_when_contains: Option<&'static str>,
        list_calls: AtomicUsize,
        attempted: Mutex<Vec<PathBuf>>,
        forwarded: Mutex<Vec<OsString>>,
    }

    impl FakePatcher {
        fn new(listing: &str) -> Self {
            Self {
                listing: listing.to_string(),
                fail_listing: false,
                fail_when_contains: None,
                list_calls: AtomicUsize::new(0),
                attempted: Mutex::new(Vec::new()),
                forwarded: Mutex::new(Vec::new()),
            }
        }
    }

    impl Patcher for FakePatcher {
        async fn list_versions(&self, tools: &Toolchain) -> Result<String, PatcherError> {
            assert!(tools.bundle.exists() && tools.patcher.exists());
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing {
                return Err(PatcherError::Io(std::io::Error::other("java not found")));
            }
            Ok(self.listing.clone())
        }

        async fn patch(&self, _tools: &Toolchain, apk: &Path, out: &Path) -> Result<(), PatcherError> {
            self.attempted.lock().unwrap().push(apk.to_path_buf());
            let name = apk.file_name().unwrap().to_string_lossy();
            if let Some(needle) = self.fail_when_contains
                && name.contains(needle)
            {
                return Err(PatcherError::Io(std::io::Error::other("corrupt apk")));
            }
            std::fs::write(out, b"patched")?;
            Ok(())
        }

        async fn passthrough(
            &self,
            _tools: &Toolchain,
            args: &[OsString],
        ) -> Result<ExitStatus, PatcherError> {
            self.forwarded.lock().unwrap().extend_from_slice(args);
            Ok(ExitStatus::default())
        }
    }

    type TestOrchestrator = RunOrchestrator<FakeReleases, FakeSource, FakePatcher>;

    fn settings(low_resource: bool) -> RunSettings {
        RunSettings {
            patches_repo: "ReVanced/revanced-patches".into(),
            patcher_repo: "ReVanced/revanced-cli".into(),
            low_resource,
        }
    }

    fn orchestrator(tmp: &TempDir, patcher: FakePatcher, low_resource: bool) -> TestOrchestrator {
        let layout = StagingLayout::new(tmp.path());
        let source = FakeSource::new(layout.downloaded_apks());
        RunOrchestrator::new(
            layout,
            settings(low_resource),
            FakeReleases::revanced(),
            source,
            patcher,
        )
    }

    #[tokio::test]
    async fn bootstrap_downloads_each_asset_once() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(""), false);
        assert_eq!(orch.phase(), Phase::Uninitialized);

        let tools = orch.bootstrap().await.unwrap().clone();
        assert_eq!(std::fs::read_to_string(&tools.bundle).unwrap(), "patches-5.0.0.rvp");
        assert_eq!(
            std::fs::read_to_string(&tools.patcher).unwrap(),
            "revanced-cli-5.0.0-all.jar"
        );

        orch.bootstrap().await.unwrap();
        assert_eq!(orch.releases.downloads.load(Ordering::SeqCst), 2);
        assert_eq!(orch.phase(), Phase::Bootstrapped);
    }

    #[tokio::test]
    async fn bootstrap_reuses_files_from_previous_runs() {
        let tmp = TempDir::new().unwrap();
        let layout = StagingLayout::new(tmp.path());
        std::fs::create_dir_all(layout.tools_dir()).unwrap();
        std::fs::write(layout.bundle(), b"old bundle").unwrap();
        std::fs::write(layout.patcher(), b"old jar").unwrap();

        let mut orch = orchestrator(&tmp, FakePatcher::new(""), false);
        orch.bootstrap().await.unwrap();

        assert!(orch.releases.lookups.lock().unwrap().is_empty());
        assert_eq!(std::fs::read(layout.bundle()).unwrap(), b"old bundle");
    }

    #[tokio::test]
    async fn bootstrap_fails_when_asset_is_missing() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(""), false);
        orch.releases
            .assets
            .insert("ReVanced/revanced-cli".into(), vec!["revanced-cli.zip"]);

        let err = orch.bootstrap().await.unwrap_err();
        assert!(matches!(
            err,
            BotError::MissingAsset { ref repo, ref extension }
                if repo == "ReVanced/revanced-cli" && extension == ".jar"
        ));
        assert_eq!(orch.phase(), Phase::Uninitialized);
    }

    #[tokio::test]
    async fn jobs_are_discovered_once() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(LISTING), false);

        let first = orch.jobs().await.unwrap().to_vec();
        let second = orch.jobs().await.unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(first[1], PatchJob::new("com.reddit.frontpage", None));
        assert_eq!(orch.patcher.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(orch.phase(), Phase::JobsDiscovered);
    }

    #[tokio::test]
    async fn low_resource_mode_keeps_first_three_jobs() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(LISTING), true);

        let jobs = orch.jobs().await.unwrap();
        assert_eq!(
            jobs,
            &[
                PatchJob::new("com.google.android.youtube", Some("19.16.39".into())),
                PatchJob::new("com.reddit.frontpage", None),
                PatchJob::new("com.spotify.music", Some("8.9.18".into())),
            ]
        );
    }

    #[tokio::test]
    async fn low_resource_mode_is_noop_for_small_listings() {
        let tmp = TempDir::new().unwrap();
        let listing = "Package name: com.a\nMost common compatible versions:\n1.0\nAny\n";
        let mut orch = orchestrator(&tmp, FakePatcher::new(listing), true);

        assert_eq!(orch.jobs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fetch_requests_every_job_then_settles() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(LISTING), true);

        let fetched = orch.fetched().await.unwrap().to_vec();
        let dir = orch.layout.downloaded_apks();
        assert_eq!(
            fetched,
            vec![
                dir.join("com.google.android.youtube-19.16.39.apk"),
                dir.join("com.reddit.frontpage-latest.apk"),
                dir.join("com.spotify.music-8.9.18.apk"),
            ]
        );
        assert_eq!(orch.source.requested.lock().unwrap().len(), 3);
        assert_eq!(orch.source.settles.load(Ordering::SeqCst), 1);

        orch.fetched().await.unwrap();
        assert_eq!(orch.source.settles.load(Ordering::SeqCst), 1);
        assert_eq!(orch.phase(), Phase::Fetched);
    }

    #[tokio::test]
    async fn stale_partials_are_cleared_before_fetching() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(LISTING), true);
        let stale = orch.layout.downloaded_apks().join("killed.apk.crdownload");
        std::fs::write(&stale, b"half an apk").unwrap();

        let fetched = orch.fetched().await.unwrap().to_vec();

        assert!(!stale.exists());
        assert_eq!(fetched.len(), 3);
        assert_eq!(orch.phase(), Phase::Fetched);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_on_next_access() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(LISTING), true);
        orch.source.fail_fetch = true;

        let err = orch.fetched().await.unwrap_err();
        assert!(matches!(err, BotError::Fetch(FetchError::Io(_))));
        assert_eq!(orch.phase(), Phase::JobsDiscovered);
        assert_eq!(orch.source.requested.lock().unwrap().len(), 1);
        assert_eq!(orch.source.settles.load(Ordering::SeqCst), 0);

        orch.source.fail_fetch = false;
        let fetched = orch.fetched().await.unwrap().to_vec();
        assert_eq!(fetched.len(), 3);
        assert_eq!(orch.source.requested.lock().unwrap().len(), 4);
        assert_eq!(orch.phase(), Phase::Fetched);
        // Discovery itself was cached across the failure.
        assert_eq!(orch.patcher.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_listing_is_not_cached() {
        let tmp = TempDir::new().unwrap();
        let mut patcher = FakePatcher::new(LISTING);
        patcher.fail_listing = true;
        let mut orch = orchestrator(&tmp, patcher, false);

        let err = orch.jobs().await.unwrap_err();
        assert!(matches!(err, BotError::Patcher(PatcherError::Io(_))));
        assert_eq!(orch.phase(), Phase::Bootstrapped);

        orch.patcher.fail_listing = false;
        assert_eq!(orch.jobs().await.unwrap().len(), 5);
        assert_eq!(orch.patcher.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(orch.phase(), Phase::JobsDiscovered);
        assert_eq!(orch.releases.downloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_artifact_does_not_abort_the_batch() {
        let tmp = TempDir::new().unwrap();
        let mut patcher = FakePatcher::new(LISTING);
        patcher.fail_when_contains = Some("reddit");
        let mut orch = orchestrator(&tmp, patcher, true);

        let report = orch.patched().await.unwrap().clone();

        assert_eq!(orch.patcher.attempted.lock().unwrap().len(), 3);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded().count(), 2);

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].input().ends_with("com.reddit.frontpage-latest.apk"));
        assert!(matches!(failed[0], ArtifactOutcome::Failed { error, .. } if error.contains("corrupt apk")));

        // The artifact after the failure was still patched.
        let patched = orch.layout.patched_apks().join("com.spotify.music-8.9.18.apk");
        assert!(patched.exists());
        assert!(report.succeeded().any(|p| p == patched));
    }

    #[tokio::test]
    async fn full_run_records_every_phase() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(LISTING), false);

        let report = orch.patched().await.unwrap();
        assert_eq!(report.outcomes.len(), 5);
        assert!(report.duration_ms >= 0);

        assert_eq!(orch.phase(), Phase::Patched);
        assert_eq!(
            orch.phase_history(),
            &[
                Phase::Uninitialized,
                Phase::Bootstrapped,
                Phase::JobsDiscovered,
                Phase::Fetched
            ]
        );

        // Memoized: no second patch pass.
        orch.patched().await.unwrap();
        assert_eq!(orch.patcher.attempted.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn malformed_listing_produces_empty_run() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new("Exception in thread main"), false);

        assert!(orch.jobs().await.unwrap().is_empty());
        let report = orch.patched().await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(orch.source.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forward_bootstraps_then_passes_args_through() {
        let tmp = TempDir::new().unwrap();
        let mut orch = orchestrator(&tmp, FakePatcher::new(""), false);
        let args: Vec<OsString> = vec!["list-patches".into(), "--with-versions".into()];

        let status = orch.forward(&args).await.unwrap();

        assert!(status.success());
        assert_eq!(*orch.patcher.forwarded.lock().unwrap(), args);
        assert_eq!(orch.phase(), Phase::Bootstrapped);
        assert_eq!(orch.patcher.list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn report_serializes_outcomes_with_status_tag() {
        let report = PatchReport {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 0,
            outcomes: vec![ArtifactOutcome::Failed {
                input: PathBuf::from("a.apk"),
                error: "boom".into(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "failed");
        assert_eq!(json["outcomes"][0]["error"], "boom");
    }
}
