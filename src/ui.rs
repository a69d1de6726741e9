//! Terminal output: progress bars while a phase runs and styled summaries.

use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::orchestrator::{ArtifactOutcome, PatchReport};
use crate::state_machine::PatchJob;

/// Every bar is drawn through this, so log lines can be printed around them.
static BARS: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

/// Log sink for `tracing_subscriber`: buffers one event, then writes it to
/// stderr with the progress bars cleared.
#[derive(Default)]
pub struct LogWriter {
    buf: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        BARS.suspend(|| {
            let _ = std::io::stderr().write_all(&self.buf);
        });
    }
}

/// Progress bar for a phase that walks a known number of items.
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start(len: usize) -> Self {
        let pb = BARS.add(ProgressBar::new(len as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    /// Show what is being worked on right now.
    pub fn working_on(&self, message: String) {
        self.pb.set_message(message);
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn finish(&self, message: &'static str) {
        self.pb.finish_with_message(message);
    }
}

/// One job per line, followed by where it will be downloaded from.
pub fn print_jobs(jobs: &[PatchJob], apk_base_url: &str) {
    for job in jobs {
        println!("{job}\t{}", job.download_url(apk_base_url));
    }
}

pub fn print_paths(paths: &[PathBuf]) {
    for path in paths {
        println!("{}", path.display());
    }
}

/// Per-artifact results, or the whole report as JSON.
pub fn print_report(report: &PatchReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
        return;
    }

    let green = Style::new().green().bold();
    let red = Style::new().red().bold();

    for outcome in &report.outcomes {
        match outcome {
            ArtifactOutcome::Patched { output, .. } => {
                println!("  {} {}", green.apply_to("✓"), output.display());
            }
            ArtifactOutcome::Failed { error, .. } => {
                println!("  {} {}: {error}", red.apply_to("✗"), outcome.input().display());
            }
        }
    }

    let summary = format!(
        "{} patched, {} failed in {}ms",
        report.succeeded().count(),
        report.failed().count(),
        report.duration_ms
    );
    let style = if report.failed().count() == 0 { &green } else { &red };
    println!();
    println!("{}", style.apply_to(summary));
}
