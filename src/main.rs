mod apk_source;
mod cli;
mod config;
mod error;
mod github;
mod layout;
mod orchestrator;
mod patcher;
mod state_machine;
mod transfer;
mod ui;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use apk_source::Downloader;
use cli::{Cli, Command};
use config::BotConfig;
use github::GitHubClient;
use layout::StagingLayout;
use orchestrator::{RunOrchestrator, RunSettings};
use patcher::JavaPatcher;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ui::LogWriter::default)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = BotConfig::load(cli.config.as_deref())?;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    config.low_resource |= cli.low_resource;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let layout = StagingLayout::new(&config.root);

    let releases = GitHubClient::with_base_url(config.github_api_url.clone(), config.github_token.clone())
        .context("failed to build GitHub client")?;
    let source = Downloader::from_config(&config, layout.downloaded_apks())
        .context("failed to prepare download directory")?;
    let patcher = JavaPatcher::new(&config.java);

    let mut orchestrator = RunOrchestrator::new(
        layout,
        RunSettings::from(&config),
        releases,
        source,
        patcher,
    );

    match cli.command {
        Command::Jobs => {
            let jobs = orchestrator.jobs().await?;
            ui::print_jobs(jobs, &config.apk_base_url);
        }
        Command::Fetch => {
            let fetched = orchestrator.fetched().await?;
            ui::print_paths(fetched);
        }
        Command::PatchAll => {
            let report = orchestrator.patched().await?;
            ui::print_report(report, cli.json);
        }
        Command::Patcher(args) => {
            let status = orchestrator.forward(&args).await?;
            let code = status.code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1);
            return Ok(ExitCode::from(code));
        }
    }

    tracing::debug!(
        phase = %orchestrator.phase(),
        history = ?orchestrator.phase_history(),
        "run finished"
    );
    Ok(ExitCode::SUCCESS)
}
