use thiserror::Error;

use crate::apk_source::FetchError;
use crate::github::ReleaseError;
use crate::patcher::PatcherError;
use crate::state_machine::Phase;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("latest release of {repo} has no asset ending in {extension}")]
    MissingAsset { repo: String, extension: String },

    #[error("cannot enter {to} from {from}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("release error: {0}")]
    Release(#[from] ReleaseError),

    #[error("download error: {0}")]
    Fetch(#[from] FetchError),

    #[error("patcher error: {0}")]
    Patcher(#[from] PatcherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
