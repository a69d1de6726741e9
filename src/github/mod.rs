pub mod client;
pub mod error;
pub mod types;

pub use client::{GitHubClient, ReleaseSource};
pub use error::ReleaseError;
pub use types::{Release, ReleaseAsset};
