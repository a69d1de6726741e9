use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::{Release, ReleaseAsset, ReleaseError};
use crate::transfer;

const USER_AGENT: &str = concat!("revancedbot/", env!("CARGO_PKG_VERSION"));

/// Anything that can hand out the newest release of a repository and download
/// its assets.
pub trait ReleaseSource {
    /// Newest published release of `repo` (`owner/name`).
    async fn latest_release(&self, repo: &str) -> Result<Release, ReleaseError>;

    /// Download `asset` to `dest`, replacing whatever is there.
    async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), ReleaseError>;
}

pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// `base_url` is the API root, normally `https://api.github.com`.
    pub fn with_base_url(base_url: String, token: Option<String>) -> Result<Self, ReleaseError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl ReleaseSource for GitHubClient {
    async fn latest_release(&self, repo: &str) -> Result<Release, ReleaseError> {
        let url = format!("{}/repos/{}/releases/latest", self.base_url, repo);
        debug!(%url, "fetching latest release");

        let response = self
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ReleaseError::NotFound(repo.to_string()));
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ReleaseError::RateLimited {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("GitHub API returned status {}: {}", status, url);
            return Err(ReleaseError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let release = response.json::<Release>().await?;
        info!(repo, tag = %release.tag_name, "found latest release");
        Ok(release)
    }

    async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), ReleaseError> {
        info!(asset = %asset.name, size = asset.size, dest = %dest.display(), "downloading release asset");

        let response = self
            .get(&asset.browser_download_url)
            .header("Accept", "application/octet-stream")
            .send()
            .await?
            .error_for_status()?;

        let partial = transfer::with_suffix(dest, ".part");
        transfer::stream_to_file::<ReleaseError>(response, &partial, dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> GitHubClient {
        GitHubClient::with_base_url(server.uri(), token.map(str::to_string)).unwrap()
    }

    #[tokio::test]
    async fn latest_release_parses_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/ReVanced/revanced-cli/releases/latest"))
            .and(header("Accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v5.0.1",
                "assets": [
                    {"name": "revanced-cli-5.0.1-all.jar", "browser_download_url": "https://x/cli.jar"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let release = client_for(&server, None)
            .latest_release("ReVanced/revanced-cli")
            .await
            .unwrap();

        assert_eq!(release.tag_name, "v5.0.1");
        assert_eq!(
            release.asset_with_extension(".jar").unwrap().browser_download_url,
            "https://x/cli.jar"
        );
    }

    #[tokio::test]
    async fn latest_release_sends_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v1", "assets": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, Some("ghp_test"))
            .latest_release("a/b")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn latest_release_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"Not Found"}"#))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .latest_release("nobody/nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NotFound(repo) if repo == "nobody/nothing"));
    }

    #[tokio::test]
    async fn latest_release_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .latest_release("a/b")
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::RateLimited { status: 403 }));
    }

    #[tokio::test]
    async fn latest_release_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .latest_release("a/b")
            .await
            .unwrap_err();
        match err {
            ReleaseError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_asset_writes_file_without_leftovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/patches.rvp"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04bundle".to_vec()))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("patcher").join("patches.rvp");
        let asset = ReleaseAsset {
            name: "patches-5.0.0.rvp".into(),
            browser_download_url: format!("{}/download/patches.rvp", server.uri()),
            size: 0,
        };

        client_for(&server, None)
            .download_asset(&asset, &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"PK\x03\x04bundle");
        assert!(!transfer::with_suffix(&dest, ".part").exists());
    }

    #[tokio::test]
    async fn download_asset_http_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("patcher.jar");
        let asset = ReleaseAsset {
            name: "cli.jar".into(),
            browser_download_url: format!("{}/gone.jar", server.uri()),
            size: 0,
        };

        let err = client_for(&server, None)
            .download_asset(&asset, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Network(_)));
        assert!(!dest.exists());
    }
}
