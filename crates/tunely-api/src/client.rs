// Async HTTP client for the Ngenic Tunes API (v3).
//
// Base path: /api/v3/
// Auth: `Authorization: Bearer <token>`, rebuilt from the shared
// `Credential` on every request.
//
// Endpoint methods live in `tunes.rs` and `measurements.rs` as inherent
// methods to keep this module focused on transport mechanics.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::Credential;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Production API root.
pub const DEFAULT_API_URL: &str = "https://app.ngenic.se/api/v3/";

/// Async client for the Tunes API.
///
/// Cheaply cloneable; clones share the connection pool and the credential
/// slot.
#[derive(Clone)]
pub struct TunesClient {
    http: reqwest::Client,
    base_url: Url,
    credential: Credential,
}

impl TunesClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client from a base URL, transport config, and shared credential.
    pub fn new(
        base_url: &str,
        credential: Credential,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http, credential)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        credential: Credential,
    ) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            credential,
        })
    }

    /// Ensure the base URL ends with `/` so relative joins append.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    /// The shared credential slot used by this client.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_with_params(path, &[]).await
    }

    pub(crate) async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let resp = self.send_get(path, params).await?;
        Self::handle_response(resp).await
    }

    /// GET that maps `204 No Content` (no data yet) to `None`.
    pub(crate) async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, Error> {
        let resp = self.send_get(path, params).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            trace!(path, "no content");
            return Ok(None);
        }
        Self::handle_response(resp).await.map(Some)
    }

    async fn send_get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let auth = self.credential.bearer_header()?;
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, auth)
            .query(params)
            .send()
            .await?;
        Ok(resp)
    }

    pub(crate) async fn put<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let auth = self.credential.bearer_header()?;
        let resp = self
            .http
            .put(url)
            .header(AUTHORIZATION, auth)
            .json(body)
            .send()
            .await?;
        Self::handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
                retry_after_secs: resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok()),
            },
            StatusCode::NOT_FOUND => Error::NotFound {
                path: resp.url().path().to_owned(),
            },
            _ => {
                let raw = resp.text().await.unwrap_or_default();
                Error::Http {
                    status: status.as_u16(),
                    message: if raw.is_empty() {
                        status.to_string()
                    } else {
                        raw
                    },
                }
            }
        }
    }
}

impl std::fmt::Debug for TunesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunesClient")
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = TunesClient::from_reqwest(
            "https://example.test/api/v3",
            reqwest::Client::new(),
            Credential::default(),
        )
        .unwrap();
        assert_eq!(
            client.url("tunes/abc/rooms").unwrap().as_str(),
            "https://example.test/api/v3/tunes/abc/rooms"
        );
    }
}
