//! HTTP client with bearer auth injection.
//!
//! One `ApiClient` is built by the composition root and shared as
//! `Arc<ApiClient>`. The token is passed per call; the client itself holds
//! no session state.

use std::time::Duration;

use reqwest::{multipart, Client, Response};

use crate::error::{DroppError, Result};

/// Default API origin of the hosted dropp service.
pub const DEFAULT_BASE_URL: &str = "https://dropp.yangm.tech/api";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client wrapper for dropp API communication.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("dropp-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated GET request to a relative API path.
    pub async fn authenticated_get(&self, path: &str, token: &str) -> Result<Response> {
        let token = require(token)?;
        log::debug!("GET {}", path);
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        ensure_success(resp).await
    }

    /// Send an authenticated DELETE request to a relative API path.
    ///
    /// The raw response is returned so callers can interpret 404 themselves.
    pub async fn authenticated_delete(&self, path: &str, token: &str) -> Result<Response> {
        let token = require(token)?;
        log::debug!("DELETE {}", path);
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(resp)
    }

    /// Send an authenticated multipart POST request.
    pub async fn authenticated_multipart_post(
        &self,
        path: &str,
        token: &str,
        form: multipart::Form,
    ) -> Result<Response> {
        let token = require(token)?;
        log::debug!("POST {} (multipart)", path);
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        ensure_success(resp).await
    }

    /// Fetch raw bytes from an absolute URL without credentials.
    ///
    /// Download URLs are pre-signed by the backend.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        let resp = ensure_success(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn require(token: &str) -> Result<&str> {
    if token.is_empty() {
        Err(DroppError::MissingSession)
    } else {
        Ok(token)
    }
}

/// Turn a non-2xx response into [`DroppError::Http`], keeping part of the body.
pub(crate) async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    log::debug!("Request failed with status {}", status);
    Err(DroppError::http(status.as_u16(), &body))
}
