//! Shared HTTP transport and the bearer interceptor attached to it.
//!
//! Every request built through [`Transport`] reads the current access
//! credential from its [`BearerAuth`] at send time, so a credential set or
//! cleared by the session manager applies to all subsequent requests
//! without call sites managing headers themselves.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::ApiError;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Process-wide default authorization value.
///
/// Clones share the same slot. Setting overwrites, clearing removes.
#[derive(Clone, Default)]
pub struct BearerAuth {
    token: Arc<RwLock<Option<String>>>,
}

impl BearerAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_credential(&self, token: &str) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(token.to_string());
    }

    pub fn clear_credential(&self) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    pub fn credential(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Value of the `Authorization` header, if a credential is held
    pub fn header_value(&self) -> Option<String> {
        self.credential().map(|token| format!("Bearer {}", token))
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("has_credential", &self.credential().is_some())
            .finish()
    }
}

/// HTTP transport for the identity service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct Transport {
    client: Client,
    base_url: String,
    auth: BearerAuth,
    initial_backoff: Duration,
}

impl Transport {
    pub fn new(base_url: impl Into<String>, timeout: Duration, auth: BearerAuth) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay (doubles on each retry)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn auth(&self) -> &BearerAuth {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(value) = self.auth.header_value() {
            headers.insert(header::AUTHORIZATION, Self::header(&value)?);
        }
        Ok(headers)
    }

    fn header(value: &str) -> Result<header::HeaderValue, ApiError> {
        header::HeaderValue::from_str(value)
            .map_err(|_| ApiError::InvalidInput("credential is not a valid header value"))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send the request produced by `build`, retrying on 429 with exponential backoff
    async fn send<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> Result<RequestBuilder, ApiError>,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = build()?.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn parse<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self
            .send(&url, || Ok(self.client.get(&url).headers(self.auth_headers()?)))
            .await?;
        Self::parse(&url, response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self
            .send(&url, || Ok(self.client.post(&url).headers(self.auth_headers()?).json(body)))
            .await?;
        Self::parse(&url, response).await
    }

    /// POST without a body using an explicit bearer instead of the shared one.
    /// The response body is discarded.
    pub async fn post_with_bearer(&self, path: &str, token: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST (explicit bearer)");
        let value = Self::header(&format!("Bearer {}", token))?;
        self.send(&url, || {
            Ok(self.client.post(&url).header(header::AUTHORIZATION, value.clone()))
        })
        .await?;
        Ok(())
    }
}
