//! Client for the remote identity service.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ApiError, Transport};
use crate::models::{AuthResponse, LoginRequest, RefreshResponse, RegisterRequest};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";

/// Network boundary used by the session manager.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;

    /// Best-effort logout notification for `access_token`
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// [`IdentityClient`] speaking JSON over the shared [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpIdentityClient {
    transport: Transport,
}

impl HttpIdentityClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        debug!(email = %request.email, mfa = request.mfa_code.is_some(), "Sending login request");
        self.transport.post(LOGIN_PATH, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        debug!(email = %request.email, "Sending register request");
        self.transport.post(REGISTER_PATH, request).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        self.transport
            .post(REFRESH_PATH, &RefreshRequest { refresh_token })
            .await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.transport.post_with_bearer(LOGOUT_PATH, access_token).await
    }
}
