//! API client for communicating with the shop-management REST API.
//!
//! The backend wraps every payload in a `{succeeded, data, message}`
//! envelope regardless of HTTP status; `ApiClient` normalizes that into
//! typed results and carries the bearer token for authenticated calls.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthBackend, TokenPair};
use crate::models::{DashboardSummary, Order, Profile};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Uniform response envelope used by every backend endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[serde(default)]
    succeeded: bool,
    // a `default` attr here would bound T: Default; serde already
    // reads a missing Option field as None
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: String,
    /// Absent when the backend does not rotate the refresh token
    #[serde(default)]
    refresh_token: Option<String>,
}

/// API client for the shop-management backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Drop the bearer token (after logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Unwrap the backend envelope into the payload or an `ApiError`.
    ///
    /// The backend reports business failures (bad credentials, rejected
    /// refresh token) as `succeeded: false` with a 2xx status, so both
    /// the HTTP status and the envelope flag are checked.
    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Some error statuses still carry an envelope with a message
            if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
                if let Some(message) = envelope.message {
                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(ApiError::Unauthorized);
                    }
                    return Err(ApiError::Rejected(message));
                }
            }
            return Err(ApiError::from_status(status, &text));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("malformed envelope: {}", e)))?;

        if !envelope.succeeded {
            return Err(ApiError::Rejected(envelope.message.unwrap_or_else(|| {
                "The server rejected the request".to_string()
            })));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse("envelope missing data".to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self.request(reqwest::Method::GET, path).send().await?;
        Self::unwrap_envelope(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "POST");
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    // ===== Dashboard data =====

    /// Fetch the KPI summary for the dashboard tab
    pub async fn fetch_summary(&self) -> Result<DashboardSummary, ApiError> {
        self.get("/dashboard/summary").await
    }

    /// Fetch recent orders for the orders tab
    pub async fn fetch_recent_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get("/orders/recent").await
    }
}

impl AuthBackend for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        let data: LoginData = self.post("/login", &body).await?;
        Ok(TokenPair {
            access_token: data.access_token,
            refresh_token: Some(data.refresh_token),
        })
    }

    async fn fetch_profile(&self, access_token: &str, user_id: &str) -> Result<Profile, ApiError> {
        self.with_token(access_token.to_string())
            .get(&format!("/users/{}", user_id))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let body = serde_json::json!({ "refreshToken": refresh_token });
        let data: RefreshData = self.post("/refresh", &body).await?;
        Ok(TokenPair {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
        })
    }
}
