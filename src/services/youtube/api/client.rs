//! Authenticated request plumbing for the YouTube Data API.

use crate::error::AuthError;
use crate::oauth::OAuthEngine;
use crate::services::provider_error;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Thin authenticated client over the engine's HTTP stack.
///
/// Every call presents a guaranteed-fresh bearer token. A 401 despite the
/// local expiry bookkeeping gets exactly one forced refresh and resend;
/// any other failure is mapped onto the error taxonomy and surfaced.
#[derive(Clone)]
pub(crate) struct ApiClient {
    engine: Arc<OAuthEngine>,
    http: reqwest::Client,
    api_url: String,
}

impl ApiClient {
    pub(crate) fn new(engine: Arc<OAuthEngine>) -> Self {
        let http = engine.http().clone();
        let api_url = engine.backend().endpoints().api_url.clone();
        Self {
            engine,
            http,
            api_url,
        }
    }

    /// Issues `method path?query` with an optional JSON body and decodes
    /// the JSON response into `T`.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, AuthError> {
        let bearer = self.engine.fresh_bearer().await?;
        let mut response = self.send(method.clone(), path, query, body, &bearer).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!(path, "request rejected with 401, refreshing token and retrying");
            let bearer = self.engine.refresh_after_unauthorized().await?;
            response = self.send(method, path, query, body, &bearer).await?;
        }

        let status = response.status();
        let url = response.url().to_string();
        let text = response.text().await.map_err(|e| AuthError::Transport {
            url: url.clone(),
            detail: format!("read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(provider_error(&url, status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Parse {
            url,
            detail: e.to_string(),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        bearer: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {bearer}"))
            .query(query);
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .json(body);
        }
        request.send().await.map_err(|e| AuthError::Transport {
            url,
            detail: e.to_string(),
        })
    }
}
