//! Twitch backend: implicit-grant sign-in plus Helix channel and
//! stream-key queries.

use crate::error::AuthError;
use crate::services::{
    ChannelInfo, ClientCredentials, OutputConfig, ProviderEndpoints, ServiceDescriptor,
    ServiceKind, authed_get_json,
};
use serde_json::Value;

pub(crate) const SCOPE_VERSION: i64 = 1;
pub(crate) const SCOPES: &[&str] = &["channel:read:stream_key"];

const DEFAULT_INGEST: &str = "rtmp://live.twitch.tv/app";

/// Key suffix understood by the ingest tier: the session is accepted and
/// measured but never goes live.
const BANDWIDTH_TEST_SUFFIX: &str = "?bandwidthtest=true";

pub const DESCRIPTOR: ServiceDescriptor = ServiceDescriptor {
    name: "Twitch",
    kind: ServiceKind::OAuthStreamKey,
    external: false,
};

#[derive(Debug)]
pub struct TwitchBackend {
    pub(crate) endpoints: ProviderEndpoints,
    pub(crate) credentials: ClientCredentials,
}

impl TwitchBackend {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self::with_endpoints(
            ProviderEndpoints {
                auth_url: "https://id.twitch.tv/oauth2/authorize".into(),
                // Implicit grant: the token endpoint is never called.
                token_url: "https://id.twitch.tv/oauth2/token".into(),
                api_url: "https://api.twitch.tv/helix".into(),
            },
            credentials,
        )
    }

    pub fn with_endpoints(endpoints: ProviderEndpoints, credentials: ClientCredentials) -> Self {
        Self {
            endpoints,
            credentials,
        }
    }

    pub fn descriptor(&self) -> ServiceDescriptor {
        DESCRIPTOR
    }

    /// Resolves the signed-in user and their stream key.
    ///
    /// Helix answers the stream-key query with 403 when the account has not
    /// enabled two-factor authentication; that case is reported as
    /// [`AuthError::TwoFactorRequired`] since no retry can fix it.
    pub(crate) async fn fetch_channel_info(
        &self,
        http: &reqwest::Client,
        bearer: &str,
    ) -> Result<ChannelInfo, AuthError> {
        let headers = [("Client-Id", self.credentials.client_id.as_str())];

        let url = format!("{}/users", self.endpoints.api_url);
        let users = authed_get_json(http, &url, bearer, &headers).await?;
        let user = users
            .pointer("/data/0")
            .ok_or_else(|| AuthError::Provider {
                code: "NoUser".into(),
                description: "no user associated with this token".into(),
                status: 200,
            })?;
        let id = json_str(user, "id", &url)?;
        let display_name = json_str(user, "display_name", &url)?;

        let url = format!(
            "{}/streams/key?broadcaster_id={id}",
            self.endpoints.api_url
        );
        let key = match authed_get_json(http, &url, bearer, &headers).await {
            Ok(body) => body
                .pointer("/data/0/stream_key")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(AuthError::Provider { status: 403, .. }) => {
                tracing::warn!("stream key query rejected with 403, account needs two-factor auth");
                return Err(AuthError::TwoFactorRequired);
            }
            Err(e) => return Err(e),
        };

        Ok(ChannelInfo {
            id,
            display_name,
            stream_key: key,
            ingest_server: Some(DEFAULT_INGEST.to_string()),
        })
    }

    pub(crate) fn apply_stream_settings(&self, info: &ChannelInfo, out: &mut OutputConfig) {
        if let Some(key) = &info.stream_key {
            out.key = if out.bandwidth_test {
                format!("{key}{BANDWIDTH_TEST_SUFFIX}")
            } else {
                key.clone()
            };
        }
        if let Some(server) = &info.ingest_server {
            out.server = server.clone();
        }
    }
}

fn json_str(value: &Value, key: &str, url: &str) -> Result<String, AuthError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AuthError::Parse {
            url: url.to_string(),
            detail: format!("missing field `{key}`"),
        })
}
