//! Restream.io backend: authorization-code sign-in plus profile and
//! stream-key queries.

use crate::error::AuthError;
use crate::services::{
    ChannelInfo, ClientCredentials, OutputConfig, ProviderEndpoints, ServiceDescriptor,
    ServiceKind, authed_get_json,
};
use serde_json::Value;

pub(crate) const SCOPE_VERSION: i64 = 1;
pub(crate) const SCOPES: &[&str] = &["profile.default.read", "stream-key.default.read"];

const DEFAULT_INGEST: &str = "rtmp://live.restream.io/live";

pub const DESCRIPTOR: ServiceDescriptor = ServiceDescriptor {
    name: "Restream.io",
    kind: ServiceKind::OAuthStreamKey,
    external: false,
};

#[derive(Debug)]
pub struct RestreamBackend {
    pub(crate) endpoints: ProviderEndpoints,
    pub(crate) credentials: ClientCredentials,
}

impl RestreamBackend {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self::with_endpoints(
            ProviderEndpoints {
                auth_url: "https://api.restream.io/login".into(),
                token_url: "https://api.restream.io/oauth/token".into(),
                api_url: "https://api.restream.io/v2".into(),
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

    pub(crate) async fn fetch_channel_info(
        &self,
        http: &reqwest::Client,
        bearer: &str,
    ) -> Result<ChannelInfo, AuthError> {
        let url = format!("{}/user/profile", self.endpoints.api_url);
        let profile = authed_get_json(http, &url, bearer, &[]).await?;
        let id = match profile.get("id") {
            // Restream reports numeric ids.
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(AuthError::Parse {
                    url,
                    detail: "missing field `id`".into(),
                });
            }
        };
        let display_name = profile
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let url = format!("{}/user/streamKey", self.endpoints.api_url);
        let key = authed_get_json(http, &url, bearer, &[]).await?;
        let stream_key = key
            .get("streamKey")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ChannelInfo {
            id,
            display_name,
            stream_key,
            ingest_server: Some(DEFAULT_INGEST.to_string()),
        })
    }

    pub(crate) fn apply_stream_settings(&self, info: &ChannelInfo, out: &mut OutputConfig) {
        if let Some(key) = &info.stream_key {
            out.key = key.clone();
        }
        if let Some(server) = &info.ingest_server {
            out.server = server.clone();
        }
    }
}
