//! Streaming-service backends.
//!
//! Every supported platform is a variant of the closed [`Backend`] enum.
//! A backend knows its provider endpoints, OAuth scope set, and how to map
//! the provider's channel APIs onto [`ChannelInfo`]; the token lifecycle
//! itself lives in [`crate::oauth::OAuthEngine`] and is shared by all of
//! them.

use crate::error::AuthError;
use serde_json::Value;

pub mod restream;
pub mod twitch;
pub mod youtube;

pub use restream::RestreamBackend;
pub use twitch::TwitchBackend;
pub use youtube::{YouTubeBackend, YouTubeVariant};

/// Which session shape a backend produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// After sign-in the backend exposes a static stream key the host
    /// injects into its output configuration.
    OAuthStreamKey,
    /// Sign-in links an account without providing stream credentials.
    OAuthLinkedAccount,
    /// The stream key only exists once a scheduled broadcast has been
    /// created and bound; the session exposes a broadcast coordinator
    /// instead of a static key.
    OAuthBroadcast,
}

/// Identity of a registered backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Name matched (by substring) against the host's configured service
    /// string, and used as the persistence section.
    pub name: &'static str,
    pub kind: ServiceKind,
    /// Backends that apply their own stream settings; generic key
    /// injection is skipped for these.
    pub external: bool,
}

/// Channel metadata captured once per session after the first
/// authenticated channel query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub display_name: String,
    pub stream_key: Option<String>,
    pub ingest_server: Option<String>,
}

/// Provider endpoint set. Defaults point at the real services; tests
/// substitute local listeners.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

/// OAuth application credentials issued to the host by a provider.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
        }
    }

    /// Public clients (implicit grant) have no secret.
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
        }
    }
}

/// The output configuration the host hands to
/// [`crate::session::Session::on_stream_configured`] right before starting
/// the encoder.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub server: String,
    pub key: String,
    /// When set, backends that support it mark the injected key so the
    /// provider treats the session as a bandwidth test.
    pub bandwidth_test: bool,
}

/// The closed set of supported platforms.
#[derive(Debug)]
pub enum Backend {
    Twitch(TwitchBackend),
    Restream(RestreamBackend),
    YouTube(YouTubeBackend),
}

impl Backend {
    pub fn descriptor(&self) -> ServiceDescriptor {
        match self {
            Backend::Twitch(b) => b.descriptor(),
            Backend::Restream(b) => b.descriptor(),
            Backend::YouTube(b) => b.descriptor(),
        }
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        match self {
            Backend::Twitch(b) => &b.endpoints,
            Backend::Restream(b) => &b.endpoints,
            Backend::YouTube(b) => &b.endpoints,
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            Backend::Twitch(b) => &b.credentials.client_id,
            Backend::Restream(b) => &b.credentials.client_id,
            Backend::YouTube(b) => &b.credentials.client_id,
        }
    }

    pub fn client_secret(&self) -> Option<&str> {
        match self {
            Backend::Twitch(b) => b.credentials.client_secret.as_deref(),
            Backend::Restream(b) => b.credentials.client_secret.as_deref(),
            Backend::YouTube(b) => b.credentials.client_secret.as_deref(),
        }
    }

    /// The scope-version tag minted tokens are stamped with. Bumped by a
    /// backend whenever it starts requesting additional scopes, so that
    /// tokens granted under the older set trigger re-authorization.
    pub fn scope_version(&self) -> i64 {
        match self {
            Backend::Twitch(_) => twitch::SCOPE_VERSION,
            Backend::Restream(_) => restream::SCOPE_VERSION,
            Backend::YouTube(_) => youtube::SCOPE_VERSION,
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        let scopes: &[&str] = match self {
            Backend::Twitch(_) => twitch::SCOPES,
            Backend::Restream(_) => restream::SCOPES,
            Backend::YouTube(_) => youtube::SCOPES,
        };
        scopes.iter().map(|s| s.to_string()).collect()
    }

    /// Whether this backend uses the implicit grant (no refresh token is
    /// ever issued).
    pub fn implicit(&self) -> bool {
        matches!(self, Backend::Twitch(_))
    }

    /// Runs the provider's channel query and maps the response onto
    /// [`ChannelInfo`]. Called once per session; the engine caches the
    /// result.
    pub(crate) async fn fetch_channel_info(
        &self,
        http: &reqwest::Client,
        bearer: &str,
    ) -> Result<ChannelInfo, AuthError> {
        match self {
            Backend::Twitch(b) => b.fetch_channel_info(http, bearer).await,
            Backend::Restream(b) => b.fetch_channel_info(http, bearer).await,
            Backend::YouTube(b) => b.fetch_channel_info(http, bearer).await,
        }
    }

    /// Injects the session's stream settings into the host's output
    /// configuration.
    pub(crate) fn apply_stream_settings(&self, info: &ChannelInfo, out: &mut OutputConfig) {
        match self {
            Backend::Twitch(b) => b.apply_stream_settings(info, out),
            Backend::Restream(b) => b.apply_stream_settings(info, out),
            // Broadcast-flow backends apply their own settings once a
            // broadcast is bound.
            Backend::YouTube(_) => {}
        }
    }
}

/// Performs an authenticated GET and returns the parsed JSON body.
///
/// Non-success statuses are mapped to [`AuthError::Provider`], decoding
/// the error envelope when the provider sent one.
pub(crate) async fn authed_get_json(
    http: &reqwest::Client,
    url: &str,
    bearer: &str,
    extra_headers: &[(&str, &str)],
) -> Result<Value, AuthError> {
    let mut request = http
        .get(url)
        .header("Authorization", format!("Bearer {bearer}"));
    for (name, value) in extra_headers {
        request = request.header(*name, *value);
    }
    let response = request.send().await.map_err(|e| AuthError::Transport {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| AuthError::Transport {
        url: url.to_string(),
        detail: format!("read response body: {e}"),
    })?;

    if !(200..300).contains(&status) {
        return Err(provider_error(url, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| AuthError::Parse {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

/// Decodes an error payload into [`AuthError::Provider`], tolerating both
/// the nested Google-style envelope and the flat `{"error": ..,
/// "message": ..}` shape used by the other providers.
pub(crate) fn provider_error(url: &str, status: u16, body: &str) -> AuthError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        // Google-style: {"error": {"message": .., "errors": [{"reason": ..}]}}
        if let Some(error) = value.get("error").filter(|e| e.is_object()) {
            let code = error
                .pointer("/errors/0/reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let description = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return AuthError::Provider {
                code,
                description,
                status,
            };
        }
        // Flat: {"error": "Forbidden", "message": "..."}
        if let Some(code) = value.get("error").and_then(Value::as_str) {
            let description = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return AuthError::Provider {
                code: code.to_string(),
                description,
                status,
            };
        }
    }
    tracing::debug!(url, status, "error response body was not a recognized envelope");
    AuthError::Provider {
        code: format!("http_{status}"),
        description: String::new(),
        status,
    }
}
