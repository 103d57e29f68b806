//! YouTube backend family.
//!
//! Three service variants share this backend — they differ only in which
//! ingestion endpoint the encoder is pointed at. Unlike the stream-key
//! services there is no static key: the key comes from the live stream a
//! broadcast is bound to, which is the job of
//! [`broadcast::BroadcastCoordinator`].

use crate::error::AuthError;
use crate::services::{
    ChannelInfo, ClientCredentials, ProviderEndpoints, ServiceDescriptor, ServiceKind,
    authed_get_json,
};

pub mod api;
pub mod broadcast;
pub mod monitor;

pub use broadcast::{
    BroadcastCoordinator, BroadcastDescriptor, BroadcastFilter, BroadcastLatency,
    BroadcastPrivacy, BroadcastProjection, IngestPoint, StreamDescriptor,
};
pub use monitor::{StreamActiveOutcome, spawn_stream_active_watch, wait_for_stream_active};

pub(crate) const SCOPE_VERSION: i64 = 1;
pub(crate) const SCOPES: &[&str] = &["https://www.googleapis.com/auth/youtube"];

/// Which ingestion protocol the encoder will use. The broadcast and
/// stream APIs are identical across the three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeVariant {
    Rtmp,
    Rtmps,
    Hls,
}

impl YouTubeVariant {
    pub fn descriptor(self) -> ServiceDescriptor {
        let name = match self {
            YouTubeVariant::Rtmp => "YouTube - RTMP",
            YouTubeVariant::Rtmps => "YouTube - RTMPS",
            YouTubeVariant::Hls => "YouTube - HLS",
        };
        ServiceDescriptor {
            name,
            kind: ServiceKind::OAuthBroadcast,
            external: true,
        }
    }

    /// Default ingestion address for this variant.
    pub fn ingest_server(self) -> &'static str {
        match self {
            YouTubeVariant::Rtmp => "rtmp://a.rtmp.youtube.com/live2",
            YouTubeVariant::Rtmps => "rtmps://a.rtmps.youtube.com:443/live2",
            YouTubeVariant::Hls => "https://a.upload.youtube.com/http_upload_hls?cid={stream_key}&copy=0&file=out.m3u8",
        }
    }
}

#[derive(Debug)]
pub struct YouTubeBackend {
    pub(crate) variant: YouTubeVariant,
    pub(crate) endpoints: ProviderEndpoints,
    pub(crate) credentials: ClientCredentials,
}

impl YouTubeBackend {
    pub fn new(variant: YouTubeVariant, credentials: ClientCredentials) -> Self {
        Self::with_endpoints(
            variant,
            ProviderEndpoints {
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
                token_url: "https://oauth2.googleapis.com/token".into(),
                api_url: "https://www.googleapis.com/youtube/v3".into(),
            },
            credentials,
        )
    }

    pub fn with_endpoints(
        variant: YouTubeVariant,
        endpoints: ProviderEndpoints,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            variant,
            endpoints,
            credentials,
        }
    }

    pub fn descriptor(&self) -> ServiceDescriptor {
        self.variant.descriptor()
    }

    pub fn variant(&self) -> YouTubeVariant {
        self.variant
    }

    /// Resolves the signed-in account's channel via `channels.list` with
    /// `mine=true`. An account without a channel is a provider error the
    /// user has to fix on the YouTube side.
    pub(crate) async fn fetch_channel_info(
        &self,
        http: &reqwest::Client,
        bearer: &str,
    ) -> Result<ChannelInfo, AuthError> {
        let url = format!("{}/channels?part=snippet&mine=true", self.endpoints.api_url);
        let body = authed_get_json(http, &url, bearer, &[]).await?;
        let response: api::ChannelListResponse =
            serde_json::from_value(body).map_err(|e| AuthError::Parse {
                url,
                detail: e.to_string(),
            })?;

        let Some(channel) = response.items.into_iter().next() else {
            return Err(AuthError::Provider {
                code: "NoChannels".into(),
                description: "no channel found for this account".into(),
                status: 200,
            });
        };

        Ok(ChannelInfo {
            id: channel.id,
            display_name: channel.snippet.title,
            stream_key: None,
            ingest_server: Some(self.variant.ingest_server().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn variants_map_to_distinct_service_names() {
        assert_eq!(YouTubeVariant::Rtmp.descriptor().name, "YouTube - RTMP");
        assert_eq!(YouTubeVariant::Rtmps.descriptor().name, "YouTube - RTMPS");
        assert_eq!(YouTubeVariant::Hls.descriptor().name, "YouTube - HLS");
    }

    #[test]
    fn all_variants_are_external_broadcast_services() {
        for variant in [
            YouTubeVariant::Rtmp,
            YouTubeVariant::Rtmps,
            YouTubeVariant::Hls,
        ] {
            let descriptor = variant.descriptor();
            assert_eq!(descriptor.kind, ServiceKind::OAuthBroadcast);
            assert!(descriptor.external);
        }
    }
}
