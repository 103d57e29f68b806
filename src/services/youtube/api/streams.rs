//! Live stream resource types.
//!
//! A stream is the ingest pipeline: CDN settings, the ingestion address,
//! and the stream name the encoder authenticates with. One stream can
//! power many broadcasts; the broadcast goes live only after being bound
//! to one.
//!
//! See: <https://developers.google.com/youtube/v3/live/docs/liveStreams>

use crate::services::youtube::api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Response shape of `liveStreams.list`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveStreamListResponse {
    #[serde(default)]
    pub items: VecDeque<LiveStream>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `liveStream` resource.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveStreams#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveStream {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<LiveStreamSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn: Option<StreamCdn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LiveStreamStatus>,
}

impl LiveStream {
    /// Whether the provider reports the ingest pipeline as receiving data.
    pub fn is_active(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| s.stream_status == StreamStatus::Active)
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LiveStreamSnippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CDN configuration; only the ingestion details are interesting here.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCdn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_info: Option<IngestionInfo>,
}

/// The encoder-facing half of the stream: where to send and the secret
/// stream name presented on connect.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_ingestion_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LiveStreamStatus {
    #[serde(rename = "streamStatus")]
    pub stream_status: StreamStatus,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveStreams#status.streamStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamStatus {
    /// Receiving data.
    Active,
    /// Exists but has no valid CDN settings yet.
    Created,
    Error,
    /// Not receiving data.
    Inactive,
    /// Valid CDN settings, waiting for data.
    Ready,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Created => "created",
            Self::Error => "error",
            Self::Inactive => "inactive",
            Self::Ready => "ready",
        };
        write!(f, "{s}")
    }
}
