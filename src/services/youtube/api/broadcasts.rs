//! Live broadcast resource types.
//!
//! A broadcast is the viewer-facing live event: title, schedule, privacy,
//! lifecycle state. It must be bound to a live stream (the ingest
//! pipeline) before it can go live.
//!
//! See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts>

use crate::services::youtube::api::types::PageInfo;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Response shape of `liveBroadcasts.list`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveBroadcastListResponse {
    #[serde(default)]
    pub items: VecDeque<LiveBroadcast>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `liveBroadcast` resource.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveBroadcast {
    pub id: String,
    pub snippet: LiveBroadcastSnippet,
    pub status: LiveBroadcastStatus,
    #[serde(rename = "contentDetails", skip_serializing_if = "Option::is_none")]
    pub content_details: Option<BroadcastContentDetails>,
}

/// The fields of the broadcast snippet this crate reads or writes back.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastStatus {
    pub life_cycle_status: BroadcastLifeCycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_status: Option<BroadcastPrivacyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub made_for_kids: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_declared_made_for_kids: Option<bool>,
}

/// Where a broadcast is in its lifecycle.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status.lifeCycleStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastLifeCycleStatus {
    /// Created but incomplete settings; not yet ready to transition.
    Created,
    /// Settings complete, ready to be activated.
    Ready,
    /// The monitor stream transition is in progress.
    TestStarting,
    /// Visible only on the monitor stream.
    Testing,
    /// The transition to live is in progress.
    LiveStarting,
    Live,
    Complete,
    /// Revoked by the provider; can never be activated.
    Revoked,
}

impl fmt::Display for BroadcastLifeCycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Ready => "ready",
            Self::TestStarting => "testStarting",
            Self::Testing => "testing",
            Self::LiveStarting => "liveStarting",
            Self::Live => "live",
            Self::Complete => "complete",
            Self::Revoked => "revoked",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastPrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl fmt::Display for BroadcastPrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        };
        write!(f, "{s}")
    }
}

/// Broadcast settings the go-live path has to inspect and, on reset,
/// write back unchanged.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastContentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_stream: Option<MonitorStreamInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_auto_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_auto_stop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_closed_captions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dvr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_content_encryption: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_embed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_from_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_with_slate: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStreamInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_monitor_stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_stream_delay_ms: Option<u64>,
}

/// Target state for `liveBroadcasts.transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastTransition {
    Testing,
    Live,
    Complete,
}

impl BroadcastTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Live => "live",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for BroadcastTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
