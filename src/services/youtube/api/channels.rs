//! Channel resource types, trimmed to the fields the session needs.
//!
//! See: <https://developers.google.com/youtube/v3/docs/channels>

use crate::services::youtube::api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response shape of `channels.list`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: VecDeque<Channel>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub snippet: ChannelSnippet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelSnippet {
    pub title: String,
}
