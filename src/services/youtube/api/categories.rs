//! Video category lookup types.
//!
//! See: <https://developers.google.com/youtube/v3/docs/videoCategories>

use serde::{Deserialize, Serialize};

/// Response shape of `videoCategories.list`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoCategoryListResponse {
    #[serde(default)]
    pub items: Vec<VideoCategoryResource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoCategoryResource {
    pub id: String,
    pub snippet: VideoCategorySnippet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoCategorySnippet {
    pub title: String,
    /// Only assignable categories may be set on a video.
    #[serde(default)]
    pub assignable: bool,
}

/// A category a broadcast's video can be filed under, keyed by the
/// provider's numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCategory {
    pub id: String,
    pub title: String,
}
