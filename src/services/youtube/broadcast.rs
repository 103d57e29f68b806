//! The broadcast lifecycle coordinator.
//!
//! Workflow: create a broadcast (the viewer-facing event) and a stream
//! (the ingest pipeline), bind them, go live, and eventually complete.
//! Going live first re-synchronizes the broadcast with whatever the
//! provider has mutated server-side (most notably the monitor-stream
//! settings), since a stale monitor configuration blocks the transition.

use crate::error::AuthError;
use crate::oauth::OAuthEngine;
use crate::services::Backend;
use crate::services::youtube::api::client::ApiClient;
use crate::services::youtube::api::{
    BroadcastLifeCycleStatus, BroadcastTransition, LiveBroadcast, LiveBroadcastListResponse,
    LiveStream, LiveStreamListResponse, PagedStream, VideoCategory, VideoCategoryListResponse,
};
use http::Method;
use jiff::Timestamp;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio_stream::Stream;

/// Broadcast titles must be 1..=100 characters.
pub const BROADCAST_TITLE_MAX: usize = 100;
/// Broadcast descriptions must be at most 5000 characters.
pub const BROADCAST_DESCRIPTION_MAX: usize = 5000;
/// Stream titles must be 1..=128 characters.
pub const STREAM_TITLE_MAX: usize = 128;
/// Stream descriptions must be at most 10000 characters.
pub const STREAM_DESCRIPTION_MAX: usize = 10000;

/// Privacy of the viewer-facing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastPrivacy {
    Public,
    Unlisted,
    #[default]
    Private,
}

impl BroadcastPrivacy {
    fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

/// Latency/quality trade-off requested for the broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastLatency {
    #[default]
    Normal,
    Low,
    UltraLow,
}

impl BroadcastLatency {
    fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Low => "low",
            Self::UltraLow => "ultraLow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastProjection {
    #[default]
    Rectangular,
    ThreeSixty,
}

impl BroadcastProjection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Rectangular => "rectangular",
            Self::ThreeSixty => "360",
        }
    }
}

/// Everything needed to create a broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastDescriptor {
    pub title: String,
    pub description: String,
    pub privacy: BroadcastPrivacy,
    /// When unset, the broadcast is scheduled for "now".
    pub scheduled_start: Option<Timestamp>,
    pub auto_start: bool,
    pub auto_stop: bool,
    pub latency: BroadcastLatency,
    pub made_for_kids: bool,
    pub dvr: bool,
    pub projection: BroadcastProjection,
}

impl BroadcastDescriptor {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            privacy: BroadcastPrivacy::default(),
            scheduled_start: None,
            auto_start: false,
            auto_stop: false,
            latency: BroadcastLatency::default(),
            made_for_kids: false,
            dvr: true,
            projection: BroadcastProjection::default(),
        }
    }
}

/// Everything needed to create a stream.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub title: String,
    pub description: String,
}

impl StreamDescriptor {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }
}

/// The ingest credentials a freshly created stream hands back: the id to
/// bind with and the stream name the encoder presents as its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPoint {
    pub stream_id: String,
    pub stream_name: String,
}

/// Which broadcasts to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastFilter {
    /// Every broadcast owned by the signed-in account.
    All,
    Active,
    Upcoming,
    Completed,
}

impl BroadcastFilter {
    fn status_param(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Active => Some("active"),
            Self::Upcoming => Some("upcoming"),
            Self::Completed => Some("completed"),
        }
    }
}

/// Drives the broadcast lifecycle for one signed-in YouTube session.
///
/// Cheap to clone; clones share the session's engine and per-session
/// category cache.
#[derive(Clone)]
pub struct BroadcastCoordinator {
    api: ApiClient,
    engine: Arc<OAuthEngine>,
    /// Categories are looked up on demand and kept for the session only.
    categories: Arc<Mutex<Vec<VideoCategory>>>,
}

impl BroadcastCoordinator {
    pub(crate) fn new(engine: Arc<OAuthEngine>) -> Self {
        Self {
            api: ApiClient::new(engine.clone()),
            engine,
            categories: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Default ingestion address for the session's service variant.
    pub fn ingest_server(&self) -> String {
        match self.engine.backend() {
            Backend::YouTube(backend) => backend.variant().ingest_server().to_string(),
            _ => unreachable!("broadcast coordinator only exists for YouTube sessions"),
        }
    }

    /// Creates a broadcast and returns its id.
    ///
    /// Lengths are checked locally first so oversize input fails without a
    /// round trip.
    pub async fn insert_broadcast(
        &self,
        broadcast: &BroadcastDescriptor,
    ) -> Result<String, AuthError> {
        validate_length("broadcast title", &broadcast.title, 1, BROADCAST_TITLE_MAX)?;
        validate_length(
            "broadcast description",
            &broadcast.description,
            0,
            BROADCAST_DESCRIPTION_MAX,
        )?;

        let scheduled_start = broadcast.scheduled_start.unwrap_or_else(Timestamp::now);
        let body = json!({
            "snippet": {
                "title": broadcast.title,
                "description": broadcast.description,
                "scheduledStartTime": scheduled_start.to_string(),
            },
            "status": {
                "privacyStatus": broadcast.privacy.as_str(),
                "selfDeclaredMadeForKids": broadcast.made_for_kids,
            },
            "contentDetails": {
                "latencyPreference": broadcast.latency.as_str(),
                "enableAutoStart": broadcast.auto_start,
                "enableAutoStop": broadcast.auto_stop,
                "enableDvr": broadcast.dvr,
                "projection": broadcast.projection.as_str(),
                "monitorStream": {
                    "enableMonitorStream": false,
                },
            },
        });

        let created: LiveBroadcast = self
            .api
            .request(
                Method::POST,
                "/liveBroadcasts",
                &[("part", "snippet,status,contentDetails".to_string())],
                Some(&body),
            )
            .await?;
        tracing::info!(broadcast = %created.id, title = %broadcast.title, "created broadcast");
        Ok(created.id)
    }

    /// Creates a stream and returns its ingest credentials.
    pub async fn insert_stream(&self, stream: &StreamDescriptor) -> Result<IngestPoint, AuthError> {
        validate_length("stream title", &stream.title, 1, STREAM_TITLE_MAX)?;
        validate_length(
            "stream description",
            &stream.description,
            0,
            STREAM_DESCRIPTION_MAX,
        )?;

        let body = json!({
            "snippet": {
                "title": stream.title,
                "description": stream.description,
            },
            "cdn": {
                "frameRate": "variable",
                "ingestionType": "rtmp",
                "resolution": "variable",
            },
            "contentDetails": {
                "isReusable": false,
            },
        });

        let created: LiveStream = self
            .api
            .request(
                Method::POST,
                "/liveStreams",
                &[("part", "snippet,cdn,status,contentDetails".to_string())],
                Some(&body),
            )
            .await?;
        let stream_name = created
            .cdn
            .as_ref()
            .and_then(|cdn| cdn.ingestion_info.as_ref())
            .and_then(|info| info.stream_name.clone())
            .ok_or_else(|| AuthError::Parse {
                url: "/liveStreams".into(),
                detail: "created stream carried no ingestion stream name".into(),
            })?;
        tracing::info!(stream = %created.id, "created stream");
        Ok(IngestPoint {
            stream_id: created.id,
            stream_name,
        })
    }

    /// Binds a broadcast to a stream; required before the broadcast can go
    /// live. An empty stream id unbinds.
    pub async fn bind(&self, broadcast_id: &str, stream_id: &str) -> Result<(), AuthError> {
        let mut query = vec![
            ("id", broadcast_id.to_string()),
            ("part", "id,snippet,contentDetails,status".to_string()),
        ];
        if !stream_id.is_empty() {
            query.push(("streamId", stream_id.to_string()));
        }
        let _: Value = self
            .api
            .request(Method::POST, "/liveBroadcasts/bind", &query, Some(&json!({})))
            .await?;
        tracing::info!(
            broadcast = broadcast_id,
            stream = stream_id,
            "bound broadcast to stream"
        );
        Ok(())
    }

    /// Transitions the broadcast to live.
    ///
    /// The broadcast is fetched first: an already-live broadcast is a
    /// success, a broadcast still entering testing has to be waited out,
    /// and one with a monitor stream enabled is reset before the
    /// transition (the provider refuses to go live otherwise).
    pub async fn start(&self, broadcast_id: &str) -> Result<(), AuthError> {
        let broadcast = self.find_broadcast(broadcast_id).await?;

        match broadcast.status.life_cycle_status {
            BroadcastLifeCycleStatus::Live | BroadcastLifeCycleStatus::LiveStarting => {
                tracing::debug!(broadcast = broadcast_id, "broadcast is already (going) live");
                return Ok(());
            }
            BroadcastLifeCycleStatus::TestStarting => {
                return Err(AuthError::Provider {
                    code: "broadcastTestStarting".into(),
                    description:
                        "the broadcast is still entering testing; wait a few seconds and try again"
                            .into(),
                    status: 409,
                });
            }
            _ => {}
        }

        let monitor_enabled = broadcast
            .content_details
            .as_ref()
            .and_then(|details| details.monitor_stream.as_ref())
            .and_then(|monitor| monitor.enable_monitor_stream)
            .unwrap_or(false);
        if broadcast.status.life_cycle_status != BroadcastLifeCycleStatus::Testing
            && monitor_enabled
        {
            self.reset_from(&broadcast).await?;
        }

        match self
            .transition(broadcast_id, BroadcastTransition::Live)
            .await
        {
            Ok(()) => {
                tracing::info!(broadcast = broadcast_id, "broadcast is live");
                Ok(())
            }
            Err(e) if e.is_redundant_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Transitions the broadcast to complete. Idempotent: stopping an
    /// already-complete broadcast succeeds.
    pub async fn stop(&self, broadcast_id: &str) -> Result<(), AuthError> {
        match self
            .transition(broadcast_id, BroadcastTransition::Complete)
            .await
        {
            Ok(()) => {
                tracing::info!(broadcast = broadcast_id, "broadcast completed");
                Ok(())
            }
            Err(e) if e.is_redundant_transition() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Rewrites the broadcast from its current provider-side state with
    /// the monitor stream disabled, normalizing any drift before a
    /// transition.
    pub async fn reset(&self, broadcast_id: &str) -> Result<(), AuthError> {
        let broadcast = self.find_broadcast(broadcast_id).await?;
        self.reset_from(&broadcast).await
    }

    async fn reset_from(&self, broadcast: &LiveBroadcast) -> Result<(), AuthError> {
        let details = broadcast.content_details.as_ref();
        let monitor_delay = details
            .and_then(|d| d.monitor_stream.as_ref())
            .and_then(|m| m.broadcast_stream_delay_ms);

        let body = strip_nulls(json!({
            "id": broadcast.id,
            "snippet": {
                "title": broadcast.snippet.title,
                "description": broadcast.snippet.description,
                "scheduledStartTime": broadcast.snippet.scheduled_start_time,
                "scheduledEndTime": broadcast.snippet.scheduled_end_time,
            },
            "status": {
                "privacyStatus": broadcast.status.privacy_status,
                "madeForKids": broadcast.status.made_for_kids,
                "selfDeclaredMadeForKids": broadcast.status.self_declared_made_for_kids,
            },
            "contentDetails": {
                "monitorStream": {
                    "enableMonitorStream": false,
                    "broadcastStreamDelayMs": monitor_delay,
                },
                "enableAutoStart": details.and_then(|d| d.enable_auto_start),
                "enableAutoStop": details.and_then(|d| d.enable_auto_stop),
                "enableClosedCaptions": details.and_then(|d| d.enable_closed_captions),
                "enableDvr": details.and_then(|d| d.enable_dvr),
                "enableContentEncryption": details.and_then(|d| d.enable_content_encryption),
                "enableEmbed": details.and_then(|d| d.enable_embed),
                "recordFromStart": details.and_then(|d| d.record_from_start),
                "startWithSlate": details.and_then(|d| d.start_with_slate),
            },
        }));

        let _: Value = self
            .api
            .request(
                Method::PUT,
                "/liveBroadcasts",
                &[("part", "id,snippet,contentDetails,status".to_string())],
                Some(&body),
            )
            .await?;
        tracing::debug!(broadcast = %broadcast.id, "reset broadcast to a clean monitor-off state");
        Ok(())
    }

    async fn transition(
        &self,
        broadcast_id: &str,
        to: BroadcastTransition,
    ) -> Result<(), AuthError> {
        let query = [
            ("id", broadcast_id.to_string()),
            ("broadcastStatus", to.as_str().to_string()),
            ("part", "status".to_string()),
        ];
        let _: Value = self
            .api
            .request(
                Method::POST,
                "/liveBroadcasts/transition",
                &query,
                Some(&json!({})),
            )
            .await?;
        Ok(())
    }

    /// Fetches a single broadcast by id.
    pub async fn find_broadcast(&self, broadcast_id: &str) -> Result<LiveBroadcast, AuthError> {
        let query = [
            ("part", "id,snippet,contentDetails,status".to_string()),
            ("broadcastType", "all".to_string()),
            ("maxResults", "1".to_string()),
            ("id", broadcast_id.to_string()),
        ];
        let mut response: LiveBroadcastListResponse = self
            .api
            .request(Method::GET, "/liveBroadcasts", &query, None)
            .await?;
        response.items.pop_front().ok_or_else(|| AuthError::Provider {
            code: "liveBroadcastNotFound".into(),
            description: format!("no broadcast found with id {broadcast_id}"),
            status: 404,
        })
    }

    /// Fetches a single stream by id.
    pub async fn find_stream(&self, stream_id: &str) -> Result<LiveStream, AuthError> {
        let query = [
            ("part", "id,snippet,cdn,status".to_string()),
            ("maxResults", "1".to_string()),
            ("id", stream_id.to_string()),
        ];
        let mut response: LiveStreamListResponse = self
            .api
            .request(Method::GET, "/liveStreams", &query, None)
            .await?;
        response.items.pop_front().ok_or_else(|| AuthError::Provider {
            code: "liveStreamNotFound".into(),
            description: format!("no stream found with id {stream_id}"),
            status: 404,
        })
    }

    /// Streams the account's broadcasts, fetching pages as needed.
    pub fn list_broadcasts(
        &self,
        filter: BroadcastFilter,
    ) -> impl Stream<Item = Result<LiveBroadcast, AuthError>> + use<'_> {
        PagedStream::new(move |page_token| async move {
            let mut query = vec![
                ("part", "snippet,contentDetails,status".to_string()),
                ("broadcastType", "all".to_string()),
                ("maxResults", "50".to_string()),
            ];
            match filter.status_param() {
                Some(status) => query.push(("broadcastStatus", status.to_string())),
                None => query.push(("mine", "true".to_string())),
            }
            if let Some(token) = page_token {
                query.push(("pageToken", token));
            }
            let response: LiveBroadcastListResponse = self
                .api
                .request(Method::GET, "/liveBroadcasts", &query, None)
                .await?;
            Ok((response.items, response.next_page_token))
        })
    }

    /// The assignable video categories for `locale`, cached for the
    /// session after the first lookup.
    ///
    /// The region is pinned to US: some regions are missing categories via
    /// the API that are still assignable to channels there, and no region
    /// offers a category the US set lacks. Only the language half of the
    /// locale is used. Unsupported languages fall back to `en_US`.
    pub async fn video_categories(&self, locale: &str) -> Result<Vec<VideoCategory>, AuthError> {
        {
            let cached = self.categories.lock().expect("category cache lock");
            if !cached.is_empty() {
                return Ok(cached.clone());
            }
        }

        let language = locale.replace('-', "_");
        let list = match self.fetch_categories(&language).await {
            Ok(list) => list,
            Err(AuthError::Provider { code, .. })
                if code == "unsupportedLanguageCode" || code == "invalidLanguage" =>
            {
                tracing::debug!(locale = language, "locale not accepted, retrying with en_US");
                self.fetch_categories("en_US").await?
            }
            Err(e) => return Err(e),
        };

        *self.categories.lock().expect("category cache lock") = list.clone();
        Ok(list)
    }

    async fn fetch_categories(&self, language: &str) -> Result<Vec<VideoCategory>, AuthError> {
        let query = [
            ("part", "snippet".to_string()),
            ("regionCode", "US".to_string()),
            ("hl", language.to_string()),
        ];
        let response: VideoCategoryListResponse = self
            .api
            .request(Method::GET, "/videoCategories", &query, None)
            .await?;

        let list: Vec<VideoCategory> = response
            .items
            .into_iter()
            .filter(|item| item.snippet.assignable)
            .map(|item| VideoCategory {
                id: item.id,
                title: item.snippet.title,
            })
            .collect();
        if list.is_empty() {
            return Err(AuthError::Provider {
                code: "noCategories".into(),
                description: "no assignable video categories returned".into(),
                status: 200,
            });
        }
        Ok(list)
    }

    /// Updates the broadcast video's title, description, and category.
    pub async fn set_video_metadata(
        &self,
        video_id: &str,
        title: &str,
        description: &str,
        category_id: &str,
    ) -> Result<(), AuthError> {
        validate_length("video title", title, 1, BROADCAST_TITLE_MAX)?;
        validate_length("video description", description, 0, BROADCAST_DESCRIPTION_MAX)?;

        let body = json!({
            "id": video_id,
            "snippet": {
                "title": title,
                "description": description,
                "categoryId": category_id,
            },
        });
        let _: Value = self
            .api
            .request(
                Method::PUT,
                "/videos",
                &[("part", "snippet".to_string())],
                Some(&body),
            )
            .await?;
        Ok(())
    }
}

fn validate_length(what: &str, value: &str, min: usize, max: usize) -> Result<(), AuthError> {
    let length = value.chars().count();
    if length < min {
        return Err(AuthError::Validation(format!(
            "{what} must be at least {min} character{}",
            if min == 1 { "" } else { "s" }
        )));
    }
    if length > max {
        return Err(AuthError::Validation(format!(
            "{what} must be at most {max} characters (got {length})"
        )));
    }
    Ok(())
}

/// Drops `null` members from JSON objects, recursively. The update APIs
/// distinguish "absent" from "null", and absent is what "leave unchanged"
/// means.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::ConsentOutcome;
    use crate::credential::{Credential, unix_now};
    use crate::services::youtube::{YouTubeBackend, YouTubeVariant};
    use crate::services::{ClientCredentials, ProviderEndpoints};
    use crate::store::{MemoryStore, shared};
    use crate::testutil::{FakeConsent, MockServer};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    fn coordinator_for(server: &MockServer) -> BroadcastCoordinator {
        let backend = Backend::YouTube(YouTubeBackend::with_endpoints(
            YouTubeVariant::Rtmp,
            ProviderEndpoints {
                auth_url: format!("{}/authorize", server.url()),
                token_url: format!("{}/token", server.url()),
                api_url: server.url(),
            },
            ClientCredentials::new("client-id", "client-secret"),
        ));
        let engine = Arc::new(OAuthEngine::new(
            backend,
            FakeConsent::new(ConsentOutcome::Cancelled),
            shared(MemoryStore::new()),
        ));
        engine.seed_credential(Credential {
            token: "valid-token".into(),
            refresh_token: "refresh".into(),
            expire_time: unix_now() + 600,
            scope_version: 1,
            implicit: false,
        });
        BroadcastCoordinator::new(engine)
    }

    fn broadcast_json(id: &str, status: &str, monitor_enabled: bool) -> String {
        format!(
            r#"{{"items":[{{"id":"{id}","snippet":{{"title":"t"}},
                 "status":{{"lifeCycleStatus":"{status}","privacyStatus":"private"}},
                 "contentDetails":{{"monitorStream":{{"enableMonitorStream":{monitor_enabled}}}}}}}],
                 "pageInfo":{{"totalResults":1,"resultsPerPage":1}}}}"#
        )
    }

    #[tokio::test]
    async fn oversize_title_fails_without_any_network_call() {
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let coordinator = coordinator_for(&server);

        let broadcast = BroadcastDescriptor::new("x".repeat(BROADCAST_TITLE_MAX + 1));
        let err = coordinator
            .insert_broadcast(&broadcast)
            .await
            .expect_err("101-char title");
        assert!(matches!(err, AuthError::Validation(_)), "{err:?}");
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn empty_title_and_oversize_description_are_rejected_locally() {
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let coordinator = coordinator_for(&server);

        let err = coordinator
            .insert_broadcast(&BroadcastDescriptor::new(""))
            .await
            .expect_err("empty title");
        assert!(matches!(err, AuthError::Validation(_)), "{err:?}");

        let mut broadcast = BroadcastDescriptor::new("ok");
        broadcast.description = "d".repeat(BROADCAST_DESCRIPTION_MAX + 1);
        let err = coordinator
            .insert_broadcast(&broadcast)
            .await
            .expect_err("oversize description");
        assert!(matches!(err, AuthError::Validation(_)), "{err:?}");

        let err = coordinator
            .insert_stream(&StreamDescriptor::new("y".repeat(STREAM_TITLE_MAX + 1)))
            .await
            .expect_err("oversize stream title");
        assert!(matches!(err, AuthError::Validation(_)), "{err:?}");

        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn insert_bind_and_start_walk_the_expected_endpoints() {
        let server = MockServer::spawn(|req| match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/liveBroadcasts") => (
                200,
                r#"{"id":"bc-1","snippet":{"title":"t"},"status":{"lifeCycleStatus":"created"}}"#
                    .into(),
            ),
            ("POST", "/liveStreams") => (
                200,
                r#"{"id":"st-1","snippet":{"title":"t"},
                    "cdn":{"ingestionInfo":{"streamName":"abcd-1234"}}}"#
                    .into(),
            ),
            ("POST", "/liveBroadcasts/bind") => (200, r#"{"id":"bc-1"}"#.into()),
            ("GET", "/liveBroadcasts") => (200, broadcast_json("bc-1", "ready", false)),
            ("POST", "/liveBroadcasts/transition") => {
                assert!(req.query.contains("broadcastStatus=live"));
                (200, r#"{"id":"bc-1"}"#.into())
            }
            other => panic!("unexpected request: {other:?}"),
        })
        .await;
        let coordinator = coordinator_for(&server);

        let broadcast_id = coordinator
            .insert_broadcast(&BroadcastDescriptor::new("Friday show"))
            .await
            .expect("insert broadcast");
        assert_eq!(broadcast_id, "bc-1");

        let ingest = coordinator
            .insert_stream(&StreamDescriptor::new("Friday ingest"))
            .await
            .expect("insert stream");
        assert_eq!(
            ingest,
            IngestPoint {
                stream_id: "st-1".into(),
                stream_name: "abcd-1234".into(),
            }
        );

        coordinator.bind(&broadcast_id, &ingest.stream_id).await.expect("bind");
        coordinator.start(&broadcast_id).await.expect("go live");
    }

    #[tokio::test]
    async fn start_resets_first_when_the_monitor_stream_is_enabled() {
        let resets = Arc::new(AtomicUsize::new(0));
        let seen = resets.clone();
        let server = MockServer::spawn(move |req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/liveBroadcasts") => (200, broadcast_json("bc-1", "ready", true)),
            ("PUT", "/liveBroadcasts") => {
                seen.fetch_add(1, Ordering::SeqCst);
                assert!(req.body.contains(r#""enableMonitorStream":false"#));
                (200, r#"{"id":"bc-1"}"#.into())
            }
            ("POST", "/liveBroadcasts/transition") => (200, r#"{"id":"bc-1"}"#.into()),
            other => panic!("unexpected request: {other:?}"),
        })
        .await;
        let coordinator = coordinator_for(&server);

        coordinator.start("bc-1").await.expect("go live");
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_is_a_no_op_when_already_live() {
        let server = MockServer::spawn(|req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/liveBroadcasts") => (200, broadcast_json("bc-1", "live", true)),
            other => panic!("unexpected request: {other:?}"),
        })
        .await;
        let coordinator = coordinator_for(&server);

        coordinator.start("bc-1").await.expect("already live");
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn start_refuses_while_the_test_transition_is_in_flight() {
        let server = MockServer::spawn(|req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/liveBroadcasts") => (200, broadcast_json("bc-1", "testStarting", false)),
            other => panic!("unexpected request: {other:?}"),
        })
        .await;
        let coordinator = coordinator_for(&server);

        let err = coordinator.start("bc-1").await.expect_err("not startable yet");
        match err {
            AuthError::Provider { code, .. } => assert_eq!(code, "broadcastTestStarting"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_is_idempotent_via_redundant_transition() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let server = MockServer::spawn(move |req| {
            assert_eq!(req.path, "/liveBroadcasts/transition");
            assert!(req.query.contains("broadcastStatus=complete"));
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                (200, r#"{"id":"bc-1"}"#.into())
            } else {
                (
                    400,
                    r#"{"error":{"code":403,"message":"Redundant transition",
                        "errors":[{"reason":"redundantTransition"}]}}"#
                        .into(),
                )
            }
        })
        .await;
        let coordinator = coordinator_for(&server);

        coordinator.stop("bc-1").await.expect("first stop");
        coordinator.stop("bc-1").await.expect("second stop is redundant but fine");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn list_broadcasts_follows_page_tokens() {
        let server = MockServer::spawn(|req| {
            assert_eq!(req.path, "/liveBroadcasts");
            assert!(req.query.contains("mine=true"));
            if req.query.contains("pageToken=page-2") {
                (
                    200,
                    r#"{"items":[{"id":"bc-2","snippet":{"title":"b"},
                        "status":{"lifeCycleStatus":"complete"}}],
                        "pageInfo":{"totalResults":2,"resultsPerPage":1}}"#
                        .into(),
                )
            } else {
                (
                    200,
                    r#"{"items":[{"id":"bc-1","snippet":{"title":"a"},
                        "status":{"lifeCycleStatus":"live"}}],
                        "pageInfo":{"totalResults":2,"resultsPerPage":1},
                        "nextPageToken":"page-2"}"#
                        .into(),
                )
            }
        })
        .await;
        let coordinator = coordinator_for(&server);

        let broadcasts = coordinator.list_broadcasts(BroadcastFilter::All);
        let mut broadcasts = std::pin::pin!(broadcasts);
        let mut ids = Vec::new();
        while let Some(broadcast) = broadcasts.next().await {
            ids.push(broadcast.expect("list page").id);
        }
        assert_eq!(ids, vec!["bc-1", "bc-2"]);
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn categories_fall_back_to_en_us_and_keep_only_assignable() {
        let server = MockServer::spawn(|req| {
            assert_eq!(req.path, "/videoCategories");
            if req.query.contains("hl=xx_XX") {
                (
                    400,
                    r#"{"error":{"code":400,"message":"bad language",
                        "errors":[{"reason":"unsupportedLanguageCode"}]}}"#
                        .into(),
                )
            } else {
                assert!(req.query.contains("hl=en_US"));
                (
                    200,
                    r#"{"items":[
                        {"id":"20","snippet":{"title":"Gaming","assignable":true}},
                        {"id":"21","snippet":{"title":"Movies","assignable":false}}
                    ]}"#
                    .into(),
                )
            }
        })
        .await;
        let coordinator = coordinator_for(&server);

        let categories = coordinator
            .video_categories("xx-XX")
            .await
            .expect("category lookup");
        assert_eq!(
            categories,
            vec![VideoCategory {
                id: "20".into(),
                title: "Gaming".into(),
            }]
        );

        // second lookup is served from the session cache
        let again = coordinator.video_categories("xx-XX").await.expect("cached");
        assert_eq!(again, categories);
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_the_api_call() {
        let server = MockServer::spawn(|req| match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/token") => {
                assert!(req.body.contains("grant_type=refresh_token"));
                (
                    200,
                    r#"{"access_token":"minted","token_type":"bearer","expires_in":3600}"#.into(),
                )
            }
            ("GET", "/liveStreams") => (
                200,
                r#"{"items":[{"id":"st-1","status":{"streamStatus":"ready"}}],
                    "pageInfo":{"totalResults":1,"resultsPerPage":1}}"#
                    .into(),
            ),
            other => panic!("unexpected request: {other:?}"),
        })
        .await;
        let coordinator = coordinator_for(&server);
        coordinator.engine.seed_credential(Credential {
            token: "stale".into(),
            refresh_token: "refresh".into(),
            expire_time: 0,
            scope_version: 1,
            implicit: false,
        });

        let stream = coordinator.find_stream("st-1").await.expect("find stream");
        assert!(!stream.is_active());
        assert_eq!(server.hits(), 2);
    }
}
