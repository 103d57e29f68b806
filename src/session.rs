//! The host-facing handle to one signed-in service.

use crate::error::AuthError;
use crate::oauth::OAuthEngine;
use crate::services::youtube::BroadcastCoordinator;
use crate::services::{Backend, ChannelInfo, OutputConfig, ServiceDescriptor, ServiceKind};
use std::sync::Arc;

/// A signed-in service session.
///
/// Cheap to clone; all clones share the same engine, so there is exactly
/// one credential per service. Dropping every clone ends the session's
/// in-memory state — only what [`Session::save`] wrote survives.
#[derive(Clone)]
pub struct Session {
    engine: Arc<OAuthEngine>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("service", &self.engine.backend().descriptor().name)
            .finish()
    }
}

impl Session {
    pub(crate) fn new(engine: Arc<OAuthEngine>) -> Self {
        Self { engine }
    }

    pub(crate) fn engine(&self) -> &Arc<OAuthEngine> {
        &self.engine
    }

    pub fn descriptor(&self) -> ServiceDescriptor {
        self.engine.backend().descriptor()
    }

    /// Whether the session's access token must be treated as expired.
    pub fn token_expired(&self) -> bool {
        self.engine.token_expired()
    }

    /// The session's channel metadata, fetched on first use.
    pub async fn channel_info(&self) -> Result<ChannelInfo, AuthError> {
        self.engine.channel_info().await
    }

    /// The static stream key, for services that have one. Broadcast-flow
    /// services return `None`: their key is the ingest point of the bound
    /// broadcast.
    pub async fn stream_key(&self) -> Result<Option<String>, AuthError> {
        if self.descriptor().kind != ServiceKind::OAuthStreamKey {
            return Ok(None);
        }
        Ok(self.engine.channel_info().await?.stream_key)
    }

    /// Called by the host right before starting output: injects the
    /// session's key and server into the output configuration. Services
    /// that apply their own stream settings are left alone.
    pub async fn on_stream_configured(&self, output: &mut OutputConfig) -> Result<(), AuthError> {
        if self.descriptor().external {
            return Ok(());
        }
        let info = self.engine.channel_info().await?;
        self.engine.backend().apply_stream_settings(&info, output);
        Ok(())
    }

    /// The broadcast coordinator, for broadcast-capable services.
    pub fn broadcasts(&self) -> Option<BroadcastCoordinator> {
        match self.engine.backend() {
            Backend::YouTube(_) => Some(BroadcastCoordinator::new(self.engine.clone())),
            _ => None,
        }
    }

    /// Persists the credential and channel metadata to the session store.
    pub fn save(&self) {
        self.engine.save();
    }

    /// Restores the credential from the session store; see
    /// [`OAuthEngine::load_from_store`].
    pub fn load(&self) -> bool {
        self.engine.load_from_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::youtube::{YouTubeBackend, YouTubeVariant};
    use crate::services::{ClientCredentials, ProviderEndpoints};
    use crate::store::{MemoryStore, shared};
    use crate::testutil::FakeConsent;
    use pretty_assertions::assert_eq;

    fn youtube_session() -> Session {
        // Endpoints are never hit in these tests.
        let backend = Backend::YouTube(YouTubeBackend::with_endpoints(
            YouTubeVariant::Rtmps,
            ProviderEndpoints {
                auth_url: "http://127.0.0.1:9/authorize".into(),
                token_url: "http://127.0.0.1:9/token".into(),
                api_url: "http://127.0.0.1:9".into(),
            },
            ClientCredentials::new("client-id", "client-secret"),
        ));
        Session::new(Arc::new(OAuthEngine::new(
            backend,
            FakeConsent::cancelled(),
            shared(MemoryStore::new()),
        )))
    }

    #[tokio::test]
    async fn external_services_are_left_out_of_generic_key_injection() {
        let session = youtube_session();
        assert!(session.descriptor().external);

        let mut output = OutputConfig {
            server: "rtmp://preset.example/app".into(),
            key: "preset-key".into(),
            bandwidth_test: false,
        };
        session
            .on_stream_configured(&mut output)
            .await
            .expect("external services short-circuit");
        assert_eq!(output.server, "rtmp://preset.example/app");
        assert_eq!(output.key, "preset-key");
    }

    #[tokio::test]
    async fn broadcast_services_expose_a_coordinator_instead_of_a_key() {
        let session = youtube_session();
        assert!(
            session
                .stream_key()
                .await
                .expect("no network needed")
                .is_none()
        );
        let coordinator = session.broadcasts().expect("broadcast-capable");
        assert_eq!(coordinator.ingest_server(), YouTubeVariant::Rtmps.ingest_server());
    }
}
