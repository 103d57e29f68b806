//! The service registry: maps the host's configured service string to a
//! backend and owns the per-service shared sessions.
//!
//! Built once at startup and handed by reference to whatever needs to
//! resolve services; the entry table is immutable after that point, only
//! the session cache mutates.

use crate::consent::{ConsentFlow, LoginReason, LoopbackConsent};
use crate::error::AuthError;
use crate::oauth::OAuthEngine;
use crate::services::youtube::{YouTubeBackend, YouTubeVariant};
use crate::services::{
    Backend, ClientCredentials, RestreamBackend, ServiceDescriptor, ServiceKind, TwitchBackend,
    restream, twitch,
};
use crate::session::Session;
use crate::store::SharedSessionStore;
use std::collections::HashMap;
use std::sync::Arc;

type BackendFactory = Box<dyn Fn() -> Backend + Send + Sync>;
type CleanupFn = Box<dyn Fn() + Send + Sync>;

/// One registered backend.
pub struct RegistryEntry {
    descriptor: ServiceDescriptor,
    factory: BackendFactory,
    consent: Arc<dyn ConsentFlow>,
    /// Run on sign-out: clears whatever ambient login state the consent
    /// implementation left behind (e.g. browser cookies).
    cleanup: Option<CleanupFn>,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> ServiceDescriptor {
        self.descriptor
    }
}

/// Registration-ordered backend table plus the cache of live sessions.
pub struct ServiceRegistry {
    entries: Vec<RegistryEntry>,
    store: SharedSessionStore,
    active: tokio::sync::Mutex<HashMap<&'static str, Session>>,
}

/// Client credentials for the built-in backends; a `None` leaves that
/// service unregistered.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCredentials {
    pub twitch: Option<ClientCredentials>,
    pub restream: Option<ClientCredentials>,
    pub youtube: Option<ClientCredentials>,
}

impl ServiceRegistry {
    pub fn new(store: SharedSessionStore) -> Self {
        Self {
            entries: Vec::new(),
            store,
            active: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// A registry with every built-in backend the given credentials
    /// cover, using the loopback consent flow.
    pub fn with_builtin_services(store: SharedSessionStore, creds: BuiltinCredentials) -> Self {
        let mut registry = Self::new(store);
        let consent: Arc<dyn ConsentFlow> = Arc::new(LoopbackConsent::new());

        if let Some(c) = creds.twitch {
            registry.register(
                twitch::DESCRIPTOR,
                Box::new(move || Backend::Twitch(TwitchBackend::new(c.clone()))),
                consent.clone(),
                None,
            );
        }
        if let Some(c) = creds.restream {
            registry.register(
                restream::DESCRIPTOR,
                Box::new(move || Backend::Restream(RestreamBackend::new(c.clone()))),
                consent.clone(),
                None,
            );
        }
        if let Some(c) = creds.youtube {
            for variant in [
                YouTubeVariant::Rtmp,
                YouTubeVariant::Rtmps,
                YouTubeVariant::Hls,
            ] {
                let c = c.clone();
                registry.register(
                    variant.descriptor(),
                    Box::new(move || Backend::YouTube(YouTubeBackend::new(variant, c.clone()))),
                    consent.clone(),
                    None,
                );
            }
        }
        registry
    }

    /// Adds a backend. Re-registering an already-registered name replaces
    /// that entry in place, so the most recent registration wins while
    /// the resolution scan order stays stable.
    pub fn register(
        &mut self,
        descriptor: ServiceDescriptor,
        factory: BackendFactory,
        consent: Arc<dyn ConsentFlow>,
        cleanup: Option<CleanupFn>,
    ) {
        let entry = RegistryEntry {
            descriptor,
            factory,
            consent,
            cleanup,
        };
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.descriptor.name == descriptor.name)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// The first registered entry whose name occurs inside `service`, or
    /// `None` when the service needs no authentication.
    ///
    /// Matching is by substring in registration order for compatibility
    /// with existing stored configurations. That makes names that contain
    /// each other ambiguous ("YouTube - RTMP" matches inside
    /// "YouTube - RTMPS"); whichever was registered first wins, so the
    /// YouTube variants resolve to a shared backend either way.
    pub fn resolve(&self, service: &str) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|entry| service.contains(entry.descriptor.name))
    }

    /// Signs into the backend matching `service`.
    ///
    /// Returns the existing shared session when one is already live.
    /// Otherwise the session is restored from the store when possible and
    /// taken through the interactive consent flow when not; either way the
    /// returned session is fully authenticated, with channel metadata
    /// populated for stream-key services. The user dismissing the consent
    /// flow is reported as [`AuthError::Cancelled`], never as a
    /// half-initialized session.
    pub async fn login(&self, service: &str) -> Result<Option<Session>, AuthError> {
        let Some(entry) = self.resolve(service) else {
            tracing::debug!(service, "no backend matches, no authentication required");
            return Ok(None);
        };
        let name = entry.descriptor.name;

        let mut active = self.active.lock().await;
        if let Some(session) = active.get(name) {
            tracing::debug!(service = name, "reusing live session");
            return Ok(Some(session.clone()));
        }

        let engine = Arc::new(OAuthEngine::new(
            (entry.factory)(),
            entry.consent.clone(),
            self.store.clone(),
        ));
        let scope = engine.backend().scope_version();

        if engine.load_from_store() {
            // Stored session: validity (and any scope upgrade) is settled
            // through the normal acquisition path.
            engine.acquire_token(None, scope).await?;
        } else if !engine.interactive_login(LoginReason::Connect, scope).await? {
            return Err(AuthError::Cancelled);
        }

        if entry.descriptor.kind == ServiceKind::OAuthStreamKey {
            engine.channel_info().await?;
        }

        let session = Session::new(engine);
        active.insert(name, session.clone());
        tracing::info!(service = name, "signed in");
        Ok(Some(session))
    }

    /// Signs out of the backend matching `service`: drops the live
    /// session, clears its persisted section, and runs the entry's
    /// cleanup hook.
    pub async fn sign_out(&self, service: &str) {
        let Some(entry) = self.resolve(service) else {
            return;
        };
        let name = entry.descriptor.name;

        let mut active = self.active.lock().await;
        if let Some(session) = active.remove(name) {
            session.engine().clear();
        } else {
            self.store
                .lock()
                .expect("session store lock")
                .remove_section(name);
        }
        drop(active);

        if let Some(cleanup) = &entry.cleanup {
            cleanup();
        }
        tracing::info!(service = name, "signed out");
    }
}
