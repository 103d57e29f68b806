//! Credential and broadcast session lifecycle for the Castway desktop
//! broadcaster.
//!
//! Castway signs into third-party streaming platforms over OAuth2 and has
//! to keep those sessions usable across restarts, token expiry, and scope
//! upgrades. This crate is that layer:
//!
//! - [`OAuthEngine`] drives one service's token lifecycle: restore from
//!   the store, refresh on expiry, exchange authorization codes, and fall
//!   back to interactive consent exactly once when a grant goes bad.
//! - [`ServiceRegistry`] maps the host's configured service string to a
//!   backend and hands out one shared [`Session`] per service.
//! - The [`services`] module holds the per-platform backends. Stream-key
//!   services (Twitch, Restream.io) surface a key the host injects into
//!   its output settings; the YouTube family instead exposes a
//!   [`services::youtube::BroadcastCoordinator`] that creates, binds,
//!   starts, watches, and stops broadcasts.
//!
//! # Example
//!
//! ```no_run
//! use castway_auth::{
//!     BuiltinCredentials, ClientCredentials, JsonFileStore, OutputConfig, ServiceRegistry, store,
//! };
//!
//! # async fn example() -> Result<(), castway_auth::AuthError> {
//! let store = store::shared(JsonFileStore::open("castway-auth.json"));
//! let registry = ServiceRegistry::with_builtin_services(
//!     store,
//!     BuiltinCredentials {
//!         twitch: Some(ClientCredentials::public("twitch-client-id")),
//!         ..BuiltinCredentials::default()
//!     },
//! );
//!
//! if let Some(session) = registry.login("Twitch").await? {
//!     let mut output = OutputConfig::default();
//!     session.on_stream_configured(&mut output).await?;
//!     // hand output.server / output.key to the encoder
//! }
//! # Ok(())
//! # }
//! ```

pub mod consent;
pub mod credential;
pub mod error;
pub mod oauth;
pub mod registry;
pub mod services;
pub mod session;
pub mod store;

#[cfg(test)]
mod testutil;

pub use consent::{
    AuthorizationGrant, ConsentFlow, ConsentOutcome, ConsentRequest, LoginReason, LoopbackConsent,
};
pub use credential::Credential;
pub use error::AuthError;
pub use oauth::OAuthEngine;
pub use registry::{BuiltinCredentials, ServiceRegistry};
pub use services::{
    Backend, ChannelInfo, ClientCredentials, OutputConfig, ProviderEndpoints, ServiceDescriptor,
    ServiceKind,
};
pub use session::Session;
pub use store::{JsonFileStore, MemoryStore, SessionStore, SharedSessionStore};
