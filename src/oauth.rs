//! The OAuth token lifecycle engine.
//!
//! One engine owns one [`Credential`] and one backend for the lifetime of a
//! login session. It implements the acquisition/refresh state machine:
//! scope-version gating, the no-network fast path, authorization-code and
//! refresh-token grants, and the single interactive retry after an
//! `invalid_grant` rejection. Nothing here presents UI; when the user is
//! needed, the engine goes through the [`ConsentFlow`] boundary.

use crate::consent::{AuthorizationGrant, ConsentFlow, ConsentOutcome, ConsentRequest, LoginReason};
use crate::credential::{Credential, DEFAULT_TOKEN_LIFETIME_SECS, unix_now};
use crate::error::AuthError;
use crate::services::{Backend, ChannelInfo};
use crate::store::SharedSessionStore;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthorizationCode, ClientId, ClientSecret, PkceCodeVerifier, RedirectUrl, RefreshToken,
    RequestTokenError, TokenResponse, TokenUrl,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Socket timeout applied to every request the engine and the backends
/// make.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the token lifecycle for one service backend.
///
/// All network-touching operations are `async` and serialized: at most one
/// logical token acquisition is in flight per engine at any time.
pub struct OAuthEngine {
    backend: Backend,
    consent: Arc<dyn ConsentFlow>,
    store: SharedSessionStore,
    http: reqwest::Client,
    credential: Mutex<Credential>,
    channel: Mutex<Option<ChannelInfo>>,
    /// Serializes `acquire_token` calls for the whole logical operation,
    /// interactive consent included.
    acquire_gate: tokio::sync::Mutex<()>,
}

impl OAuthEngine {
    pub fn new(backend: Backend, consent: Arc<dyn ConsentFlow>, store: SharedSessionStore) -> Self {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("building reqwest client should not fail");
        let credential = Credential {
            implicit: backend.implicit(),
            ..Credential::default()
        };
        Self {
            backend,
            consent,
            store,
            http,
            credential: Mutex::new(credential),
            channel: Mutex::new(None),
            acquire_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Snapshot of the current credential.
    pub fn credential(&self) -> Credential {
        self.credential.lock().expect("credential lock").clone()
    }

    /// Whether the current access token must be treated as expired.
    pub fn token_expired(&self) -> bool {
        self.credential().expired()
    }

    /// Restores the credential (and any cached channel metadata) from the
    /// session store.
    ///
    /// Returns true iff the minimum usable field is present: the refresh
    /// token for explicit-flow services, the access token for implicit-flow
    /// ones. Whether the restored token still works is discovered lazily on
    /// first use.
    pub fn load_from_store(&self) -> bool {
        let section = self.backend.descriptor().name;
        let store = self.store.lock().expect("session store lock");
        let mut cred = Credential {
            implicit: self.backend.implicit(),
            ..Credential::default()
        };
        cred.refresh_token = store.get(section, "RefreshToken").unwrap_or_default();
        cred.token = store.get(section, "Token").unwrap_or_default();
        cred.expire_time = store
            .get(section, "ExpireTime")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        cred.scope_version = store
            .get(section, "ScopeVer")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let channel = match (store.get(section, "Id"), store.get(section, "Name")) {
            (Some(id), Some(display_name)) if !id.is_empty() => Some(ChannelInfo {
                id,
                display_name,
                stream_key: store.get(section, "StreamKey"),
                ingest_server: store.get(section, "StreamServer"),
            }),
            _ => None,
        };
        drop(store);

        let usable = if cred.implicit {
            !cred.token.is_empty()
        } else {
            !cred.refresh_token.is_empty()
        };
        tracing::debug!(
            service = section,
            usable,
            scope_version = cred.scope_version,
            "restored session from store"
        );
        *self.credential.lock().expect("credential lock") = cred;
        *self.channel.lock().expect("channel lock") = channel;
        usable
    }

    /// Writes the credential and cached channel metadata to the session
    /// store. Called automatically after every successful token mutation.
    pub fn save(&self) {
        let section = self.backend.descriptor().name;
        let cred = self.credential();
        let channel = self.channel.lock().expect("channel lock").clone();
        let mut store = self.store.lock().expect("session store lock");
        store.set(section, "RefreshToken", &cred.refresh_token);
        store.set(section, "Token", &cred.token);
        store.set(section, "ExpireTime", &cred.expire_time.to_string());
        store.set(section, "ScopeVer", &cred.scope_version.to_string());
        if let Some(info) = channel {
            store.set(section, "Id", &info.id);
            store.set(section, "Name", &info.display_name);
            if let Some(key) = &info.stream_key {
                store.set(section, "StreamKey", key);
            }
            if let Some(server) = &info.ingest_server {
                store.set(section, "StreamServer", server);
            }
        }
    }

    /// Forgets the session: wipes the credential, the channel cache, and
    /// the persisted section.
    pub fn clear(&self) {
        *self.credential.lock().expect("credential lock") = Credential {
            implicit: self.backend.implicit(),
            ..Credential::default()
        };
        *self.channel.lock().expect("channel lock") = None;
        self.store
            .lock()
            .expect("session store lock")
            .remove_section(self.backend.descriptor().name);
    }

    /// Ensures a usable access token, exchanging `grant` when one is
    /// supplied and the stored refresh token otherwise.
    ///
    /// `required_scope` is the scope version the caller needs. A stored
    /// credential granted under an older version triggers interactive
    /// re-authorization before any token-endpoint call; the user declining
    /// surfaces as [`AuthError::ScopeInsufficient`].
    pub async fn acquire_token(
        &self,
        grant: Option<AuthorizationGrant>,
        required_scope: i64,
    ) -> Result<(), AuthError> {
        let _gate = self.acquire_gate.lock().await;
        self.acquire_token_inner(grant, required_scope, true).await
    }

    /// A guaranteed-fresh bearer token, refreshing through the normal
    /// acquisition path if needed.
    pub async fn fresh_bearer(&self) -> Result<String, AuthError> {
        self.acquire_token(None, self.backend.scope_version())
            .await?;
        Ok(self.credential().token)
    }

    /// Invalidates the local expiry bookkeeping and refreshes. Used by
    /// authenticated request paths after the provider rejects a token the
    /// clock still considered fresh.
    pub(crate) async fn refresh_after_unauthorized(&self) -> Result<String, AuthError> {
        self.credential.lock().expect("credential lock").expire_time = 0;
        self.fresh_bearer().await
    }

    /// The session's channel metadata, fetched on first use and cached for
    /// the rest of the session. A provider rejection of the token gets one
    /// refresh-and-retry; a 403 from the key query is surfaced as
    /// [`AuthError::TwoFactorRequired`] by the backend.
    pub async fn channel_info(&self) -> Result<ChannelInfo, AuthError> {
        if let Some(info) = self.channel.lock().expect("channel lock").clone() {
            return Ok(info);
        }

        let bearer = self.fresh_bearer().await?;
        let info = match self.backend.fetch_channel_info(&self.http, &bearer).await {
            Ok(info) => info,
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("channel query rejected the token, refreshing once");
                let bearer = self.refresh_after_unauthorized().await?;
                self.backend.fetch_channel_info(&self.http, &bearer).await?
            }
            Err(e) => return Err(e),
        };

        *self.channel.lock().expect("channel lock") = Some(info.clone());
        self.save();
        Ok(info)
    }

    /// Opens the interactive consent flow and, on approval, runs the
    /// resulting grant through the normal acquisition path.
    ///
    /// Returns `Ok(false)` when the user dismissed the flow. Safe to call
    /// from the acquisition failure path: the nested acquisition runs with
    /// re-login disabled, so recursion is bounded to one level.
    pub(crate) async fn interactive_login(
        &self,
        reason: LoginReason,
        required_scope: i64,
    ) -> Result<bool, AuthError> {
        let request = ConsentRequest {
            reason,
            auth_url: self.backend.endpoints().auth_url.clone(),
            client_id: self.backend.client_id().to_string(),
            scopes: self.backend.scopes(),
            implicit: self.backend.implicit(),
        };
        match self.consent.authorize(request).await? {
            ConsentOutcome::Cancelled => {
                tracing::info!(service = self.backend.descriptor().name, "login dismissed");
                Ok(false)
            }
            ConsentOutcome::Implicit {
                access_token,
                expires_in,
            } => {
                {
                    let mut cred = self.credential.lock().expect("credential lock");
                    cred.token = access_token;
                    cred.expire_time = unix_now() + expires_in;
                    cred.scope_version = required_scope;
                }
                self.save();
                Ok(true)
            }
            ConsentOutcome::Granted(grant) => {
                self.acquire_token_inner(Some(grant), required_scope, false)
                    .await?;
                Ok(true)
            }
        }
    }

    fn acquire_token_inner<'a>(
        &'a self,
        grant: Option<AuthorizationGrant>,
        required_scope: i64,
        allow_relogin: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>> {
        Box::pin(async move {
            let snapshot = self.credential();

            // A token granted under an older scope set cannot be upgraded
            // silently; ask the user before touching the token endpoint.
            if grant.is_none()
                && snapshot.scope_version > 0
                && snapshot.scope_version < required_scope
            {
                tracing::info!(
                    granted = snapshot.scope_version,
                    required = required_scope,
                    "scope set has grown since last login"
                );
                if allow_relogin
                    && self
                        .interactive_login(LoginReason::ScopeChange, required_scope)
                        .await?
                {
                    return Ok(());
                }
                return Err(AuthError::ScopeInsufficient {
                    granted: snapshot.scope_version,
                    required: required_scope,
                });
            }

            // Fast path: nothing to exchange and the token is still good.
            if grant.is_none() && !snapshot.expired() {
                return Ok(());
            }

            // Implicit-grant providers issue no refresh tokens; a fresh
            // token can only come from the user.
            if grant.is_none() && self.backend.implicit() {
                if allow_relogin
                    && self
                        .interactive_login(LoginReason::RefreshTokenFailed, required_scope)
                        .await?
                {
                    return Ok(());
                }
                return Err(AuthError::Provider {
                    code: "invalid_grant".into(),
                    description: "access token expired and this service issues no refresh tokens"
                        .into(),
                    status: 401,
                });
            }

            if grant.is_none() && snapshot.refresh_token.is_empty() {
                // The session predates a refresh token; only interactive
                // re-login can restore it.
                if allow_relogin
                    && self
                        .interactive_login(LoginReason::RefreshTokenFailed, required_scope)
                        .await?
                {
                    return Ok(());
                }
                return Err(AuthError::Provider {
                    code: "invalid_grant".into(),
                    description: "no refresh token stored for this session".into(),
                    status: 400,
                });
            }

            let token_url_str = self.backend.endpoints().token_url.clone();
            let token_url =
                TokenUrl::new(token_url_str.clone()).map_err(|e| AuthError::Parse {
                    url: token_url_str.clone(),
                    detail: format!("invalid token endpoint: {e}"),
                })?;
            let mut client = BasicClient::new(ClientId::new(self.backend.client_id().to_string()))
                .set_token_uri(token_url);
            if let Some(secret) = self.backend.client_secret() {
                client = client.set_client_secret(ClientSecret::new(secret.to_string()));
            }

            let result = match &grant {
                Some(grant) => {
                    if let Some(redirect) = &grant.redirect_uri {
                        client = client.set_redirect_uri(
                            RedirectUrl::new(redirect.clone()).map_err(|e| AuthError::Parse {
                                url: redirect.clone(),
                                detail: format!("invalid redirect url: {e}"),
                            })?,
                        );
                    }
                    let mut request =
                        client.exchange_code(AuthorizationCode::new(grant.code.clone()));
                    if let Some(verifier) = &grant.pkce_verifier {
                        request =
                            request.set_pkce_verifier(PkceCodeVerifier::new(verifier.clone()));
                    }
                    request.request_async(&self.http).await
                }
                None => {
                    tracing::debug!(
                        service = self.backend.descriptor().name,
                        "exchanging refresh token"
                    );
                    client
                        .exchange_refresh_token(&RefreshToken::new(snapshot.refresh_token.clone()))
                        .request_async(&self.http)
                        .await
                }
            };

            match result {
                Ok(token) => self.commit_token_response(&token, grant.is_some(), required_scope),
                Err(RequestTokenError::ServerResponse(response)) => {
                    let invalid_grant = matches!(
                        response.error(),
                        oauth2::basic::BasicErrorResponseType::InvalidGrant
                    );
                    let err = provider_error_from_token_endpoint(&response);
                    if invalid_grant && allow_relogin {
                        tracing::warn!(
                            service = self.backend.descriptor().name,
                            "grant considered invalid, offering one re-login"
                        );
                        match self
                            .interactive_login(LoginReason::RefreshTokenFailed, required_scope)
                            .await
                        {
                            Ok(true) => return Ok(()),
                            Ok(false) => {}
                            Err(nested) => {
                                tracing::warn!(error = %nested, "re-login after invalid grant failed");
                            }
                        }
                    }
                    Err(err)
                }
                Err(RequestTokenError::Parse(e, _body)) => Err(AuthError::Parse {
                    url: token_url_str,
                    detail: e.to_string(),
                }),
                Err(e) => Err(AuthError::Transport {
                    url: token_url_str,
                    detail: e.to_string(),
                }),
            }
        })
    }

    /// Applies a successful token-endpoint response to the credential and
    /// persists it.
    fn commit_token_response(
        &self,
        token: &BasicTokenResponse,
        from_code_exchange: bool,
        required_scope: i64,
    ) -> Result<(), AuthError> {
        let expires_in = token
            .expires_in()
            .map(|d| d.as_secs())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        {
            let mut cred = self.credential.lock().expect("credential lock");
            cred.token = token.access_token().secret().clone();
            cred.expire_time = unix_now() + expires_in;
            if from_code_exchange {
                match token.refresh_token() {
                    Some(refresh) => cred.refresh_token = refresh.secret().clone(),
                    None => {
                        // Without a refresh token the session cannot survive
                        // a restart; treat the grant as unusable.
                        cred.token.clear();
                        return Err(AuthError::Provider {
                            code: "missing_refresh_token".into(),
                            description:
                                "the authorization grant did not include a refresh token".into(),
                            status: 400,
                        });
                    }
                }
                cred.scope_version = required_scope;
            }
        }
        tracing::debug!(
            service = self.backend.descriptor().name,
            expires_in,
            "token updated"
        );
        self.save();
        Ok(())
    }
}

impl OAuthEngine {
    /// Installs a credential snapshot directly, bypassing the store.
    #[cfg(test)]
    pub(crate) fn seed_credential(&self, credential: Credential) {
        *self.credential.lock().expect("credential lock") = credential;
    }
}

fn provider_error_from_token_endpoint(response: &BasicErrorResponse) -> AuthError {
    use oauth2::basic::BasicErrorResponseType as T;
    let code = match response.error() {
        T::InvalidClient => "invalid_client",
        T::InvalidGrant => "invalid_grant",
        T::InvalidRequest => "invalid_request",
        T::InvalidScope => "invalid_scope",
        T::UnauthorizedClient => "unauthorized_client",
        T::UnsupportedGrantType => "unsupported_grant_type",
        T::Extension(other) => other.as_str(),
    }
    .to_string();
    let description = response
        .error_description()
        .map(|d| d.to_string())
        .unwrap_or_default();
    AuthError::Provider {
        code,
        description,
        status: 400,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::unix_now;
    use crate::services::{ClientCredentials, ProviderEndpoints, RestreamBackend, TwitchBackend};
    use crate::store::{MemoryStore, SessionStore, shared};
    use crate::testutil::{FakeConsent, MockServer};
    use pretty_assertions::assert_eq;

    fn engine_with(
        server: &MockServer,
        consent: Arc<FakeConsent>,
        credential: Credential,
    ) -> OAuthEngine {
        let backend = Backend::Restream(RestreamBackend::with_endpoints(
            ProviderEndpoints {
                auth_url: format!("{}/authorize", server.url()),
                token_url: format!("{}/oauth/token", server.url()),
                api_url: server.url(),
            },
            ClientCredentials::new("client-id", "client-secret"),
        ));
        let engine = OAuthEngine::new(backend, consent, shared(MemoryStore::new()));
        *engine.credential.lock().expect("credential lock") = credential;
        engine
    }

    fn stored_refresh_credential() -> Credential {
        Credential {
            token: String::new(),
            refresh_token: "abc".into(),
            expire_time: 0,
            scope_version: 1,
            implicit: false,
        }
    }

    #[tokio::test]
    async fn refresh_grant_updates_token_and_expiry_but_not_scope() {
        let server = MockServer::spawn(|req| {
            assert_eq!(req.path, "/oauth/token");
            assert!(req.body.contains("grant_type=refresh_token"));
            assert!(req.body.contains("refresh_token=abc"));
            (
                200,
                r#"{"access_token":"fresh-token","token_type":"bearer","expires_in":3600}"#.into(),
            )
        })
        .await;
        let consent = FakeConsent::cancelled();
        let engine = engine_with(&server, consent.clone(), stored_refresh_credential());

        let before = unix_now();
        engine.acquire_token(None, 1).await.expect("refresh grant");

        let cred = engine.credential();
        assert_eq!(cred.token, "fresh-token");
        assert_eq!(cred.refresh_token, "abc");
        assert_eq!(cred.scope_version, 1);
        assert!(cred.expire_time >= before + 3600);
        assert!(cred.expire_time <= unix_now() + 3600);
        assert_eq!(consent.calls(), 0);
    }

    #[tokio::test]
    async fn valid_token_short_circuits_without_network() {
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let consent = FakeConsent::cancelled();
        let engine = engine_with(
            &server,
            consent.clone(),
            Credential {
                token: "still-good".into(),
                refresh_token: "abc".into(),
                expire_time: unix_now() + 600,
                scope_version: 1,
                implicit: false,
            },
        );

        engine.acquire_token(None, 1).await.expect("fast path");
        assert_eq!(server.hits(), 0);
        assert_eq!(consent.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_grant_gets_exactly_one_relogin_then_surfaces() {
        let server = MockServer::spawn(|req| {
            assert_eq!(req.path, "/oauth/token");
            (400, r#"{"error":"invalid_grant"}"#.into())
        })
        .await;
        // The consent grants a new code, but the exchange fails again; the
        // engine must not loop.
        let consent = FakeConsent::granting("second-chance");
        let engine = engine_with(&server, consent.clone(), stored_refresh_credential());

        let err = engine
            .acquire_token(None, 1)
            .await
            .expect_err("both exchanges fail");
        match err {
            AuthError::Provider { code, .. } => assert_eq!(code, "invalid_grant"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(consent.calls(), 1);
        // One refresh attempt plus one nested code exchange, nothing more.
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn invalid_grant_recovers_when_relogin_succeeds() {
        let server = MockServer::spawn(|req| {
            if req.body.contains("grant_type=refresh_token") {
                (400, r#"{"error":"invalid_grant"}"#.into())
            } else {
                assert!(req.body.contains("grant_type=authorization_code"));
                (
                    200,
                    r#"{"access_token":"recovered","token_type":"bearer","expires_in":3600,"refresh_token":"new-refresh"}"#
                        .into(),
                )
            }
        })
        .await;
        let consent = FakeConsent::granting("fresh-code");
        let engine = engine_with(&server, consent.clone(), stored_refresh_credential());

        engine.acquire_token(None, 1).await.expect("recovered");
        let cred = engine.credential();
        assert_eq!(cred.token, "recovered");
        assert_eq!(cred.refresh_token, "new-refresh");
        assert_eq!(consent.calls(), 1);
    }

    #[tokio::test]
    async fn smaller_required_scope_never_triggers_relogin() {
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let consent = FakeConsent::cancelled();
        let engine = engine_with(
            &server,
            consent.clone(),
            Credential {
                token: "tok".into(),
                refresh_token: "abc".into(),
                expire_time: unix_now() + 600,
                scope_version: 2,
                implicit: false,
            },
        );

        engine.acquire_token(None, 1).await.expect("scope is fine");
        engine.acquire_token(None, 2).await.expect("scope is equal");
        assert_eq!(consent.calls(), 0);
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn larger_required_scope_asks_the_user_before_any_token_call() {
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let consent = FakeConsent::cancelled();
        let engine = engine_with(
            &server,
            consent.clone(),
            Credential {
                token: "tok".into(),
                refresh_token: "abc".into(),
                // Even an unexpired token does not excuse an old scope set.
                expire_time: unix_now() + 600,
                scope_version: 1,
                implicit: false,
            },
        );

        let err = engine.acquire_token(None, 2).await.expect_err("declined");
        match err {
            AuthError::ScopeInsufficient { granted, required } => {
                assert_eq!((granted, required), (1, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(consent.calls(), 1);
        assert_eq!(server.hits(), 0);
        assert_eq!(consent.last_reason(), Some(LoginReason::ScopeChange));
    }

    #[tokio::test]
    async fn scope_upgrade_bumps_the_stored_version() {
        let server = MockServer::spawn(|req| {
            assert!(req.body.contains("grant_type=authorization_code"));
            (
                200,
                r#"{"access_token":"upgraded","token_type":"bearer","expires_in":3600,"refresh_token":"r2"}"#
                    .into(),
            )
        })
        .await;
        let consent = FakeConsent::granting("upgrade-code");
        let engine = engine_with(
            &server,
            consent.clone(),
            Credential {
                token: "tok".into(),
                refresh_token: "abc".into(),
                expire_time: unix_now() + 600,
                scope_version: 1,
                implicit: false,
            },
        );

        engine.acquire_token(None, 2).await.expect("upgraded");
        assert_eq!(engine.credential().scope_version, 2);
        assert_eq!(consent.calls(), 1);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn code_exchange_without_refresh_token_is_an_error() {
        let server = MockServer::spawn(|_req| {
            (
                200,
                r#"{"access_token":"short-lived","token_type":"bearer","expires_in":3600}"#.into(),
            )
        })
        .await;
        let consent = FakeConsent::cancelled();
        let engine = engine_with(&server, consent, Credential::default());

        let grant = AuthorizationGrant {
            code: "one-shot".into(),
            pkce_verifier: None,
            redirect_uri: None,
        };
        let err = engine
            .acquire_token(Some(grant), 1)
            .await
            .expect_err("unusable grant");
        match err {
            AuthError::Provider { code, .. } => assert_eq!(code, "missing_refresh_token"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(engine.credential().token.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let server = MockServer::spawn(|_req| (200, "ok".into())).await;
        let url = server.url();
        drop(server);

        let consent = FakeConsent::granting("unused");
        let backend = Backend::Restream(RestreamBackend::with_endpoints(
            ProviderEndpoints {
                auth_url: format!("{url}/authorize"),
                token_url: format!("{url}/oauth/token"),
                api_url: url,
            },
            ClientCredentials::new("client-id", "client-secret"),
        ));
        let engine = OAuthEngine::new(backend, consent.clone(), shared(MemoryStore::new()));
        *engine.credential.lock().expect("credential lock") = stored_refresh_credential();

        let err = engine.acquire_token(None, 1).await.expect_err("no server");
        assert!(matches!(err, AuthError::Transport { .. }), "{err:?}");
        assert_eq!(consent.calls(), 0);
    }

    #[tokio::test]
    async fn implicit_backend_relogins_instead_of_refreshing() {
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let consent = FakeConsent::new(ConsentOutcome::Implicit {
            access_token: "implicit-token".into(),
            expires_in: 1234,
        });
        let backend = Backend::Twitch(TwitchBackend::with_endpoints(
            ProviderEndpoints {
                auth_url: format!("{}/authorize", server.url()),
                token_url: format!("{}/oauth/token", server.url()),
                api_url: server.url(),
            },
            ClientCredentials::public("client-id"),
        ));
        let engine = OAuthEngine::new(backend, consent.clone(), shared(MemoryStore::new()));

        engine.acquire_token(None, 1).await.expect("implicit login");
        let cred = engine.credential();
        assert_eq!(cred.token, "implicit-token");
        assert_eq!(cred.scope_version, 1);
        assert!(cred.refresh_token.is_empty());
        assert_eq!(consent.calls(), 1);
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn save_and_load_round_trip_through_the_store() {
        let store = shared(MemoryStore::new());
        let server = MockServer::spawn(|_req| panic!("no request expected")).await;
        let make_engine = || {
            OAuthEngine::new(
                Backend::Restream(RestreamBackend::with_endpoints(
                    ProviderEndpoints {
                        auth_url: format!("{}/authorize", server.url()),
                        token_url: format!("{}/oauth/token", server.url()),
                        api_url: server.url(),
                    },
                    ClientCredentials::new("client-id", "client-secret"),
                )),
                FakeConsent::cancelled(),
                store.clone(),
            )
        };

        let engine = make_engine();
        *engine.credential.lock().expect("credential lock") = Credential {
            token: "tok".into(),
            refresh_token: "refresh".into(),
            expire_time: 1_900_000_000,
            scope_version: 3,
            implicit: false,
        };
        engine.save();

        let restored = make_engine();
        assert!(restored.load_from_store());
        assert_eq!(restored.credential(), engine.credential());

        restored.clear();
        assert!(!restored.load_from_store());
        assert_eq!(
            store.lock().expect("store lock").get("Restream.io", "Token"),
            None
        );
    }
}
