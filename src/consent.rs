//! The interactive consent boundary.
//!
//! The engine never presents UI itself; when it needs the user, it hands a
//! [`ConsentRequest`] to a [`ConsentFlow`] and waits for the outcome. The
//! shipped implementation, [`LoopbackConsent`], opens the system browser and
//! catches the provider redirect on a localhost listener. Hosts with an
//! embedded login view can substitute their own implementation.

use crate::error::AuthError;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;

/// Boxed future used to keep [`ConsentFlow`] object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why the engine is asking for interactive consent. Implementations that
/// can talk to the user should confirm anything other than a first-time
/// connect before opening the provider page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReason {
    /// First-time sign-in for this service.
    Connect,
    /// The stored token was granted under an older scope set.
    ScopeChange,
    /// Silent refresh is no longer possible (refresh token rejected or
    /// never issued).
    RefreshTokenFailed,
}

/// Everything a consent implementation needs to build the provider's
/// authorization URL.
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    pub reason: LoginReason,
    /// The provider's authorization endpoint.
    pub auth_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Implicit-grant providers return the access token directly in the
    /// redirect fragment instead of an authorization code.
    pub implicit: bool,
}

/// An authorization code captured from the redirect, together with the
/// proof-key verifier and redirect URI the token exchange must present.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub pkce_verifier: Option<String>,
    pub redirect_uri: Option<String>,
}

/// What came back from the user.
#[derive(Debug, Clone)]
pub enum ConsentOutcome {
    /// The user approved and the provider issued an authorization code.
    Granted(AuthorizationGrant),
    /// Implicit grant: the provider issued the access token directly.
    Implicit { access_token: String, expires_in: u64 },
    /// The user dismissed the flow.
    Cancelled,
}

/// The interactive consent boundary. One call per login attempt; the
/// implementation owns all presentation.
pub trait ConsentFlow: Send + Sync {
    fn authorize(&self, request: ConsentRequest) -> BoxFuture<'_, Result<ConsentOutcome, AuthError>>;
}

/// Page shown in the browser tab once the redirect has been captured.
const CONSENT_DONE_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Castway</title></head>\
<body><p>You're signed in. You can close this tab and return to Castway.</p></body></html>";

/// Page served when the redirect carries the response in the URL fragment
/// (implicit grant). Fragments never reach the server, so this relays them
/// back as query parameters.
const FRAGMENT_RELAY_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Castway</title></head>\
<body><script>\
if (location.hash.length > 1) { location.replace('/?' + location.hash.slice(1)); }\
else { document.write('Waiting for the sign-in response\u{2026}'); }\
</script></body></html>";

/// Consent flow that opens the system browser and receives the provider
/// redirect on an ephemeral localhost HTTP listener.
#[derive(Debug, Clone)]
pub struct LoopbackConsent {
    /// How long to wait for the user before treating the flow as dismissed.
    timeout: Duration,
}

impl Default for LoopbackConsent {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
        }
    }
}

impl LoopbackConsent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, request: ConsentRequest) -> Result<ConsentOutcome, AuthError> {
        let csrf = CsrfToken::new_random();
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AuthError::Transport {
                url: "127.0.0.1:0".into(),
                detail: format!("bind redirect listener: {e}"),
            })?;
        let addr = socket.local_addr().map_err(|e| AuthError::Transport {
            url: "127.0.0.1:0".into(),
            detail: format!("resolve redirect listener address: {e}"),
        })?;
        let redirect_url = format!("http://{}:{}", addr.ip(), addr.port());

        let auth_url = AuthUrl::new(request.auth_url.clone()).map_err(|e| AuthError::Parse {
            url: request.auth_url.clone(),
            detail: format!("invalid authorization endpoint: {e}"),
        })?;
        let redirect = RedirectUrl::new(redirect_url.clone()).map_err(|e| AuthError::Parse {
            url: redirect_url.clone(),
            detail: format!("invalid redirect url: {e}"),
        })?;
        let client = BasicClient::new(ClientId::new(request.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect);

        let state = csrf.clone();
        let mut authorize = client.authorize_url(move || state.clone());
        for scope in &request.scopes {
            authorize = authorize.add_scope(Scope::new(scope.clone()));
        }
        let pkce_verifier = if request.implicit {
            authorize = authorize.use_implicit_flow();
            None
        } else {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            authorize = authorize.set_pkce_challenge(challenge);
            Some(verifier)
        };
        let (url, _csrf) = authorize.url();

        tracing::info!(url = %url, reason = ?request.reason, "opening browser for user consent");
        webbrowser::open(url.as_ref()).map_err(|e| AuthError::Transport {
            url: url.to_string(),
            detail: format!("open browser: {e}"),
        })?;

        let captured = tokio::time::timeout(
            self.timeout,
            capture_redirect(socket, csrf, request.implicit),
        )
        .await;
        match captured {
            Ok(Some(Capture::Code(code))) => Ok(ConsentOutcome::Granted(AuthorizationGrant {
                code,
                pkce_verifier: pkce_verifier.map(|v| v.secret().clone()),
                redirect_uri: Some(redirect_url),
            })),
            Ok(Some(Capture::Implicit {
                access_token,
                expires_in,
            })) => Ok(ConsentOutcome::Implicit {
                access_token,
                expires_in,
            }),
            Ok(None) => Ok(ConsentOutcome::Cancelled),
            Err(_elapsed) => {
                tracing::warn!("no consent redirect arrived before the timeout");
                Ok(ConsentOutcome::Cancelled)
            }
        }
    }
}

impl ConsentFlow for LoopbackConsent {
    fn authorize(&self, request: ConsentRequest) -> BoxFuture<'_, Result<ConsentOutcome, AuthError>> {
        Box::pin(self.run(request))
    }
}

enum Capture {
    Code(String),
    Implicit { access_token: String, expires_in: u64 },
}

/// Accepts redirect connections until one of them carries a valid response.
/// Returns `None` only if the listener dies, which the caller treats as a
/// dismissal.
async fn capture_redirect(
    socket: tokio::net::TcpListener,
    csrf: CsrfToken,
    implicit: bool,
) -> Option<Capture> {
    let (got, mut gotten) = mpsc::channel::<Capture>(1);
    loop {
        tokio::select! {
            accepted = socket.accept() => {
                let Ok((conn, _)) = accepted else { return None };
                let conn = hyper_util::rt::TokioIo::new(conn);
                let got = got.clone();
                let csrf = csrf.clone();
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let got = got.clone();
                    let csrf = csrf.clone();
                    async move {
                        let query = req.uri().query().unwrap_or("");
                        match parse_redirect_query(query, csrf.secret()) {
                            Some(capture) => {
                                let _ = got.send(capture).await;
                                Ok::<_, std::convert::Infallible>(Response::new(
                                    Full::<Bytes>::from(CONSENT_DONE_HTML),
                                ))
                            }
                            None if implicit => {
                                // First hit: the token is still in the
                                // fragment; serve the relay page.
                                Ok(Response::new(Full::<Bytes>::from(FRAGMENT_RELAY_HTML)))
                            }
                            None => {
                                tracing::warn!("redirect request carried no usable response");
                                Ok(Response::builder()
                                    .status(400)
                                    .body(Full::<Bytes>::from("missing or invalid response"))
                                    .expect("static response builds"))
                            }
                        }
                    }
                });
                tokio::spawn(async move {
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(conn, service)
                        .await;
                });
            }
            capture = gotten.recv() => {
                return capture;
            }
        }
    }
}

/// Extracts the authorization response from a redirect query string,
/// verifying the anti-forgery state. Returns `None` when the request is not
/// (yet) a usable response.
fn parse_redirect_query(query: &str, expected_state: &str) -> Option<Capture> {
    let mut state = None;
    let mut code = None;
    let mut access_token = None;
    let mut expires_in = None;
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        match &*k {
            "state" => state = Some(v.into_owned()),
            "code" => code = Some(v.into_owned()),
            "access_token" => access_token = Some(v.into_owned()),
            "expires_in" => expires_in = v.parse::<u64>().ok(),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return None;
    }
    if let Some(code) = code {
        return Some(Capture::Code(code));
    }
    if let Some(access_token) = access_token {
        return Some(Capture::Implicit {
            access_token,
            expires_in: expires_in.unwrap_or(crate::credential::DEFAULT_TOKEN_LIFETIME_SECS),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_query_with_code_and_matching_state_is_granted() {
        let capture = parse_redirect_query("state=s3cret&code=4%2FauthCode", "s3cret");
        match capture {
            Some(Capture::Code(code)) => assert_eq!(code, "4/authCode"),
            _ => panic!("expected a code capture"),
        }
    }

    #[test]
    fn redirect_query_with_wrong_state_is_rejected() {
        assert!(parse_redirect_query("state=wrong&code=abc", "s3cret").is_none());
        assert!(parse_redirect_query("code=abc", "s3cret").is_none());
    }

    #[test]
    fn implicit_fragment_relay_produces_a_token_capture() {
        let capture =
            parse_redirect_query("access_token=tok123&expires_in=1234&state=s3cret", "s3cret");
        match capture {
            Some(Capture::Implicit {
                access_token,
                expires_in,
            }) => {
                assert_eq!(access_token, "tok123");
                assert_eq!(expires_in, 1234);
            }
            _ => panic!("expected an implicit capture"),
        }
    }

    #[test]
    fn implicit_capture_without_expiry_assumes_a_default_lifetime() {
        let capture = parse_redirect_query("access_token=tok123&state=s", "s");
        match capture {
            Some(Capture::Implicit { expires_in, .. }) => {
                assert_eq!(expires_in, crate::credential::DEFAULT_TOKEN_LIFETIME_SECS);
            }
            _ => panic!("expected an implicit capture"),
        }
    }
}
