//! In-process HTTP doubles for exercising the engine and the backends
//! without touching real providers.

use crate::consent::{BoxFuture, ConsentFlow, ConsentOutcome, ConsentRequest, LoginReason};
use crate::error::AuthError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Consent double: hands out a canned outcome and records how it was
/// asked.
pub(crate) struct FakeConsent {
    outcome: ConsentOutcome,
    calls: AtomicUsize,
    last_reason: Mutex<Option<LoginReason>>,
}

impl FakeConsent {
    pub(crate) fn new(outcome: ConsentOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
            last_reason: Mutex::new(None),
        })
    }

    pub(crate) fn cancelled() -> Arc<Self> {
        Self::new(ConsentOutcome::Cancelled)
    }

    pub(crate) fn granting(code: &str) -> Arc<Self> {
        Self::new(ConsentOutcome::Granted(crate::consent::AuthorizationGrant {
            code: code.to_string(),
            pkce_verifier: None,
            redirect_uri: None,
        }))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_reason(&self) -> Option<LoginReason> {
        *self.last_reason.lock().expect("reason lock")
    }
}

impl ConsentFlow for FakeConsent {
    fn authorize(
        &self,
        request: ConsentRequest,
    ) -> BoxFuture<'_, Result<ConsentOutcome, AuthError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_reason.lock().expect("reason lock") = Some(request.reason);
        let outcome = self.outcome.clone();
        Box::pin(async move { Ok(outcome) })
    }
}

/// One request as seen by a [`MockServer`] handler.
#[derive(Debug, Clone)]
pub(crate) struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: String,
}

type Handler = Arc<dyn Fn(&ReceivedRequest) -> (u16, String) + Send + Sync>;

/// Minimal localhost HTTP server: every request is counted, handed to the
/// handler, and answered with the `(status, json_body)` it returns.
pub(crate) struct MockServer {
    addr: std::net::SocketAddr,
    hits: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    pub(crate) async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&ReceivedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let hits = Arc::new(AtomicUsize::new(0));

        let task_hits = hits.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((conn, _)) = listener.accept().await else {
                    break;
                };
                let conn = hyper_util::rt::TokioIo::new(conn);
                let handler = handler.clone();
                let hits = task_hits.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<body::Incoming>| {
                        let handler = handler.clone();
                        let hits = hits.clone();
                        async move {
                            // Count before the handler runs so that even a
                            // panicking "no request expected" handler shows
                            // up in the tally.
                            hits.fetch_add(1, Ordering::SeqCst);
                            let method = req.method().to_string();
                            let path = req.uri().path().to_string();
                            let query = req.uri().query().unwrap_or("").to_string();
                            let collected = req.into_body().collect().await;
                            let body = collected
                                .map(|b| String::from_utf8_lossy(&b.to_bytes()).into_owned())
                                .unwrap_or_default();
                            let received = ReceivedRequest {
                                method,
                                path,
                                query,
                                body,
                            };
                            let (status, body) = handler(&received);
                            Ok::<_, std::convert::Infallible>(
                                Response::builder()
                                    .status(status)
                                    .header("Content-Type", "application/json")
                                    .body(Full::<Bytes>::from(body))
                                    .expect("static response builds"),
                            )
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(conn, service)
                        .await;
                });
            }
        });

        Self {
            addr,
            hits,
            accept_task,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
