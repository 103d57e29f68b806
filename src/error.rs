//! Error taxonomy shared by the OAuth engine, the service backends, and the
//! broadcast coordinator.
//!
//! The split mirrors how failures have to be handled rather than where they
//! occur: transport and parse failures are surfaced unretried, a provider
//! `invalid_grant` gets exactly one interactive re-login, and validation or
//! scope failures never reach the network at all.

/// Error type returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The HTTP request could not be completed (connect failure, timeout,
    /// or an empty response where a body was required).
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    /// The remote endpoint answered, but the body was not the JSON we
    /// expected.
    #[error("malformed response from {url}: {detail}")]
    Parse { url: String, detail: String },

    /// A well-formed error payload from the remote API.
    ///
    /// `code` is the provider's machine-readable reason (e.g.
    /// `invalid_grant`, `redundantTransition`); `description` is the
    /// human-readable message to show alongside it, when the provider sent
    /// one.
    #[error("service error {code}: {description}")]
    Provider {
        code: String,
        description: String,
        /// HTTP status the payload arrived with. Token-endpoint errors
        /// that reach us through the OAuth2 layer report 400.
        status: u16,
    },

    /// The stored token was granted under an older scope set and the user
    /// declined to re-authorize under the new one.
    #[error(
        "stored credentials were granted under scope version {granted}, \
         but version {required} is required; please sign in again"
    )]
    ScopeInsufficient { granted: i64, required: i64 },

    /// The provider answered 403 to the channel query, which means the
    /// account must enable two-factor authentication before it may stream.
    /// No retry can resolve this; the user has to change the account
    /// settings on the provider's site.
    #[error(
        "the provider requires two-factor authentication to be enabled on \
         this account before streaming is allowed"
    )]
    TwoFactorRequired,

    /// A client-side length/format check rejected the input before any
    /// network call was made.
    #[error("{0}")]
    Validation(String),

    /// The user dismissed the interactive consent flow.
    #[error("login was cancelled")]
    Cancelled,
}

impl AuthError {
    /// Whether this error is a provider rejection of the presented access
    /// token. Authenticated request paths use this to decide on their
    /// single refresh-and-retry.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Provider { status: 401, .. })
    }

    /// Whether this is the provider telling us a broadcast transition was
    /// requested into the state it is already in.
    pub(crate) fn is_redundant_transition(&self) -> bool {
        matches!(self, AuthError::Provider { code, .. } if code == "redundantTransition")
    }
}
