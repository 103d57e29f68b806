//! The token tuple held by one authenticated session.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Safety margin subtracted from the recorded expiry when deciding whether
/// an access token is still presentable.
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 5;

/// Access-token lifetime assumed when the provider omits `expires_in`.
pub(crate) const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// The credential tuple for one authenticated session.
///
/// A default-constructed credential is the unauthenticated state: empty
/// token, empty refresh token, scope version zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Current access token; empty means unauthenticated.
    pub token: String,
    /// Long-lived token used to mint new access tokens. Stays empty for
    /// implicit-grant services, which never receive one.
    pub refresh_token: String,
    /// Unix timestamp after which `token` must be treated as expired.
    pub expire_time: u64,
    /// Monotonically increasing tag for the OAuth scope set the current
    /// token was granted under. Zero until the first grant.
    pub scope_version: i64,
    /// Whether the owning service uses the implicit grant.
    pub implicit: bool,
}

impl Credential {
    /// Whether the access token is unusable at unix time `now`.
    ///
    /// True iff the token is empty or `now` is within
    /// [`TOKEN_EXPIRY_MARGIN_SECS`] of the recorded expiry.
    pub fn expired_at(&self, now: u64) -> bool {
        if self.token.is_empty() {
            return true;
        }
        now + TOKEN_EXPIRY_MARGIN_SECS >= self.expire_time
    }

    /// [`Credential::expired_at`] evaluated against the system clock.
    pub fn expired(&self) -> bool {
        self.expired_at(unix_now())
    }
}

/// Current unix time in whole seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
