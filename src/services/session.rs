//! Session guard.
//!
//! A [`SessionContext`] is built per request from the session cookie and
//! handed explicitly to every operation that needs to know who is calling.
//! The cookie carries the [`SessionBinding`] itself together with its issue
//! and expiry times, signed with HMAC-SHA256 under the configured secret:
//!
//! ```text
//! gallery_session=<base64url(json session)>.<base64url(hmac)>
//! ```
//!
//! Anything that fails to decode, verify or is past its expiry is treated as
//! an anonymous caller.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::user::Role,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{convert::Infallible, sync::Arc};
use time::{Duration, OffsetDateTime};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "gallery_session";
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(2);
const MAX_COOKIE_LEN: usize = 2048;

/// The identity a session is bound to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionBinding {
    pub username: String,
    pub role: Role,
}

/// What the cookie actually signs. Times are unix seconds.
#[derive(Serialize, Deserialize)]
struct SignedSession {
    binding: SessionBinding,
    issued_at: i64,
    expires_at: i64,
}

/// Per-request session state: anonymous, or bound to a user and role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    binding: Option<SessionBinding>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { binding: None }
    }

    pub fn bound(binding: SessionBinding) -> Self {
        Self {
            binding: Some(binding),
        }
    }

    pub fn binding(&self) -> Option<&SessionBinding> {
        self.binding.as_ref()
    }

    /// True iff the session carries a username binding.
    pub fn is_authenticated(&self) -> bool {
        self.binding.is_some()
    }

    /// True iff the session is authenticated with the `admin` role.
    pub fn is_admin(&self) -> bool {
        matches!(&self.binding, Some(b) if b.role == Role::Admin)
    }

    /// Gate for administrator-only operations.
    pub fn require_admin(&self) -> GalleryResult<&SessionBinding> {
        match &self.binding {
            Some(binding) if binding.role == Role::Admin => Ok(binding),
            _ => Err(GalleryError::AccessDenied),
        }
    }

    /// Drop every binding (logout).
    pub fn clear(&mut self) {
        self.binding = None;
    }
}

/// Signs and verifies session cookies.
#[derive(Clone)]
pub struct SessionCodec {
    secret: Arc<Vec<u8>>,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret.as_ref().to_vec()),
            ttl,
        }
    }

    fn mac(&self) -> GalleryResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| GalleryError::Session(e.to_string()))
    }

    /// Encode `binding` as a signed token that expires one TTL from now.
    pub fn encode(&self, binding: &SessionBinding) -> GalleryResult<String> {
        self.encode_at(binding, OffsetDateTime::now_utc())
    }

    fn encode_at(&self, binding: &SessionBinding, issued_at: OffsetDateTime) -> GalleryResult<String> {
        let session = SignedSession {
            binding: binding.clone(),
            issued_at: issued_at.unix_timestamp(),
            expires_at: (issued_at + self.ttl).unix_timestamp(),
        };
        let payload =
            serde_json::to_vec(&session).map_err(|e| GalleryError::Session(e.to_string()))?;
        let payload_part = URL_SAFE_NO_PAD.encode(payload);
        let mut mac = self.mac()?;
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", payload_part, sig_part))
    }

    /// Verify and decode a token. Returns `None` for anything that was not
    /// produced by [`SessionCodec::encode`] under the same secret, and for
    /// tokens whose expiry has passed.
    pub fn decode(&self, token: &str) -> Option<SessionBinding> {
        self.decode_at(token, OffsetDateTime::now_utc())
    }

    fn decode_at(&self, token: &str, now: OffsetDateTime) -> Option<SessionBinding> {
        if token.len() > MAX_COOKIE_LEN {
            debug!("session cookie exceeds max length");
            return None;
        }
        let (payload_part, sig_part) = token.split_once('.')?;
        let expected = URL_SAFE_NO_PAD.decode(sig_part).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(payload_part.as_bytes());
        if mac.verify_slice(&expected).is_err() {
            debug!("session cookie signature mismatch");
            return None;
        }
        let payload = URL_SAFE_NO_PAD.decode(payload_part).ok()?;
        let session: SignedSession = match serde_json::from_slice(&payload) {
            Ok(session) => session,
            Err(err) => {
                debug!("session cookie payload invalid: {}", err);
                return None;
            }
        };
        if session.expires_at <= now.unix_timestamp() {
            debug!(username = %session.binding.username, "session cookie expired");
            return None;
        }
        Some(session.binding)
    }

    /// Build the context for a request from its cookies.
    pub fn context_from_jar(&self, jar: &CookieJar) -> SessionContext {
        match jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| self.decode(cookie.value()))
        {
            Some(binding) => SessionContext::bound(binding),
            None => SessionContext::anonymous(),
        }
    }

    /// Build the context for a request from its `Cookie` headers.
    pub fn context_from_headers(&self, headers: &HeaderMap) -> SessionContext {
        self.context_from_jar(&CookieJar::from_headers(headers))
    }

    /// The cookie that establishes `binding`. Browsers drop it when the
    /// signed expiry passes.
    pub fn session_cookie(&self, binding: &SessionBinding) -> GalleryResult<Cookie<'static>> {
        let token = self.encode(binding)?;
        Ok(Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.ttl)
            .build())
    }

    /// The cookie that removes the session cookie.
    pub fn removal_cookie() -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .build();
        cookie.make_removal();
        cookie
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    SessionCodec: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = SessionCodec::from_ref(state);
        Ok(codec.context_from_headers(&parts.headers))
    }
}
