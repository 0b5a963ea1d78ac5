// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Per-request authorization gate.
//!
//! The HTTP layer invokes this hook for every outgoing request and every
//! response. On the way out it decides whether the request may be sent at
//! all and whether it gets the `Authorization` header; on the way back it
//! reacts to 401/403 from the application's own API.
//!
//! The credential and session state are re-read from the store at dispatch
//! time, never captured earlier: another browsing context may have changed
//! them since the caller built the request.

use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, StatusCode};
use tracing::{info, warn};
use url::Url;

use crate::session::{self, LogoutReason, SessionEngine};

/// API paths that must never carry the `Authorization` header, token or
/// not. Sending a stale bearer token on the login/registration flow would
/// mask credential errors and can trigger a self-inflicted logout loop.
pub const EXCLUDED_ENDPOINTS: &[&str] = &[
    "/api/auths/login",
    "/api/auths/register",
    "/api/auths/confirm-email",
    "/api/auths/resend-confirmation",
    "/api/auths/request-password-reset",
    "/api/auths/reset-password",
];

/// Outcome of the pre-dispatch check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The stored credential is already expired: the request must not be
    /// dispatched. The session has been terminated.
    Cancel,
    /// Not this application's API; forward unmodified.
    PassThrough,
    /// Own API; attach the header when one is supplied.
    Send {
        authorization: Option<HeaderValue>,
    },
}

/// Gate consulted by the HTTP layer around every request.
pub struct AuthRequestGate {
    engine: SessionEngine,
    api_base: Url,
}

impl AuthRequestGate {
    pub fn new(engine: SessionEngine, api_base: Url) -> Self {
        Self { engine, api_base }
    }

    /// Pre-dispatch decision for a request to `target`.
    ///
    /// A present-but-expired credential cancels the request outright and
    /// forces logout, so a silently expired session does not produce a
    /// burst of doomed authenticated calls before the timer fires.
    pub fn before_send(&self, target: &Url) -> GateDecision {
        let token = self.engine.token();

        if let Some(token) = &token {
            if session::is_token_expired(token, self.engine.now()) {
                info!(%target, "stored credential expired, cancelling request");
                self.engine.force_logout(LogoutReason::Expired);
                return GateDecision::Cancel;
            }
        }

        if !self.is_own_api(target) {
            return GateDecision::PassThrough;
        }

        if self.is_excluded(target) {
            return GateDecision::Send {
                authorization: None,
            };
        }

        let authorization = token
            .and_then(|token| HeaderValue::from_str(&format!("Bearer {token}")).ok());
        GateDecision::Send { authorization }
    }

    /// Apply [`Self::before_send`] to an `http` request in place, inserting
    /// the `Authorization` header when the decision carries one.
    ///
    /// Relative request targets are resolved against the configured API
    /// base, matching how the web client addresses its own API.
    pub fn prepare<B>(&self, request: &mut Request<B>) -> GateDecision {
        let target = match self.api_base.join(&request.uri().to_string()) {
            Ok(url) => url,
            Err(e) => {
                warn!(uri = %request.uri(), error = %e, "unresolvable request target, passing through");
                return GateDecision::PassThrough;
            }
        };

        let decision = self.before_send(&target);
        if let GateDecision::Send {
            authorization: Some(value),
        } = &decision
        {
            request.headers_mut().insert(AUTHORIZATION, value.clone());
        }
        decision
    }

    /// Post-dispatch session reaction.
    ///
    /// A 401 from a non-excluded own-API endpoint terminates the session;
    /// the re-read inside the forced logout means a concurrent manual
    /// logout does not double-fire. A 403 leaves the session untouched
    /// (insufficient privilege is not an invalid session). In both cases
    /// the response itself still reaches the caller; this hook only
    /// performs the session side effect.
    pub fn after_response(&self, target: &Url, status: StatusCode) {
        if !self.is_own_api(target) || self.is_excluded(target) {
            return;
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                if self.engine.force_logout(LogoutReason::Unauthorized) {
                    info!(%target, "401 from API, session terminated");
                }
            }
            StatusCode::FORBIDDEN => {
                warn!(%target, "403 from API, insufficient privilege; session kept");
            }
            _ => {}
        }
    }

    /// Whether `target` addresses this application's own API.
    fn is_own_api(&self, target: &Url) -> bool {
        target.scheme() == self.api_base.scheme()
            && target.host_str() == self.api_base.host_str()
            && target.port_or_known_default() == self.api_base.port_or_known_default()
            && target
                .path()
                .starts_with(self.api_base.path().trim_end_matches('/'))
    }

    fn is_excluded(&self, target: &Url) -> bool {
        let base = self.api_base.path().trim_end_matches('/');
        EXCLUDED_ENDPOINTS
            .iter()
            .any(|endpoint| target.path() == format!("{base}{endpoint}"))
    }
}
