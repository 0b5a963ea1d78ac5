// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Session state derivation and the session engine facade.
//!
//! Session state is a value, not a store: it is recomputed on demand from
//! `TokenStore::read()` plus the current wall clock, which eliminates drift
//! between a cached "is valid" flag and the actual credential. The storage
//! tiers are process-wide and may be mutated by another browsing context,
//! so no accessor caches a previous read.
//!
//! ## Write path ordering
//!
//! A credential write, its state recomputation and the auto-logout re-arm
//! form one logical step: [`SessionEngine::login`] runs them synchronously,
//! in that order, before any listener observes the change. A generation
//! counter makes a timer armed for a superseded credential a no-op even if
//! its task was already past the cancellation point.
//!
//! ## Notifications
//!
//! Reactive consumers register plain callbacks ([`SessionEngine::subscribe`])
//! invoked synchronously after every write and clear. A
//! [`SessionEvent::LoggedOut`] doubles as the navigation signal: the hosting
//! router is expected to send the user to [`LOGIN_ROUTE`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::claims::{self, ClaimField};
use crate::clock::{Clock, SystemClock};
use crate::roles::Role;
use crate::scheduler::{AutoLogoutScheduler, ScheduleOutcome};
use crate::store::TokenStore;

/// Route the guards and logout transitions redirect to.
pub const LOGIN_ROUTE: &str = "/connexion";

/// Post-login landing route when no return URL was captured.
pub const DEFAULT_RETURN_TARGET: &str = "/espace";

/// Lifecycle state of the session at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential stored.
    Anonymous,
    /// Credential stored and not past its expiry.
    Authenticated,
    /// Credential stored but past its expiry.
    Expired,
}

/// Immutable snapshot derived from the stored credential and the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub role: Option<Role>,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
}

impl SessionSnapshot {
    pub fn anonymous() -> Self {
        Self {
            status: SessionStatus::Anonymous,
            role: None,
            user_id: None,
            display_name: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Pure derivation from the raw credential and the current instant.
    ///
    /// An undecodable payload degrades to an identity-less snapshot rather
    /// than an error: the credential is still present, and with no readable
    /// expiry it is not expired (see [`is_token_expired`]).
    pub fn derive(token: Option<&str>, now: DateTime<Utc>) -> Self {
        let Some(token) = token else {
            return Self::anonymous();
        };

        let claims = match claims::decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "credential payload undecodable, no identity derived");
                return Self {
                    status: SessionStatus::Authenticated,
                    role: None,
                    user_id: None,
                    display_name: None,
                };
            }
        };

        let status = match claims::expiry(&claims) {
            Some(expiry) if now >= expiry => SessionStatus::Expired,
            _ => SessionStatus::Authenticated,
        };

        Self {
            status,
            // Unrecognized role strings normalize to the least-privileged
            // role; an absent role claim stays absent.
            role: claims::resolve(&claims, ClaimField::Role).map(Role::normalize),
            user_id: claims::resolve(&claims, ClaimField::UserId).map(str::to_string),
            display_name: claims::display_name(&claims),
        }
    }
}

/// Whether the credential is past its expiry at `now`.
///
/// Policy: a credential with no readable expiry (absent `exp` claim or an
/// undecodable payload) never expires client-side. The session persists
/// until explicit logout or a 401 from the API.
pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    match claims::decode(token).ok().and_then(|c| claims::expiry(&c)) {
        Some(expiry) => now >= expiry,
        None => false,
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Explicit user logout.
    Manual,
    /// The credential's expiry was reached (timer or pre-dispatch check).
    Expired,
    /// The API answered 401 on an authenticated endpoint.
    Unauthorized,
}

/// Change notification delivered to registered consumers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoggedIn(SessionSnapshot),
    LoggedOut { reason: LogoutReason },
}

type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

struct Inner {
    store: TokenStore,
    clock: Arc<dyn Clock>,
    scheduler: AutoLogoutScheduler,
    listeners: Mutex<Vec<Listener>>,
    /// Bumped on every login and manual logout; a timer fire belonging to
    /// an older generation is ignored.
    generation: AtomicU64,
}

impl Inner {
    fn notify(&self, event: &SessionEvent) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(event);
        }
    }

    fn force_logout(&self, reason: LogoutReason) -> bool {
        // Check-before-act: the session captured at dispatch time may have
        // been torn down since (a manual logout racing a 401 or a timer
        // fire). Re-read the store instead of trusting the caller.
        if self.store.read().is_none() {
            return false;
        }
        self.scheduler.cancel();
        self.store.clear();
        info!(?reason, "session terminated");
        self.notify(&SessionEvent::LoggedOut { reason });
        true
    }
}

/// Facade over credential storage, state derivation, auto-logout and
/// change notification.
///
/// Cheap to clone; clones share the same session.
pub struct SessionEngine {
    inner: Arc<Inner>,
}

impl Clone for SessionEngine {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SessionEngine {
    /// Engine over the given store, using the system wall clock.
    pub fn new(store: TokenStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: TokenStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                scheduler: AutoLogoutScheduler::new(),
                listeners: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Accept a freshly issued credential.
    ///
    /// Clears both tiers, writes to the selected one, recomputes the
    /// session state and re-arms the auto-logout timer before notifying
    /// listeners. A credential that is already expired is torn down on the
    /// spot: no zero-length timer, an immediate `LoggedOut` notification.
    ///
    /// Must be called from within a tokio runtime when the credential
    /// carries a future expiry (the timer task is spawned on it).
    pub fn login(&self, token: &str, remember: bool) {
        let inner = &self.inner;
        inner.store.write(token, remember);

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let now = inner.clock.now();
        let snapshot = SessionSnapshot::derive(Some(token), now);
        let expiry = claims::decode(token).ok().and_then(|c| claims::expiry(&c));

        let weak = Arc::downgrade(inner);
        let outcome = inner.scheduler.schedule(expiry, now, move || {
            let Some(inner) = weak.upgrade() else { return };
            // A newer credential supersedes this timer.
            if inner.generation.load(Ordering::SeqCst) == generation {
                inner.force_logout(LogoutReason::Expired);
            }
        });

        if outcome == ScheduleOutcome::AlreadyExpired {
            warn!("login with an already-expired credential, ending session immediately");
            inner.store.clear();
            inner.notify(&SessionEvent::LoggedOut {
                reason: LogoutReason::Expired,
            });
            return;
        }

        info!(status = ?snapshot.status, role = ?snapshot.role, remember, "session established");
        inner.notify(&SessionEvent::LoggedIn(snapshot));
    }

    /// Explicit logout: cancel the timer, clear both tiers, notify.
    pub fn logout(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.scheduler.cancel();
        self.inner.store.clear();
        info!("manual logout");
        self.inner.notify(&SessionEvent::LoggedOut {
            reason: LogoutReason::Manual,
        });
    }

    /// Terminate the session if one is still live. Returns whether a
    /// transition actually happened.
    pub(crate) fn force_logout(&self, reason: LogoutReason) -> bool {
        self.inner.force_logout(reason)
    }

    /// Fresh snapshot from the stored credential and the clock.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::derive(self.inner.store.read().as_deref(), self.inner.clock.now())
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    pub fn role(&self) -> Option<Role> {
        self.snapshot().role
    }

    pub fn user_id(&self) -> Option<String> {
        self.snapshot().user_id
    }

    pub fn display_name(&self) -> Option<String> {
        self.snapshot().display_name
    }

    /// Display name, or the caller-supplied placeholder when no name claim
    /// is readable.
    pub fn display_name_or(&self, default: &str) -> String {
        self.display_name()
            .unwrap_or_else(|| default.to_string())
    }

    /// Raw stored credential, if any.
    pub fn token(&self) -> Option<String> {
        self.inner.store.read()
    }

    /// Whether the last login asked to be remembered.
    pub fn remembered(&self) -> bool {
        self.inner.store.remembered()
    }

    /// Register a change listener, invoked synchronously after every write
    /// and clear. Listeners must not call back into the engine's write path.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().unwrap().push(Box::new(listener));
    }

    pub fn login_route(&self) -> &'static str {
        LOGIN_ROUTE
    }

    pub(crate) fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }
}
