// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Biblio Session - Client-side session & authorization engine
//!
//! This crate is the session core of the Biblio médiathèque web client: it
//! stores the bearer credential issued by the login endpoint, derives
//! identity and role from it, keeps a wall-clock auto-logout timer in sync
//! with the credential's expiry, decides per outgoing request whether the
//! `Authorization` header is attached, and gates navigation by role.
//!
//! The credential's signature is never validated here; everything decoded
//! from it is advisory (display and expiry bookkeeping). Authorization
//! decisions are re-made by the server on every request.
//!
//! ## Modules
//!
//! - `claims` - credential payload decoding and claim alias resolution
//! - `store` - two-tier credential persistence (ephemeral / persistent)
//! - `session` - state derivation and the [`SessionEngine`] facade
//! - `scheduler` - the single auto-logout timer
//! - `gate` - per-request authorization gate (header injection, 401/403)
//! - `guards` - navigation guards ([`RouteAccessGuard`], [`RoleGuard`])
//! - `roles` - the User / Librarian / Admin hierarchy

pub mod claims;
pub mod clock;
pub mod gate;
pub mod guards;
pub mod roles;
pub mod scheduler;
pub mod session;
pub mod store;

pub use claims::{Claims, DecodeError};
pub use clock::{Clock, SystemClock};
pub use gate::{AuthRequestGate, GateDecision, EXCLUDED_ENDPOINTS};
pub use guards::{GuardOutcome, RoleGuard, RouteAccessGuard};
pub use roles::Role;
pub use session::{
    is_token_expired, LogoutReason, SessionEngine, SessionEvent, SessionSnapshot, SessionStatus,
    DEFAULT_RETURN_TARGET, LOGIN_ROUTE,
};
pub use store::{MemoryBackend, StorageBackend, StorageError, TokenStore};
