// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Navigation guards.
//!
//! The route table consults these on every navigation; both read the
//! session state fresh at navigation time. [`RouteAccessGuard`] gates on
//! authentication alone, [`RoleGuard`] additionally applies the role
//! hierarchy of [`crate::roles::Role`].

use crate::roles::Role;
use crate::session::{SessionEngine, LOGIN_ROUTE};

/// Guard verdict for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect {
        to: String,
        /// Originally requested URL, replayed after login.
        return_url: Option<String>,
    },
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        *self == GuardOutcome::Allow
    }

    fn to_login(return_url: Option<&str>) -> Self {
        GuardOutcome::Redirect {
            to: LOGIN_ROUTE.to_string(),
            return_url: return_url.map(str::to_string),
        }
    }
}

/// Denies navigation to unauthenticated users, redirecting to the login
/// route with the requested URL as return target.
pub struct RouteAccessGuard {
    engine: SessionEngine,
}

impl RouteAccessGuard {
    pub fn new(engine: SessionEngine) -> Self {
        Self { engine }
    }

    pub fn check(&self, requested_url: &str) -> GuardOutcome {
        if self.engine.is_authenticated() {
            GuardOutcome::Allow
        } else {
            GuardOutcome::to_login(Some(requested_url))
        }
    }
}

/// Denies navigation unless the session's role satisfies the route's
/// allowed set (including the one-hop Admin → Librarian inheritance).
pub struct RoleGuard {
    engine: SessionEngine,
    allowed: Vec<Role>,
}

impl RoleGuard {
    pub fn new(engine: SessionEngine, allowed: Vec<Role>) -> Self {
        Self { engine, allowed }
    }

    pub fn check(&self) -> GuardOutcome {
        let snapshot = self.engine.snapshot();

        if !snapshot.is_authenticated() {
            return GuardOutcome::to_login(None);
        }

        // The snapshot's role is already normalized (unrecognized claim
        // values map to the least-privileged role); an absent role claim
        // is a denial.
        match snapshot.role {
            Some(role) if role.satisfies(&self.allowed) => GuardOutcome::Allow,
            _ => GuardOutcome::to_login(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::claims::forge_token;
    use crate::store::TokenStore;

    fn engine_with_role(role: Option<&str>) -> SessionEngine {
        let engine = SessionEngine::new(TokenStore::in_memory());
        let mut payload = json!({"sub": "u1"});
        if let Some(role) = role {
            payload["role"] = json!(role);
        }
        engine.login(&forge_token(&payload), false);
        engine
    }

    #[test]
    fn unauthenticated_navigation_redirects_with_return_url() {
        let engine = SessionEngine::new(TokenStore::in_memory());
        let guard = RouteAccessGuard::new(engine);

        assert_eq!(
            guard.check("/espace/mes-emprunts"),
            GuardOutcome::Redirect {
                to: LOGIN_ROUTE.to_string(),
                return_url: Some("/espace/mes-emprunts".to_string()),
            }
        );
    }

    #[test]
    fn authenticated_navigation_is_allowed() {
        let engine = engine_with_role(Some("User"));
        let guard = RouteAccessGuard::new(engine);
        assert!(guard.check("/espace").is_allowed());
    }

    #[test]
    fn admin_reaches_librarian_routes_but_not_user_only_ones() {
        let engine = engine_with_role(Some("Admin"));

        assert!(RoleGuard::new(engine.clone(), vec![Role::Admin]).check().is_allowed());
        assert!(RoleGuard::new(engine.clone(), vec![Role::Librarian])
            .check()
            .is_allowed());
        assert!(!RoleGuard::new(engine, vec![Role::User]).check().is_allowed());
    }

    #[test]
    fn librarian_is_denied_on_admin_routes() {
        let engine = engine_with_role(Some("Librarian"));

        assert!(RoleGuard::new(engine.clone(), vec![Role::Librarian])
            .check()
            .is_allowed());
        assert!(!RoleGuard::new(engine, vec![Role::Admin]).check().is_allowed());
    }

    #[test]
    fn unrecognized_role_is_treated_as_least_privileged() {
        let engine = engine_with_role(Some("stagiaire"));

        assert!(RoleGuard::new(engine.clone(), vec![Role::User]).check().is_allowed());
        assert!(!RoleGuard::new(engine, vec![Role::Librarian]).check().is_allowed());
    }

    #[test]
    fn absent_role_claim_is_denied() {
        let engine = engine_with_role(None);

        assert_eq!(
            RoleGuard::new(engine, vec![Role::User]).check(),
            GuardOutcome::Redirect {
                to: LOGIN_ROUTE.to_string(),
                return_url: None,
            }
        );
    }

    #[test]
    fn anonymous_user_is_denied_on_role_routes() {
        let engine = SessionEngine::new(TokenStore::in_memory());
        assert!(!RoleGuard::new(engine, vec![Role::User]).check().is_allowed());
    }
}
