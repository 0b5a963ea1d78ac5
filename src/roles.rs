// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! User roles for route authorization.

use serde::{Deserialize, Serialize};

/// User roles, least privileged first.
///
/// ## Role Hierarchy
///
/// - `User` - Regular member: catalog, own loans and reservations
/// - `Librarian` - Staff: catalog and loan/reservation management
/// - `Admin` - Full administrative access, including user management
///
/// Inheritance is one hop only: `Admin` satisfies `Librarian`-scoped
/// routes, but not routes scoped exclusively to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Regular library member
    User,
    /// Library staff
    Librarian,
    /// Full administrative access
    Admin,
}

impl Role {
    /// Parse a role claim (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "librarian" => Some(Role::Librarian),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Parse a role claim, mapping any unrecognized value to the least
    /// privileged role.
    pub fn normalize(s: &str) -> Role {
        Role::parse(s).unwrap_or(Role::User)
    }

    /// Whether this role grants access to a route restricted to `allowed`.
    ///
    /// Exact membership wins; beyond that, `Admin` inherits access to
    /// `Librarian`-scoped routes. The inheritance is intentionally not
    /// transitive down to `User`-only routes.
    pub fn satisfies(&self, allowed: &[Role]) -> bool {
        if allowed.contains(self) {
            return true;
        }
        *self == Role::Admin && allowed.contains(&Role::Librarian)
    }
}

impl Default for Role {
    /// Default role is User (least privilege).
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Librarian => write!(f, "Librarian"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("Librarian"), Some(Role::Librarian));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn normalize_maps_unknown_to_least_privilege() {
        assert_eq!(Role::normalize("Admin"), Role::Admin);
        assert_eq!(Role::normalize("intern"), Role::User);
        assert_eq!(Role::normalize(""), Role::User);
    }

    #[test]
    fn admin_inherits_librarian_routes_only() {
        assert!(Role::Admin.satisfies(&[Role::Admin]));
        assert!(Role::Admin.satisfies(&[Role::Librarian]));
        // No transitive inheritance down to User-only routes.
        assert!(!Role::Admin.satisfies(&[Role::User]));
    }

    #[test]
    fn librarian_does_not_reach_admin_routes() {
        assert!(Role::Librarian.satisfies(&[Role::Librarian]));
        assert!(!Role::Librarian.satisfies(&[Role::Admin]));
        assert!(!Role::Librarian.satisfies(&[Role::User]));
    }

    #[test]
    fn user_only_matches_user_routes() {
        assert!(Role::User.satisfies(&[Role::User]));
        assert!(Role::User.satisfies(&[Role::User, Role::Librarian]));
        assert!(!Role::User.satisfies(&[Role::Librarian, Role::Admin]));
    }

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default(), Role::User);
    }
}
