// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller roles asserted by the gateway.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Caller role carried in the `X-User-Role` header.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access
/// - `User` - Normal caller (least privilege)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Normal user
    User,
}

impl Role {
    /// Map a gateway role header to a role.
    ///
    /// Only the exact value `ADMIN` grants the admin role. Anything else,
    /// including `admin` or an empty string, degrades to [`Role::User`].
    pub fn from_header(value: &str) -> Role {
        if value == "ADMIN" {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Header representation, as forwarded to the upstream service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
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
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_admin_maps_to_admin() {
        assert_eq!(Role::from_header("ADMIN"), Role::Admin);
    }

    #[test]
    fn anything_else_maps_to_user() {
        for value in ["admin", "Admin", "SUPERUSER", "USER", "", " ADMIN"] {
            assert_eq!(Role::from_header(value), Role::User, "value {value:?}");
        }
    }

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(Role::User.to_string(), "USER");
    }
}
