//! Callers and what they may edit

use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core::CollectionKind;
use std::fmt;
use std::str::FromStr;

/// Coarse role granted to a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Editor,
    Coach,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Coach => "coach",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "coach" => Ok(Role::Coach),
            other => Err(CmsError::new(ErrorKind::ValidationFailed)
                .with_op("parse_role")
                .with_message(format!("Unknown role '{}'", other))),
        }
    }
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(id: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Decides whether a caller may modify a collection
pub trait Authorizer: Send + Sync {
    /// # Errors
    ///
    /// `AuthorizationDenied` if `principal` may not modify `collection`.
    fn authorize(&self, principal: &Principal, collection: CollectionKind) -> Result<()>;
}

/// Role table:
/// - admin: every collection
/// - editor: every array collection (site-wide singletons are admin-only)
/// - coach: coaches and events
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl RolePolicy {
    fn role_allows(role: Role, collection: CollectionKind) -> bool {
        match role {
            Role::Admin => true,
            Role::Editor => !collection.is_singleton(),
            Role::Coach => matches!(collection, CollectionKind::Coaches | CollectionKind::Events),
        }
    }
}

impl Authorizer for RolePolicy {
    fn authorize(&self, principal: &Principal, collection: CollectionKind) -> Result<()> {
        if principal
            .roles
            .iter()
            .any(|&role| Self::role_allows(role, collection))
        {
            return Ok(());
        }
        Err(CmsError::new(ErrorKind::AuthorizationDenied)
            .with_op("authorize")
            .with_collection(collection)
            .with_message(format!(
                "Principal '{}' may not modify {}",
                principal.id, collection
            )))
    }
}

/// Allows everything; for local tooling and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _: &Principal, _: CollectionKind) -> Result<()> {
        Ok(())
    }
}
