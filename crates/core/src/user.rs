//! # User Module
//!
//! People who use the ledger, and how they become members of an organization.
//!
//! A user row can exist before the person ever signs in (an invitation). The
//! first authenticated sign-in links the external identity to that row. This
//! is modeled as an explicit two-state [`Membership`] rather than a pair of
//! nullable columns:
//!
//! ```text
//!   Invited { organization }  ──(first sign-in)──▶  Active { external_id, organization }
//! ```

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role of a user inside their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Founding member; may invite others
    Admin,
    /// Regular member
    User,
}

impl Role {
    /// Code string stored in the DB
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Parse from the DB code
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership state of a user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Membership {
    /// Pre-provisioned by an admin; the person has never signed in.
    ///
    /// Legacy invitations may lack an organization.
    Invited { organization_id: Option<String> },
    /// Linked to an external identity. Always belongs to an organization.
    Active {
        external_id: String,
        organization_id: String,
    },
}

impl Membership {
    /// Rebuild the state from the two nullable storage columns.
    ///
    /// Returns `None` for the impossible combination "external identity
    /// without organization", which storage forbids with a CHECK constraint.
    pub fn from_columns(
        external_id: Option<String>,
        organization_id: Option<String>,
    ) -> Option<Self> {
        match (external_id, organization_id) {
            (None, organization_id) => Some(Membership::Invited { organization_id }),
            (Some(external_id), Some(organization_id)) => Some(Membership::Active {
                external_id,
                organization_id,
            }),
            (Some(_), None) => None,
        }
    }

    pub fn organization_id(&self) -> Option<&str> {
        match self {
            Membership::Invited { organization_id } => organization_id.as_deref(),
            Membership::Active {
                organization_id, ..
            } => Some(organization_id),
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        match self {
            Membership::Invited { .. } => None,
            Membership::Active { external_id, .. } => Some(external_id),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Membership::Active { .. })
    }
}

/// A person known to the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Normalized (trimmed, lowercased) email
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub membership: Membership,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Pre-provision an invited user
    pub fn invited(email: &str, organization_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            name: None,
            role: Role::User,
            membership: Membership::Invited {
                organization_id: Some(organization_id.to_string()),
            },
            created_at: Utc::now(),
        }
    }

    /// Founding member of a freshly bootstrapped organization
    pub fn founder(principal: &Principal, organization_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: principal.normalized_email(),
            name: principal.display_name.clone(),
            role: Role::Admin,
            membership: Membership::Active {
                external_id: principal.external_id.clone(),
                organization_id: organization_id.to_string(),
            },
            created_at: Utc::now(),
        }
    }

    /// Name shown in member pickers: name, else email
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> ({})", self.display_name(), self.email, self.role)
    }
}

/// Authenticated principal handed over by the identity provider.
///
/// Trusted as is; credentials are never re-verified here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Organization name entered during signup, used only when bootstrapping
    pub organization_name: Option<String>,
}

impl Principal {
    pub fn new(external_id: &str, email: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            email: email.to_string(),
            display_name: None,
            organization_name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn with_organization_name(mut self, name: &str) -> Self {
        self.organization_name = Some(name.to_string());
        self
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Trim and lowercase an email for lookups and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose syntactic email check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.contains('@') && !s.chars().any(char::is_whitespace);
    if !clean(local) || !clean(domain) {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < domain.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_str() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::parse("USER").unwrap(), Role::User);
        assert!(Role::parse("owner").is_err());
    }

    #[test]
    fn test_membership_from_columns() {
        assert_eq!(
            Membership::from_columns(None, Some("org".into())),
            Some(Membership::Invited {
                organization_id: Some("org".into())
            })
        );
        assert!(Membership::from_columns(Some("ext".into()), Some("org".into()))
            .unwrap()
            .is_active());
        assert_eq!(Membership::from_columns(Some("ext".into()), None), None);
    }

    #[test]
    fn test_invited_user() {
        let user = User::invited("  Bob@Example.COM ", "org-1");
        assert_eq!(user.email, "bob@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.membership.organization_id(), Some("org-1"));
        assert_eq!(user.membership.external_id(), None);
    }

    #[test]
    fn test_founder_is_active_admin() {
        let principal = Principal::new("auth-1", "Alice@Example.com").with_name("Alice");
        let user = User::founder(&principal, "org-1");
        assert!(user.role.is_admin());
        assert_eq!(user.membership.external_id(), Some("auth-1"));
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.display_name(), "Alice");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User::invited("carol@example.com", "org-1");
        assert_eq!(user.display_name(), "carol@example.com");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@b."));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@c.com"));
        assert!(!is_valid_email("a@@c.com"));
    }
}
