//! # Organization Module
//!
//! The tenant boundary. Every expense and payment belongs to exactly one
//! organization, and every organization owns one sequence counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name used when the signup flow does not supply one.
pub const DEFAULT_ORGANIZATION_NAME: &str = "My Organization";

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization with a fresh id.
    ///
    /// Blank names fall back to [`DEFAULT_ORGANIZATION_NAME`].
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            name: if name.is_empty() {
                DEFAULT_ORGANIZATION_NAME.to_string()
            } else {
                name.to_string()
            },
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization() {
        let org = Organization::new("  Acme Builders ");
        assert_eq!(org.name, "Acme Builders");
        assert!(Uuid::parse_str(&org.id).is_ok());
    }

    #[test]
    fn test_blank_name_uses_default() {
        assert_eq!(Organization::new("   ").name, DEFAULT_ORGANIZATION_NAME);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Organization::new("a").id, Organization::new("a").id);
    }
}
