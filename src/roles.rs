//! Role vocabulary and tagged-text validation.
//!
//! Roles are opaque lowercase identifiers drawn from a closed set fixed at
//! configuration time. The same vocabulary validates document tags at
//! ingestion and caller privileges at query time.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A role identifier, normalized to lowercase.
///
/// Constructed through [`RoleRegistry::validate`], so a `Role` value is
/// always a member of the configured vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub(crate) fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of allowed role names.
///
/// Entries are lowercased at construction and the set is frozen afterwards;
/// share clones freely across ingestion and retrieval.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    allowed: BTreeSet<String>,
}

impl RoleRegistry {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = roles
            .into_iter()
            .map(|role| role.as_ref().to_lowercase())
            .collect();
        Self { allowed }
    }

    /// Normalize a candidate to lowercase and check membership.
    pub fn validate(&self, candidate: &str) -> Result<Role, RagError> {
        let normalized = candidate.to_lowercase();
        if self.allowed.contains(&normalized) {
            Ok(Role::new_unchecked(normalized))
        } else {
            Err(RagError::Validation(format!(
                "role '{normalized}' is not an allowed role, allowed roles: {:?}",
                self.allowed
            )))
        }
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// A document body plus the roles allowed to retrieve it.
#[derive(Debug, Clone)]
pub struct TaggedText {
    pub text: String,
    pub roles: Vec<Role>,
}

impl TaggedText {
    /// Validate every tag against the registry, case-insensitively.
    pub fn new(
        text: impl Into<String>,
        roles: &[&str],
        registry: &RoleRegistry,
    ) -> Result<Self, RagError> {
        let roles = roles
            .iter()
            .map(|role| registry.validate(role))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            text: text.into(),
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RoleRegistry {
        RoleRegistry::new(["ceo", "manager", "intern"])
    }

    #[test]
    fn validate_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.validate("CEO").unwrap(), registry.validate("ceo").unwrap());
        assert_eq!(registry.validate("Manager").unwrap().as_str(), "manager");
    }

    #[test]
    fn validate_rejects_unknown_role_and_names_the_allowed_set() {
        let err = registry().validate("janitor").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("janitor"));
        assert!(message.contains("ceo"));
    }

    #[test]
    fn registry_normalizes_its_own_vocabulary() {
        let registry = RoleRegistry::new(["CEO", "Manager"]);
        assert!(registry.validate("ceo").is_ok());
        assert_eq!(registry.allowed().collect::<Vec<_>>(), vec!["ceo", "manager"]);
    }

    #[test]
    fn tagged_text_validates_every_tag() {
        let registry = registry();
        let tagged = TaggedText::new("quarterly numbers", &["CEO", "Manager"], &registry).unwrap();
        let tags: Vec<&str> = tagged.roles.iter().map(Role::as_str).collect();
        assert_eq!(tags, vec!["ceo", "manager"]);

        assert!(TaggedText::new("oops", &["ceo", "janitor"], &registry).is_err());
    }
}
