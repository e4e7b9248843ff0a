//! List and membership mutation operations.
//!
//! Each operation runs inside one list's critical section. Operations that
//! reach other lists do so only after the origin list's lock is released, and
//! then one list at a time (see [`propagate`]).

pub mod address_change;
pub mod member_options;
pub mod password;
pub mod propagate;
pub mod roster;
pub mod settings;
pub mod subscribe;
pub mod unsubscribe;

use sha2::{Digest, Sha256};

use crate::model::password::PasswordHash;

/// Log target for refused requests that may be probing for membership.
pub const MISCHIEF_TARGET: &str = "listmgr::mischief";

/// The role a caller authenticated as. Authentication itself happens
/// outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The member the request is about.
    Member,
    ListAdmin,
    SiteAdmin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::ListAdmin | Self::SiteAdmin)
    }

    /// Changes to a member's other subscriptions require the member or the
    /// site administrator. A list administrator may not make them.
    pub fn may_propagate(self) -> bool {
        matches!(self, Self::Member | Self::SiteAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::ListAdmin => "list-admin",
            Self::SiteAdmin => "site-admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session credential derived from a stored password hash. Handed back after
/// a password change so the caller does not have to log in again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub role: Role,
    pub list: String,
    /// Address for member credentials.
    pub subject: Option<String>,
    pub digest: String,
}

impl SessionCredential {
    pub fn new(role: Role, list: &str, subject: Option<&str>, secret: &PasswordHash) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(role.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(list.as_bytes());
        hasher.update(b":");
        hasher.update(subject.unwrap_or_default().as_bytes());
        hasher.update(b":");
        hasher.update(secret.as_str().as_bytes());
        Self {
            role,
            list: list.to_string(),
            subject: subject.map(str::to_string),
            digest: hex::encode(hasher.finalize()),
        }
    }
}

/// Note attached when a list administrator asks for a cross-list change.
pub(crate) fn propagation_denied(what: &str) -> String {
    format!(
        "The list administrator may not change the {what} for this user's other \
         subscriptions. However, the {what} for this mailing list has been changed."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(Role::Member.may_propagate());
        assert!(Role::SiteAdmin.may_propagate());
        assert!(!Role::ListAdmin.may_propagate());
        assert!(!Role::Member.is_admin());
    }

    #[test]
    fn test_credential_changes_with_secret() {
        let a = SessionCredential::new(Role::ListAdmin, "dev", None, &PasswordHash::new("one"));
        let b = SessionCredential::new(Role::ListAdmin, "dev", None, &PasswordHash::new("one"));
        // Fresh salt, fresh credential.
        assert_ne!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
    }
}
