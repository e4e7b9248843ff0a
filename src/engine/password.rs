//! Member password changes.

use tracing::info;

use super::propagate::{self, GlobalChange, PropagationReport};
use super::{propagation_denied, Role, SessionCredential};
use crate::error::{ListError, PasswordError, Result};
use crate::model::password::PasswordHash;
use crate::store::ListStore;

/// Outcome of a successful password change.
#[derive(Debug)]
pub struct PasswordChangeReport {
    /// Replaces the caller's session credential.
    pub credential: SessionCredential,
    pub notes: Vec<String>,
    pub propagation: Option<PropagationReport>,
}

/// Check the new password and its confirmation.
pub fn check_new_password(new: &str, confirm: &str) -> std::result::Result<(), PasswordError> {
    if new.is_empty() || confirm.is_empty() {
        return Err(PasswordError::Blank);
    }
    if new != confirm {
        return Err(PasswordError::Mismatch);
    }
    Ok(())
}

/// Change the password of `address` on `list_name` and, when asked and
/// allowed, on every other subscription on the same host.
pub fn change_member_password(
    store: &ListStore,
    list_name: &str,
    role: Role,
    address: &str,
    new: &str,
    confirm: &str,
    globally: bool,
) -> Result<PasswordChangeReport> {
    check_new_password(new, confirm)?;
    let hash = PasswordHash::new(new);

    let host = store.with_list(list_name, |list| {
        let member = list
            .member_mut(address)
            .ok_or_else(|| ListError::NoSuchMember(address.to_string()))?;
        member.password = hash.clone();
        Ok(list.host_name().to_string())
    })?;
    info!(list = list_name, address, globally, "Member password changed");

    let mut report = PasswordChangeReport {
        credential: SessionCredential::new(role, list_name, Some(address), &hash),
        notes: Vec::new(),
        propagation: None,
    };
    if globally {
        if role.may_propagate() {
            let change = GlobalChange {
                password: Some(hash),
                ..GlobalChange::default()
            };
            report.propagation = Some(propagate::propagate_to_other_lists(
                store, list_name, &host, address, &change,
            )?);
        } else {
            report.notes.push(propagation_denied("password"));
        }
    }
    Ok(report)
}
