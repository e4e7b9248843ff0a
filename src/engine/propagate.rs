//! Re-applying a member's changes to their other subscriptions.
//!
//! Targets are handled one after another, each under its own lock, and never
//! while the origin list is locked. A failure on one target is recorded and
//! the remaining targets are still processed.

use tracing::{info, warn};

use super::member_options::set_member_option;
use super::Role;
use crate::error::{ListError, MemberError, Result};
use crate::model::member::MemberOption;
use crate::model::password::PasswordHash;
use crate::store::ListStore;

/// The subset of changes that may be carried to other lists. Every part is
/// optional; an empty change does nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalChange {
    pub options: Vec<(MemberOption, bool)>,
    pub password: Option<PasswordHash>,
    /// New full name; `Some(None)` clears it.
    pub name: Option<Option<String>>,
}

impl GlobalChange {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.password.is_none() && self.name.is_none()
    }
}

/// What happened on one target list.
#[derive(Debug)]
pub enum TargetOutcome {
    Applied,
    /// Some options were refused; everything else was applied.
    Partial(Vec<(MemberOption, MemberError)>),
    /// The address left the list between enumeration and locking.
    NoLongerMember,
    /// The list could not be locked, loaded or saved.
    Failed(ListError),
}

impl TargetOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Per-list outcomes, in the order the lists were visited.
#[derive(Debug, Default)]
pub struct PropagationReport {
    pub outcomes: Vec<(String, TargetOutcome)>,
}

impl PropagationReport {
    pub fn outcome(&self, list: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|(l, _)| l == list).map(|(_, o)| o)
    }
}

/// Other lists on `host` where `address` is a member, excluding `origin`.
/// Lists that cannot be read are skipped with a warning.
pub fn other_lists_of_member(
    store: &ListStore,
    origin: &str,
    host: &str,
    address: &str,
) -> Result<Vec<String>> {
    Ok(store
        .lists_on_host(host)?
        .into_iter()
        .filter(|list| list.internal_name() != origin && list.is_member(address))
        .map(|list| list.internal_name().to_string())
        .collect())
}

/// List the caller's other subscriptions. Only the member or the site
/// administrator may ask.
pub fn lists_of_member(
    store: &ListStore,
    origin: &str,
    role: Role,
    address: &str,
) -> Result<Vec<String>> {
    if !role.may_propagate() {
        return Err(ListError::PermissionDenied(
            "the list administrator may not view the other subscriptions for this user",
        ));
    }
    let host = store.load(origin)?.host_name().to_string();
    other_lists_of_member(store, origin, &host, address)
}

/// Apply `change` to every other list on `host` that has `address`.
pub fn propagate_to_other_lists(
    store: &ListStore,
    origin: &str,
    host: &str,
    address: &str,
    change: &GlobalChange,
) -> Result<PropagationReport> {
    let mut report = PropagationReport::default();
    if change.is_empty() {
        return Ok(report);
    }
    for name in other_lists_of_member(store, origin, host, address)? {
        let outcome = store
            .with_list(&name, |list| {
                if !list.is_member(address) {
                    return Ok(TargetOutcome::NoLongerMember);
                }
                let mut refused = Vec::new();
                for &(option, on) in &change.options {
                    if let Err(e) = set_member_option(list, address, option, on) {
                        refused.push((option, e));
                    }
                }
                if let Some(member) = list.member_mut(address) {
                    if let Some(password) = &change.password {
                        member.password = password.clone();
                    }
                    if let Some(name) = &change.name {
                        member.name = name.clone();
                    }
                }
                Ok(if refused.is_empty() {
                    TargetOutcome::Applied
                } else {
                    TargetOutcome::Partial(refused)
                })
            })
            .unwrap_or_else(TargetOutcome::Failed);
        match &outcome {
            TargetOutcome::Applied => info!(list = %name, address, "Change propagated"),
            other => warn!(list = %name, address, outcome = ?other, "Propagation incomplete"),
        }
        report.outcomes.push((name, outcome));
    }
    Ok(report)
}
