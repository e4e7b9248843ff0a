//! Member-requested changes of address and full name.
//!
//! An address change is never applied directly: it is recorded as a pending
//! request and confirmed out of band. A name change applies at once.

use tracing::{info, warn};

use super::propagate::{self, GlobalChange, PropagationReport};
use super::{propagation_denied, Role};
use crate::error::{AddressChangeError, ListError, Result};
use crate::model::address::validate_email;
use crate::model::list::MailingList;
use crate::model::pending::PendingKind;
use crate::store::ListStore;

/// The change-of-address form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressChangeRequest {
    pub new_address: String,
    pub confirm_address: String,
    /// Submitted full name. A missing field reads as empty, which clears the
    /// stored name.
    pub name: String,
    pub globally: bool,
}

/// Outcome of a change-of-address submission.
#[derive(Debug, Default)]
pub struct AddressChangeReport {
    /// `Ok(addr)`: a confirmation was sent to `addr`. `Err`: why not.
    /// `None` when no address change was asked for.
    pub address: Option<std::result::Result<String, AddressChangeError>>,
    /// Cookie of the pending request, when one was registered.
    pub cookie: Option<String>,
    pub name_changed: bool,
    pub notes: Vec<String>,
    pub propagation: Option<PropagationReport>,
}

/// Apply a request to one list. Returns the report and, for a global name
/// change, what remains to be propagated.
pub fn apply_address_change(
    list: &mut MailingList,
    role: Role,
    address: &str,
    request: &AddressChangeRequest,
) -> Result<(AddressChangeReport, Option<GlobalChange>)> {
    let Some(member) = list.member(address) else {
        return Err(ListError::NoSuchMember(address.to_string()));
    };
    let current_address = member.address.clone();
    let current_name = member.name.clone();
    let mut report = AddressChangeReport::default();

    let mut globally = request.globally;
    if globally && !role.may_propagate() {
        report.notes.push(propagation_denied("names or addresses"));
        globally = false;
    }

    // Unset and empty are the same name.
    let trimmed = request.name.trim();
    let new_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
    let set_name = new_name != current_name;

    let new_address = request.new_address.trim();
    let confirm = request.confirm_address.trim();
    let mut set_address = false;
    if !new_address.is_empty() && !confirm.is_empty() {
        let early = if new_address != confirm {
            Some(AddressChangeError::Mismatch)
        } else if new_address == current_address {
            Some(AddressChangeError::SameAddress)
        } else if list.is_member(new_address) && !globally {
            Some(AddressChangeError::AlreadyMember(new_address.to_string()))
        } else {
            None
        };
        if let Some(e) = early {
            report.address = Some(Err(e));
            return Ok((report, None));
        }
        if list.is_member(new_address) {
            report.notes.push(format!(
                "The new address you requested {new_address} is already a member of the {} \
                 mailing list, however you have also requested a global change of address. \
                 Upon confirmation, any other mailing list containing the address {current_address} \
                 will be changed.",
                list.config.real_name
            ));
        }
        set_address = true;
    } else if (!new_address.is_empty() || !confirm.is_empty()) && !set_name {
        report.address = Some(Err(AddressChangeError::Blank));
        return Ok((report, None));
    }

    if set_address {
        let registered = if validate_email(new_address).is_err() {
            Err(AddressChangeError::InvalidAddress(new_address.to_string()))
        } else if list.is_banned(new_address) {
            Err(AddressChangeError::Banned(new_address.to_string()))
        } else {
            let cookie = list.add_pending(PendingKind::AddressChange {
                old_address: current_address.clone(),
                new_address: new_address.to_string(),
                globally,
            });
            report.cookie = Some(cookie);
            info!(list = %list.internal_name(), old = %current_address, new = new_address, globally, "Address change pending");
            Ok(new_address.to_string())
        };
        if let Err(e) = &registered {
            warn!(list = %list.internal_name(), address, error = %e, "Address change refused");
        }
        report.address = Some(registered);
    }

    let mut global = None;
    if set_name {
        let name = new_name;
        if let Some(member) = list.member_mut(address) {
            member.name = name.clone();
        }
        report.name_changed = true;
        info!(list = %list.internal_name(), address, "Member name changed");
        if globally {
            global = Some(GlobalChange {
                name: Some(name),
                ..GlobalChange::default()
            });
        }
    }
    Ok((report, global))
}

/// Handle a change-of-address submission for `address` on `list_name`.
pub fn request_address_change(
    store: &ListStore,
    list_name: &str,
    role: Role,
    address: &str,
    request: &AddressChangeRequest,
) -> Result<AddressChangeReport> {
    let ((mut report, global), host) = store.with_list(list_name, |list| {
        let out = apply_address_change(list, role, address, request)?;
        Ok((out, list.host_name().to_string()))
    })?;
    if let Some(change) = global {
        report.propagation = Some(propagate::propagate_to_other_lists(
            store, list_name, &host, address, &change,
        )?);
    }
    Ok(report)
}
