//! Leaving a list, from the login screen or from the options page.

use tracing::{info, warn};

use super::{Role, MISCHIEF_TARGET};
use crate::error::{ListError, Result};
use crate::model::pending::PendingKind;
use crate::store::ListStore;

/// What an unsubscription request turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// The member was removed.
    Removed,
    /// Waiting for a moderator.
    HeldForApproval { cookie: String },
    /// A confirmation mail goes out. `cookie` is `None` when nothing was
    /// registered because the address is not a member of a private roster.
    ConfirmationSent { cookie: Option<String> },
}

impl UnsubscribeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Removed => "You have been successfully unsubscribed from the mailing list.",
            Self::HeldForApproval { .. } => {
                "Your unsubscription request has been forwarded to the list administrator for approval."
            }
            Self::ConfirmationSent { .. } => "The confirmation email has been sent.",
        }
    }
}

/// Unsubscribe without a password: the request is confirmed by mail, or held
/// for a moderator when the list requires approval.
///
/// On a private roster a non-member gets the same answer as a member, so the
/// response does not reveal who is subscribed.
pub fn login_unsubscribe(
    store: &ListStore,
    list_name: &str,
    address: &str,
    language: &str,
) -> Result<UnsubscribeOutcome> {
    let snapshot = store.load(list_name)?;
    if !snapshot.is_member(address) {
        if snapshot.config.private_roster == 0 {
            return Err(ListError::NoSuchMember(address.to_string()));
        }
        warn!(target: MISCHIEF_TARGET, list = list_name, address, "Unsub attempt of non-member w/ private rosters");
        return Ok(UnsubscribeOutcome::ConfirmationSent { cookie: None });
    }

    store.with_list(list_name, |list| {
        let Some(member) = list.member(address) else {
            return Err(ListError::NoSuchMember(address.to_string()));
        };
        let cp_address = member.address.clone();
        let outcome = if list.config.unsubscribe_policy {
            let cookie = list.add_pending(PendingKind::UnsubscriptionApproval { address: cp_address });
            UnsubscribeOutcome::HeldForApproval { cookie }
        } else {
            let cookie = list.add_pending(PendingKind::UnsubscriptionConfirmation {
                address: cp_address,
                language: language.to_string(),
            });
            UnsubscribeOutcome::ConfirmationSent { cookie: Some(cookie) }
        };
        info!(list = list_name, address, outcome = ?outcome, "Unsubscription requested");
        Ok(outcome)
    })
}

/// Unsubscribe an authenticated member. `confirmed` is the explicit
/// confirmation checkbox; without it nothing happens.
pub fn unsubscribe_member(
    store: &ListStore,
    list_name: &str,
    role: Role,
    address: &str,
    confirmed: bool,
) -> Result<UnsubscribeOutcome> {
    if !confirmed {
        return Err(ListError::InvalidRequest(
            "You must confirm your unsubscription request by turning on the checkbox below \
             the Unsubscribe button. You have not been unsubscribed!"
                .to_string(),
        ));
    }
    store.with_list(list_name, |list| {
        let Some(member) = list.member(address) else {
            return Err(ListError::NoSuchMember(address.to_string()));
        };
        let cp_address = member.address.clone();
        if list.config.unsubscribe_policy && !role.is_admin() {
            let cookie = list.add_pending(PendingKind::UnsubscriptionApproval { address: cp_address });
            info!(list = list_name, address, "Unsubscription held for approval");
            return Ok(UnsubscribeOutcome::HeldForApproval { cookie });
        }
        list.remove_member(address);
        info!(list = list_name, address, role = %role, "Member unsubscribed");
        Ok(UnsubscribeOutcome::Removed)
    })
}
