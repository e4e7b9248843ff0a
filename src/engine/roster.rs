//! The administrator's membership table.

use tracing::info;

use super::member_options::set_member_option;
use crate::error::MemberError;
use crate::form::FormData;
use crate::model::list::MailingList;
use crate::model::member::{DeliveryStatus, MemberOption};

/// Repeated field naming each row of the table.
pub const USER_FIELD: &str = "user";

/// Per-row checkboxes, `<address>_<suffix>`, and the option each controls.
const ROW_FLAGS: [(&str, MemberOption); 4] = [
    ("hide", MemberOption::ConcealSubscription),
    ("ack", MemberOption::AcknowledgePosts),
    ("notmetoo", MemberOption::DontReceiveOwnPosts),
    ("plain", MemberOption::DisableMime),
];

/// Outcome of a roster submission.
#[derive(Debug, Default)]
pub struct RosterReport {
    pub removed: Vec<String>,
    /// Rows whose update was partly or wholly refused.
    pub errors: Vec<(String, MemberError)>,
}

/// Apply the submitted table. A row without `<address>_subscribed` removes
/// the member; otherwise the row's checkboxes set the member's options.
pub fn update_roster(list: &mut MailingList, form: &FormData) -> RosterReport {
    let mut report = RosterReport::default();
    for user in form.get_all(USER_FIELD) {
        let row = |suffix: &str| form.has(&format!("{user}_{suffix}"));

        if !row("subscribed") {
            match list.remove_member(user) {
                Some(m) => report.removed.push(m.address),
                None => report.errors.push((user.clone(), MemberError::NotAMember)),
            }
            continue;
        }
        if let Err(e) = set_member_option(list, user, MemberOption::Digest, row("digest")) {
            report.errors.push((user.clone(), e));
            if e == MemberError::NotAMember {
                continue;
            }
        }
        for (suffix, option) in ROW_FLAGS {
            if let Err(e) = set_member_option(list, user, option, row(suffix)) {
                report.errors.push((user.clone(), e));
            }
        }
        if let Some(member) = list.member_mut(user) {
            match (row("nomail"), member.status) {
                (true, DeliveryStatus::Enabled) => member.status = DeliveryStatus::ByAdmin,
                (false, status) if !status.is_enabled() => member.status = DeliveryStatus::Enabled,
                _ => {}
            }
        }
    }
    if !report.removed.is_empty() {
        info!(list = %list.internal_name(), removed = ?report.removed, "Members removed by administrator");
    }
    report
}

/// Re-enable delivery for members disabled by an administrator or by bounce
/// processing. Members who disabled delivery themselves are left alone.
pub fn reenable_site_disabled(list: &mut MailingList) -> Vec<String> {
    let targets: Vec<String> = list
        .members()
        .filter(|m| m.status.is_site_disabled())
        .map(|m| m.address.clone())
        .collect();
    for addr in &targets {
        if let Some(member) = list.member_mut(addr) {
            member.status = DeliveryStatus::Enabled;
        }
    }
    if !targets.is_empty() {
        info!(list = %list.internal_name(), count = targets.len(), "Re-enabled site-disabled members");
    }
    targets
}
