//! Member option changes, one flag at a time or as an options-page batch.

use tracing::{debug, info};

use super::propagate::{self, GlobalChange, PropagationReport};
use super::{propagation_denied, Role};
use crate::error::{ListError, MemberError, Result};
use crate::form::FormData;
use crate::model::list::MailingList;
use crate::model::member::{DeliveryMode, DeliveryStatus, MemberOption};
use crate::store::ListStore;

/// Set one option for `address`. Returns whether anything changed.
///
/// Digest capability is checked against the list: turning digests on needs
/// `digestable`, turning them off needs `nondigestable`. Disabling delivery
/// that is already disabled (for any reason) is a no-op, so a site-imposed
/// disable is never relabelled as the member's own.
pub fn set_member_option(
    list: &mut MailingList,
    address: &str,
    option: MemberOption,
    on: bool,
) -> std::result::Result<bool, MemberError> {
    let digestable = list.config.digestable;
    let nondigestable = list.config.nondigestable;
    let member = list.member_mut(address).ok_or(MemberError::NotAMember)?;

    let changed = match option {
        MemberOption::Digest => {
            let mode = if on { DeliveryMode::Digest } else { DeliveryMode::Regular };
            if member.mode == mode {
                false
            } else if on && !digestable {
                return Err(MemberError::CantDigest);
            } else if !on && !nondigestable {
                return Err(MemberError::MustDigest);
            } else {
                member.mode = mode;
                true
            }
        }
        MemberOption::DisableDelivery => match (on, member.status) {
            (true, DeliveryStatus::Enabled) => {
                member.status = DeliveryStatus::ByUser;
                true
            }
            (false, status) if !status.is_enabled() => {
                member.status = DeliveryStatus::Enabled;
                true
            }
            _ => false,
        },
        other => match other.flag() {
            Some(flag) if member.flags.contains(flag) != on => {
                member.flags.set(flag, on);
                true
            }
            _ => false,
        },
    };
    if changed {
        debug!(list = %list.internal_name(), address, option = ?option, on, "Member option set");
    }
    Ok(changed)
}

/// Form fields that ask for an option to be applied to every subscription.
const GLOBAL_FIELDS: [(&str, MemberOption); 4] = [
    ("deliver-globally", MemberOption::DisableDelivery),
    ("remind-globally", MemberOption::SuppressPasswordReminder),
    ("nodupes-globally", MemberOption::DontReceiveDuplicates),
    ("mime-globally", MemberOption::DisableMime),
];

/// A parsed options-page submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsSubmission {
    /// Options that were submitted with a parseable value, in page order.
    pub options: Vec<(MemberOption, bool)>,
    pub language: Option<String>,
    /// The full new topic selection.
    pub topics: Vec<String>,
    /// Options the member wants applied to their other subscriptions too.
    pub globally: Vec<MemberOption>,
}

impl OptionsSubmission {
    /// Read option values from the form. Fields that are missing or not
    /// integers are skipped.
    pub fn from_form(form: &FormData) -> Self {
        let options = MemberOption::ALL
            .into_iter()
            .filter_map(|opt| form.get_int(opt.form_name()).map(|v| (opt, v != 0)))
            .collect();
        let globally = GLOBAL_FIELDS
            .into_iter()
            .filter(|(field, _)| form.flag(field))
            .map(|(_, opt)| opt)
            .collect();
        Self {
            options,
            language: form.get_nonblank("language").map(str::to_string),
            topics: form.get_all("usertopic").to_vec(),
            globally,
        }
    }
}

/// Outcome of an options-page submission.
#[derive(Debug, Default)]
pub struct OptionsReport {
    pub changed: Vec<MemberOption>,
    pub cant_digest: bool,
    pub must_digest: bool,
    /// Switching from digest to regular delivery; one last digest may follow.
    pub digest_warning: bool,
    /// Language now in effect for the member.
    pub language: String,
    pub notes: Vec<String>,
    pub propagation: Option<PropagationReport>,
}

impl OptionsReport {
    /// The summary line shown to the member.
    pub fn message(&self) -> String {
        let mut msg = if self.cant_digest {
            "The list administrator has disabled digest delivery for this list, so your \
             delivery option has not been set. However your other options have been set \
             successfully."
                .to_string()
        } else if self.must_digest {
            "The list administrator has disabled non-digest delivery for this list, so your \
             delivery option has not been set. However your other options have been set \
             successfully."
                .to_string()
        } else {
            "You have successfully set your options.".to_string()
        };
        if self.digest_warning {
            msg.push_str(" You may get one last digest.");
        }
        msg
    }
}

/// Apply a submission to one list. Capability failures are recorded and the
/// remaining options still apply.
pub fn apply_options(
    list: &mut MailingList,
    address: &str,
    submission: &OptionsSubmission,
) -> Result<OptionsReport> {
    let Some(member) = list.member(address) else {
        return Err(ListError::NoSuchMember(address.to_string()));
    };
    let was_digest = member.is_digest();
    let mut report = OptionsReport::default();

    for &(option, on) in &submission.options {
        match set_member_option(list, address, option, on) {
            Ok(true) => {
                if option == MemberOption::Digest && !on && was_digest {
                    report.digest_warning = true;
                }
                report.changed.push(option);
            }
            Ok(false) => {}
            Err(MemberError::CantDigest) => report.cant_digest = true,
            Err(MemberError::MustDigest) => report.must_digest = true,
            Err(MemberError::NotAMember) => {
                return Err(ListError::NoSuchMember(address.to_string()))
            }
        }
    }

    let codes = list.language_codes();
    let stored = list.member(address).map(|m| m.language.clone()).unwrap_or_default();
    let language = match &submission.language {
        Some(lang) if codes.contains(lang) => lang.clone(),
        _ if codes.contains(&stored) => stored,
        _ => list.config.preferred_language.clone(),
    };
    let topics: Vec<String> = submission
        .topics
        .iter()
        .filter(|t| list.topic(t).is_some())
        .cloned()
        .collect();
    if let Some(member) = list.member_mut(address) {
        member.language = language.clone();
        member.topics = topics;
    }
    report.language = language;
    Ok(report)
}

/// Handle an options-page submission: apply it to `list_name`, then, if
/// asked and allowed, push the global options to the member's other lists.
pub fn submit_member_options(
    store: &ListStore,
    list_name: &str,
    role: Role,
    address: &str,
    form: &FormData,
) -> Result<OptionsReport> {
    let submission = OptionsSubmission::from_form(form);
    let (mut report, host) = store.with_list(list_name, |list| {
        let report = apply_options(list, address, &submission)?;
        Ok((report, list.host_name().to_string()))
    })?;
    info!(list = list_name, address, changed = report.changed.len(), "Member options updated");

    let change = GlobalChange {
        options: submission
            .options
            .iter()
            .filter(|(opt, _)| submission.globally.contains(opt))
            .copied()
            .collect(),
        ..GlobalChange::default()
    };
    if change.is_empty() {
        return Ok(report);
    }
    if role.may_propagate() {
        report.propagation = Some(propagate::propagate_to_other_lists(
            store, list_name, &host, address, &change,
        )?);
    } else {
        report.notes.push(propagation_denied("options"));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::list::Topic;
    use crate::model::member::Member;
    use crate::model::password::PasswordHash;

    fn topic(name: &str) -> Topic {
        Topic {
            name: name.into(),
            pattern: name.into(),
            description: String::new(),
            empty: false,
        }
    }

    fn list_with(addr: &str) -> MailingList {
        let mut list = MailingList::new("dev", "example.com", PasswordHash::new("admin"));
        list.add_member(Member::new(addr, PasswordHash::new("pw"), "en"))
            .unwrap();
        list
    }

    #[test]
    fn test_cant_digest_leaves_mode_alone() {
        let mut list = list_with("a@example.com");
        list.config.digestable = false;
        let err = set_member_option(&mut list, "a@example.com", MemberOption::Digest, true);
        assert_eq!(err, Err(MemberError::CantDigest));
        assert!(!list.member("a@example.com").unwrap().is_digest());
    }

    #[test]
    fn test_must_digest_leaves_mode_alone() {
        let mut list = list_with("a@example.com");
        list.member_mut("a@example.com").unwrap().mode = DeliveryMode::Digest;
        list.config.nondigestable = false;
        let err = set_member_option(&mut list, "a@example.com", MemberOption::Digest, false);
        assert_eq!(err, Err(MemberError::MustDigest));
        assert!(list.member("a@example.com").unwrap().is_digest());
    }

    #[test]
    fn test_not_a_member() {
        let mut list = list_with("a@example.com");
        let err = set_member_option(&mut list, "b@example.com", MemberOption::AcknowledgePosts, true);
        assert_eq!(err, Err(MemberError::NotAMember));
    }

    #[test]
    fn test_delivery_causes_stay_distinct() {
        let mut list = list_with("a@example.com");
        let addr = "a@example.com";
        assert_eq!(set_member_option(&mut list, addr, MemberOption::DisableDelivery, true), Ok(true));
        assert_eq!(list.member(addr).unwrap().status, DeliveryStatus::ByUser);

        list.member_mut(addr).unwrap().status = DeliveryStatus::ByBounce;
        assert_eq!(set_member_option(&mut list, addr, MemberOption::DisableDelivery, true), Ok(false));
        assert_eq!(list.member(addr).unwrap().status, DeliveryStatus::ByBounce);

        assert_eq!(set_member_option(&mut list, addr, MemberOption::DisableDelivery, false), Ok(true));
        assert_eq!(list.member(addr).unwrap().status, DeliveryStatus::Enabled);
    }

    #[test]
    fn test_batch_continues_after_capability_failure() {
        let mut list = list_with("a@example.com");
        list.config.digestable = false;
        list.available_languages = vec!["en".into(), "de".into()];
        list.topics = vec![topic("rust")];
        let form = FormData::new()
            .with("digest", "1")
            .with("ackposts", "1")
            .with("conceal", "junk")
            .with("language", "de")
            .with("usertopic", "rust");
        let report = apply_options(&mut list, "a@example.com", &OptionsSubmission::from_form(&form)).unwrap();
        assert!(report.cant_digest);
        assert_eq!(report.changed, vec![MemberOption::AcknowledgePosts]);
        let m = list.member("a@example.com").unwrap();
        assert!(m.option(MemberOption::AcknowledgePosts));
        assert!(!m.option(MemberOption::ConcealSubscription));
        assert_eq!(m.language, "de");
        assert_eq!(m.topics, vec!["rust"]);
        assert!(report.message().contains("disabled digest delivery"));
    }

    #[test]
    fn test_unknown_language_falls_back_and_topics_reset() {
        let mut list = list_with("a@example.com");
        list.member_mut("a@example.com").unwrap().topics = vec!["old".into()];
        list.member_mut("a@example.com").unwrap().language = "fr".into();
        let form = FormData::new().with("language", "xx");
        let report = apply_options(&mut list, "a@example.com", &OptionsSubmission::from_form(&form)).unwrap();
        assert_eq!(report.language, "en");
        assert!(list.member("a@example.com").unwrap().topics.is_empty());
    }

    #[test]
    fn test_missing_language_keeps_stored_preference() {
        let mut list = list_with("a@example.com");
        list.available_languages = vec!["en".into(), "de".into()];
        list.member_mut("a@example.com").unwrap().language = "de".into();

        let form = FormData::new().with("ackposts", "1");
        let report = apply_options(&mut list, "a@example.com", &OptionsSubmission::from_form(&form)).unwrap();
        assert_eq!(report.language, "de");
        assert_eq!(list.member("a@example.com").unwrap().language, "de");

        let form = FormData::new().with("language", "xx");
        let report = apply_options(&mut list, "a@example.com", &OptionsSubmission::from_form(&form)).unwrap();
        assert_eq!(report.language, "de");
    }

    #[test]
    fn test_topic_selection_limited_to_defined_topics() {
        let mut list = list_with("a@example.com");
        list.topics = vec![topic("rust")];
        let form = FormData::new().with("usertopic", "rust").with("usertopic", "gone");
        apply_options(&mut list, "a@example.com", &OptionsSubmission::from_form(&form)).unwrap();
        assert_eq!(list.member("a@example.com").unwrap().topics, vec!["rust"]);
    }

    #[test]
    fn test_digest_warning() {
        let mut list = list_with("a@example.com");
        list.member_mut("a@example.com").unwrap().mode = DeliveryMode::Digest;
        let form = FormData::new().with("digest", "0");
        let report = apply_options(&mut list, "a@example.com", &OptionsSubmission::from_form(&form)).unwrap();
        assert!(report.digest_warning);
        assert!(report.message().ends_with("You may get one last digest."));
    }

    #[test]
    fn test_global_flags_parsed() {
        let form = FormData::new()
            .with("remind", "1")
            .with("remind-globally", "1")
            .with("mime-globally", "0");
        let sub = OptionsSubmission::from_form(&form);
        assert_eq!(sub.globally, vec![MemberOption::SuppressPasswordReminder]);
        assert_eq!(sub.options, vec![(MemberOption::SuppressPasswordReminder, true)]);
    }
}
