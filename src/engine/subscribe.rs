//! Mass subscription by an administrator.

use tracing::{debug, info};

use crate::config::SiteConfig;
use crate::error::AddressError;
use crate::model::address::{validate_email, EmailAddress};
use crate::model::list::MailingList;
use crate::model::member::{DeliveryMode, Member, MemberFlags};
use crate::model::password::{random_password, PasswordHash};

/// Result for one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Accepted,
    AlreadyMember,
    /// Syntactically bad, including a blank line.
    InvalidAddress,
    /// Contains characters usable for header injection and similar abuse.
    HostileAddress,
    Banned,
}

impl SubscribeOutcome {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Accepted => "Successfully subscribed",
            Self::AlreadyMember => "Already a member",
            Self::InvalidAddress => "Bad/Invalid email address",
            Self::HostileAddress => "Hostile address (illegal characters)",
            Self::Banned => "Banned address",
        }
    }
}

/// One outcome per input line, in input order.
#[derive(Debug, Default)]
pub struct SubscribeReport {
    pub outcomes: Vec<(String, SubscribeOutcome)>,
    /// Accepted addresses that should get a welcome message.
    pub welcome_recipients: Vec<String>,
}

impl SubscribeReport {
    pub fn accepted(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == SubscribeOutcome::Accepted)
            .map(|(a, _)| a.as_str())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, SubscribeOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o != SubscribeOutcome::Accepted)
            .map(|(a, o)| (a.as_str(), *o))
    }
}

/// Split pasted batch text into lines: carriage returns removed, lines
/// trimmed, blank lines dropped.
pub fn parse_batch_text(text: &str) -> Vec<String> {
    text.replace('\r', "")
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Subscribe every line of `lines` independently.
///
/// The requested delivery mode yields to list capability: without digests
/// everyone is regular, without regular delivery everyone gets digests.
pub fn batch_subscribe<S: AsRef<str>>(
    list: &mut MailingList,
    lines: &[S],
    digest: bool,
    send_welcome: bool,
    site: &SiteConfig,
) -> SubscribeReport {
    let mut digest = digest;
    if !list.config.digestable {
        digest = false;
    }
    if !list.config.nondigestable {
        digest = true;
    }
    let mode = if digest { DeliveryMode::Digest } else { DeliveryMode::Regular };

    let mut report = SubscribeReport::default();
    for line in lines {
        let line = line.as_ref();
        let parsed = EmailAddress::parse(line);
        let outcome = subscribe_one(list, &parsed, mode, site);
        debug!(list = %list.internal_name(), line, outcome = ?outcome, "Batch subscribe");
        if outcome == SubscribeOutcome::Accepted && send_welcome {
            report.welcome_recipients.push(parsed.address.clone());
        }
        report.outcomes.push((line.to_string(), outcome));
    }
    info!(
        list = %list.internal_name(),
        accepted = report.accepted().count(),
        failed = report.failures().count(),
        "Batch subscription done"
    );
    report
}

fn subscribe_one(
    list: &mut MailingList,
    parsed: &EmailAddress,
    mode: DeliveryMode,
    site: &SiteConfig,
) -> SubscribeOutcome {
    match validate_email(&parsed.address) {
        Err(AddressError::Bad(_)) => return SubscribeOutcome::InvalidAddress,
        Err(AddressError::Hostile(_)) => return SubscribeOutcome::HostileAddress,
        Ok(()) => {}
    }
    if list.is_banned(&parsed.address) {
        return SubscribeOutcome::Banned;
    }
    if list.is_member(&parsed.address) {
        return SubscribeOutcome::AlreadyMember;
    }
    let mut member = Member::new(
        &parsed.address,
        PasswordHash::new(&random_password()),
        &list.config.preferred_language,
    );
    member.mode = mode;
    member.flags = MemberFlags::from_bits_truncate(site.default_member_flags);
    if !parsed.display_name.is_empty() {
        member.name = Some(parsed.display_name.clone());
    }
    match list.add_member(member) {
        Ok(()) => SubscribeOutcome::Accepted,
        Err(_) => SubscribeOutcome::AlreadyMember,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> MailingList {
        MailingList::new("dev", "example.com", PasswordHash::new("admin"))
    }

    #[test]
    fn test_duplicates_and_blank_are_independent() {
        let mut l = list();
        let report = batch_subscribe(&mut l, &["a@x.com", "", "a@x.com"], false, false, &SiteConfig::default());
        let outcomes: Vec<SubscribeOutcome> = report.outcomes.iter().map(|(_, o)| *o).collect();
        assert_eq!(
            outcomes,
            vec![
                SubscribeOutcome::Accepted,
                SubscribeOutcome::InvalidAddress,
                SubscribeOutcome::AlreadyMember,
            ]
        );
        assert_eq!(l.member_count(), 1);
    }

    #[test]
    fn test_hostile_and_banned() {
        let mut l = list();
        l.config.ban_list = vec!["^.*@spam\\.org$".into()];
        let report = batch_subscribe(
            &mut l,
            &["bob@spam.org", "x;rm@example.com", "Ann Lee <ann@example.com>"],
            false,
            true,
            &SiteConfig::default(),
        );
        let outcomes: Vec<_> = report.outcomes.iter().map(|(_, o)| *o).collect();
        assert_eq!(
            outcomes,
            vec![
                SubscribeOutcome::Banned,
                SubscribeOutcome::HostileAddress,
                SubscribeOutcome::Accepted,
            ]
        );
        assert_eq!(report.welcome_recipients, vec!["ann@example.com"]);
        assert_eq!(l.member("ann@example.com").unwrap().name.as_deref(), Some("Ann Lee"));
    }

    #[test]
    fn test_digest_default_forced_by_capability() {
        let mut l = list();
        l.config.nondigestable = false;
        batch_subscribe(&mut l, &["a@example.com"], false, false, &SiteConfig::default());
        assert!(l.member("a@example.com").unwrap().is_digest());

        let mut l = list();
        l.config.digestable = false;
        batch_subscribe(&mut l, &["a@example.com"], true, false, &SiteConfig::default());
        assert!(!l.member("a@example.com").unwrap().is_digest());
    }

    #[test]
    fn test_new_members_get_site_defaults() {
        let mut l = list();
        let site = SiteConfig {
            default_member_flags: 256,
            ..SiteConfig::default()
        };
        batch_subscribe(&mut l, &["a@example.com"], false, false, &site);
        let m = l.member("a@example.com").unwrap();
        assert_eq!(m.flags.bits(), 256);
        assert_eq!(m.language, "en");
    }

    #[test]
    fn test_parse_batch_text() {
        assert_eq!(
            parse_batch_text("a@x.com\r\n\r\n  b@x.com \n"),
            vec!["a@x.com", "b@x.com"]
        );
    }
}
