//! The mailing list aggregate: configuration, membership and pending requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::address::address_key;
use super::member::{DeliveryMode, Member};
use super::password::PasswordHash;
use super::pending::{PendingKind, PendingRequest};
use crate::bounce::{self, BounceRules};

const DEFAULT_MSG_FOOTER: &str = "_______________________________________________\n\
{real_name} mailing list  -  {real_name}@{host_name}\n";

const DEFAULT_BOUNCE_MATCHING_HEADERS: &str = "\n\
# Lines that *start* with a '#' are comments.\n\
to: friend@public.com\n\
message-id: relay.comanche.denmark.eu\n\
from: list@listme.com\n\
from: .*@uplinkpro.com\n";

/// Configurable list settings, one field per schema descriptor.
///
/// Fields are written only through the schema's setter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    // general
    pub real_name: String,
    pub owner: Vec<String>,
    pub description: String,
    pub info: String,
    pub subject_prefix: String,
    pub welcome_msg: String,
    pub goodbye_msg: String,
    pub reply_goes_to_list: u8,
    pub reply_to_address: String,
    pub administrivia: bool,
    pub send_reminders: bool,
    pub send_welcome_msg: bool,
    pub send_goodbye_msg: bool,
    pub admin_immed_notify: bool,
    pub max_message_size: i64,
    pub host_name: String,
    pub preferred_language: String,
    pub admin_member_chunksize: i64,
    // privacy
    pub advertised: bool,
    pub subscribe_policy: u8,
    pub unsubscribe_policy: bool,
    pub ban_list: Vec<String>,
    pub private_roster: u8,
    pub obscure_addresses: bool,
    pub member_posting_only: bool,
    pub posters: Vec<String>,
    pub moderated: bool,
    pub require_explicit_destination: bool,
    pub acceptable_aliases: String,
    pub max_num_recipients: i64,
    // nondigest
    pub nondigestable: bool,
    pub msg_header: String,
    pub msg_footer: String,
    // digest
    pub digestable: bool,
    pub digest_is_default: u8,
    pub mime_is_default_digest: u8,
    pub digest_size_threshhold: f64,
    pub digest_send_periodic: bool,
    pub digest_header: String,
    pub digest_footer: String,
    // bounce
    pub bounce_processing: bool,
    pub minimum_removal_date: i64,
    pub minimum_post_count_before_bounce_action: i64,
    pub automatic_bounce_action: u8,
    pub max_posts_between_bounces: i64,
    pub bounce_matching_headers: String,
    // archive
    pub archive: bool,
    pub archive_private: u8,
    pub archive_volume_frequency: u8,
    pub scrub_nondigest: bool,
    // gateway
    pub nntp_host: String,
    pub linked_newsgroup: String,
    pub gateway_to_news: bool,
    pub gateway_to_mail: bool,
    // autoreply
    pub autorespond_postings: bool,
    pub autoresponse_postings_text: String,
    pub autorespond_admin: bool,
    pub autoresponse_admin_text: String,
    pub autorespond_requests: u8,
    pub autoresponse_request_text: String,
    pub autoresponse_graceperiod: i64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            real_name: String::new(),
            owner: Vec::new(),
            description: String::new(),
            info: String::new(),
            subject_prefix: String::new(),
            welcome_msg: String::new(),
            goodbye_msg: String::new(),
            reply_goes_to_list: 0,
            reply_to_address: String::new(),
            administrivia: true,
            send_reminders: true,
            send_welcome_msg: true,
            send_goodbye_msg: true,
            admin_immed_notify: true,
            max_message_size: 40, // KB
            host_name: String::new(),
            preferred_language: "en".to_string(),
            admin_member_chunksize: 30,
            advertised: true,
            subscribe_policy: 1,
            unsubscribe_policy: false,
            ban_list: Vec::new(),
            private_roster: 0,
            obscure_addresses: true,
            member_posting_only: false,
            posters: Vec::new(),
            moderated: false,
            require_explicit_destination: true,
            acceptable_aliases: String::new(),
            max_num_recipients: 10,
            nondigestable: true,
            msg_header: String::new(),
            msg_footer: DEFAULT_MSG_FOOTER.to_string(),
            digestable: true,
            digest_is_default: 0,
            mime_is_default_digest: 0,
            digest_size_threshhold: 30.0, // KB
            digest_send_periodic: true,
            digest_header: String::new(),
            digest_footer: DEFAULT_MSG_FOOTER.to_string(),
            bounce_processing: true,
            minimum_removal_date: 5,
            minimum_post_count_before_bounce_action: 3,
            automatic_bounce_action: 1,
            max_posts_between_bounces: 5,
            bounce_matching_headers: DEFAULT_BOUNCE_MATCHING_HEADERS.to_string(),
            archive: true,
            archive_private: 0,
            archive_volume_frequency: 1,
            scrub_nondigest: false,
            nntp_host: String::new(),
            linked_newsgroup: String::new(),
            gateway_to_news: false,
            gateway_to_mail: false,
            autorespond_postings: false,
            autoresponse_postings_text: String::new(),
            autorespond_admin: false,
            autoresponse_admin_text: String::new(),
            autorespond_requests: 0,
            autoresponse_request_text: String::new(),
            autoresponse_graceperiod: 90, // days
        }
    }
}

/// A topic filter: messages matching `pattern` belong to topic `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub pattern: String,
    pub description: String,
    pub empty: bool,
}

/// Consistency problems worth showing to an administrator. Never auto-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanityWarning {
    /// Neither digest nor non-digest delivery is enabled.
    NoDeliveryMode,
    /// There are digest members but digests are off.
    DigestMembersWithoutDigests,
    /// There are regular members but non-digest delivery is off.
    RegularMembersWithoutNondigest,
}

impl std::fmt::Display for SanityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::NoDeliveryMode => {
                "You have turned off delivery of both digest and non-digest messages. \
                 You must turn on either digest or non-digest delivery or your mailing \
                 list will basically be unusable."
            }
            Self::DigestMembersWithoutDigests => {
                "You have digest members, but digests are turned off. \
                 Those people will not receive mail."
            }
            Self::RegularMembersWithoutNondigest => {
                "You have regular list members but non-digestified mail is turned off. \
                 They will receive mail until you fix this problem."
            }
        };
        f.write_str(msg)
    }
}

/// A mailing list, loaded for the duration of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailingList {
    internal_name: String,
    pub config: ListConfig,
    pub admin_password: PasswordHash,
    /// Members keyed by lower-cased address.
    #[serde(default)]
    members: BTreeMap<String, Member>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub pending: Vec<PendingRequest>,
    /// Language codes members may pick.
    #[serde(default)]
    pub available_languages: Vec<String>,
    /// Last news article gated to mail. `None` means "catch up on next run".
    #[serde(default)]
    pub usenet_watermark: Option<u64>,
}

impl MailingList {
    pub fn new(internal_name: &str, host_name: &str, admin_password: PasswordHash) -> Self {
        let internal_name = internal_name.trim().to_lowercase();
        let real_name = capitalize(&internal_name);
        let config = ListConfig {
            subject_prefix: format!("[{real_name}] "),
            real_name,
            host_name: host_name.to_string(),
            ..ListConfig::default()
        };
        let available_languages = vec![config.preferred_language.clone()];
        Self {
            internal_name,
            config,
            admin_password,
            members: BTreeMap::new(),
            topics: Vec::new(),
            pending: Vec::new(),
            available_languages,
            usenet_watermark: None,
        }
    }

    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn host_name(&self) -> &str {
        &self.config.host_name
    }

    // ── Membership ──────────────────────────────────────────────

    pub fn is_member(&self, addr: &str) -> bool {
        self.members.contains_key(&address_key(addr))
    }

    pub fn member(&self, addr: &str) -> Option<&Member> {
        self.members.get(&address_key(addr))
    }

    pub fn member_mut(&mut self, addr: &str) -> Option<&mut Member> {
        self.members.get_mut(&address_key(addr))
    }

    /// Insert a member. Returns the member back if the address is taken.
    pub fn add_member(&mut self, member: Member) -> Result<(), Member> {
        let key = member.key();
        if self.members.contains_key(&key) {
            return Err(member);
        }
        self.members.insert(key, member);
        Ok(())
    }

    pub fn remove_member(&mut self, addr: &str) -> Option<Member> {
        self.members.remove(&address_key(addr))
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn regular_members(&self) -> impl Iterator<Item = &Member> {
        self.members
            .values()
            .filter(|m| m.mode == DeliveryMode::Regular)
    }

    pub fn digest_members(&self) -> impl Iterator<Item = &Member> {
        self.members.values().filter(|m| m.mode == DeliveryMode::Digest)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Case-preserved address the member subscribed with.
    pub fn member_cp_address(&self, addr: &str) -> Option<&str> {
        self.member(addr).map(|m| m.address.as_str())
    }

    /// Whether `addr` matches the ban list. Entries starting with `^` are
    /// regular expressions; others compare case-insensitively.
    pub fn is_banned(&self, addr: &str) -> bool {
        let key = address_key(addr);
        self.config.ban_list.iter().any(|entry| {
            if entry.starts_with('^') {
                regex::RegexBuilder::new(entry)
                    .case_insensitive(true)
                    .build()
                    .map(|re| re.is_match(&key))
                    .unwrap_or(false)
            } else {
                address_key(entry) == key
            }
        })
    }

    // ── Derived state ───────────────────────────────────────────

    /// Language codes members may select; falls back to the preferred language.
    pub fn language_codes(&self) -> Vec<String> {
        if self.available_languages.is_empty() {
            vec![self.config.preferred_language.clone()]
        } else {
            self.available_languages.clone()
        }
    }

    /// The topic filter called `name`, if the list defines one.
    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    /// Parse the bounce matching rules from the stored text.
    pub fn bounce_rules(&self) -> BounceRules {
        bounce::parse_rules(&self.config.bounce_matching_headers)
    }

    pub fn sanity_warnings(&self) -> Vec<SanityWarning> {
        let mut warnings = Vec::new();
        if !self.config.digestable && !self.config.nondigestable {
            warnings.push(SanityWarning::NoDeliveryMode);
        }
        if !self.config.digestable && self.digest_members().next().is_some() {
            warnings.push(SanityWarning::DigestMembersWithoutDigests);
        }
        if !self.config.nondigestable && self.regular_members().next().is_some() {
            warnings.push(SanityWarning::RegularMembersWithoutNondigest);
        }
        warnings
    }

    /// Record a pending request and return its cookie.
    pub fn add_pending(&mut self, kind: PendingKind) -> String {
        let request = PendingRequest::new(&self.internal_name, kind);
        let cookie = request.cookie.clone();
        self.pending.push(request);
        cookie
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::member::DeliveryMode;

    fn list() -> MailingList {
        MailingList::new("Dev-Team", "example.com", PasswordHash::new("admin"))
    }

    fn member(addr: &str) -> Member {
        Member::new(addr, PasswordHash::new("pw"), "en")
    }

    #[test]
    fn test_new_list_defaults() {
        let l = list();
        assert_eq!(l.internal_name(), "dev-team");
        assert_eq!(l.config.real_name, "Dev-team");
        assert_eq!(l.config.subject_prefix, "[Dev-team] ");
        assert!(l.config.digestable && l.config.nondigestable);
        assert!(l.sanity_warnings().is_empty());
    }

    #[test]
    fn test_membership_is_case_insensitive() {
        let mut l = list();
        assert!(l.add_member(member("Ann@Example.com")).is_ok());
        assert!(l.is_member("ann@example.COM"));
        assert_eq!(l.member_cp_address("ANN@example.com"), Some("Ann@Example.com"));
        assert!(l.add_member(member("ann@example.com")).is_err());
        assert_eq!(l.member_count(), 1);
    }

    #[test]
    fn test_sanity_warnings() {
        let mut l = list();
        let mut d = member("d@example.com");
        d.mode = DeliveryMode::Digest;
        l.add_member(d).unwrap();
        l.add_member(member("r@example.com")).unwrap();
        l.config.digestable = false;
        l.config.nondigestable = false;
        let w = l.sanity_warnings();
        assert_eq!(
            w,
            vec![
                SanityWarning::NoDeliveryMode,
                SanityWarning::DigestMembersWithoutDigests,
                SanityWarning::RegularMembersWithoutNondigest,
            ]
        );
    }

    #[test]
    fn test_ban_list_exact_and_pattern() {
        let mut l = list();
        l.config.ban_list = vec!["Spam@Example.com".to_string(), "^.*@evil\\.org$".to_string()];
        assert!(l.is_banned("spam@example.com"));
        assert!(l.is_banned("anyone@EVIL.org"));
        assert!(!l.is_banned("friend@example.com"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut l = list();
        l.add_member(member("a@example.com")).unwrap();
        let json = serde_json::to_string(&l).expect("serialize");
        let back: MailingList = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, l);
    }
}
