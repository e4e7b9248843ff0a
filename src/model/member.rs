//! Per-subscription member state.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::address::address_key;
use super::password::PasswordHash;

/// Member option flags, stored as a bitfield.
///
/// `Digest` and `DisableDelivery` are listed for completeness but are never
/// stored as bits: delivery mode and delivery status have their own fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberOption {
    Digest,
    DisableDelivery,
    DontReceiveOwnPosts,
    AcknowledgePosts,
    DisableMime,
    ConcealSubscription,
    SuppressPasswordReminder,
    ReceiveNonmatchingTopics,
    DontReceiveDuplicates,
}

impl MemberOption {
    /// Flag used in [`MemberFlags`], or `None` for options with dedicated state.
    pub fn flag(self) -> Option<MemberFlags> {
        match self {
            Self::Digest | Self::DisableDelivery => None,
            Self::DontReceiveOwnPosts => Some(MemberFlags::DONT_RECEIVE_OWN_POSTS),
            Self::AcknowledgePosts => Some(MemberFlags::ACKNOWLEDGE_POSTS),
            Self::DisableMime => Some(MemberFlags::DISABLE_MIME),
            Self::ConcealSubscription => Some(MemberFlags::CONCEAL_SUBSCRIPTION),
            Self::SuppressPasswordReminder => Some(MemberFlags::SUPPRESS_PASSWORD_REMINDER),
            Self::ReceiveNonmatchingTopics => Some(MemberFlags::RECEIVE_NONMATCHING_TOPICS),
            Self::DontReceiveDuplicates => Some(MemberFlags::DONT_RECEIVE_DUPLICATES),
        }
    }

    /// The form field name used by the member options page.
    pub fn form_name(self) -> &'static str {
        match self {
            Self::Digest => "digest",
            Self::DisableMime => "mime",
            Self::DontReceiveOwnPosts => "dontreceive",
            Self::AcknowledgePosts => "ackposts",
            Self::DisableDelivery => "disablemail",
            Self::ConcealSubscription => "conceal",
            Self::SuppressPasswordReminder => "remind",
            Self::ReceiveNonmatchingTopics => "rcvtopic",
            Self::DontReceiveDuplicates => "nodupes",
        }
    }

    /// All options in the order the options page presents them.
    pub const ALL: [MemberOption; 9] = [
        Self::Digest,
        Self::DisableMime,
        Self::DontReceiveOwnPosts,
        Self::AcknowledgePosts,
        Self::DisableDelivery,
        Self::ConcealSubscription,
        Self::SuppressPasswordReminder,
        Self::ReceiveNonmatchingTopics,
        Self::DontReceiveDuplicates,
    ];
}

bitflags! {
    /// Boolean member options. Stored as the raw bits.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MemberFlags: u32 {
        const DONT_RECEIVE_OWN_POSTS = 1 << 1;
        const ACKNOWLEDGE_POSTS = 1 << 2;
        const DISABLE_MIME = 1 << 3;
        const CONCEAL_SUBSCRIPTION = 1 << 4;
        const SUPPRESS_PASSWORD_REMINDER = 1 << 5;
        const RECEIVE_NONMATCHING_TOPICS = 1 << 6;
        const DONT_RECEIVE_DUPLICATES = 1 << 8;
    }
}

impl Serialize for MemberFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for MemberFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

/// How a member receives list traffic. A member is in exactly one mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Regular,
    Digest,
}

/// Whether delivery is enabled, and if not, who turned it off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Enabled,
    /// The member opted out themselves.
    ByUser,
    /// A list or site administrator disabled delivery.
    ByAdmin,
    /// Bounce processing disabled delivery.
    ByBounce,
}

impl DeliveryStatus {
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }

    /// Disabled by the site (administrator or bounce processing) rather than
    /// by the member.
    pub fn is_site_disabled(self) -> bool {
        matches!(self, Self::ByAdmin | Self::ByBounce)
    }
}

/// One subscription of an address to a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Address as typed at subscription time.
    pub address: String,
    /// Full name, if the member gave one.
    #[serde(default)]
    pub name: Option<String>,
    pub mode: DeliveryMode,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub flags: MemberFlags,
    pub language: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub password: PasswordHash,
}

impl Member {
    pub fn new(address: &str, password: PasswordHash, language: &str) -> Self {
        Self {
            address: address.trim().to_string(),
            name: None,
            mode: DeliveryMode::Regular,
            status: DeliveryStatus::Enabled,
            flags: MemberFlags::default(),
            language: language.to_string(),
            topics: Vec::new(),
            password,
        }
    }

    /// Case-insensitive identity.
    pub fn key(&self) -> String {
        address_key(&self.address)
    }

    pub fn is_digest(&self) -> bool {
        self.mode == DeliveryMode::Digest
    }

    /// Current boolean value of an option.
    pub fn option(&self, option: MemberOption) -> bool {
        match option {
            MemberOption::Digest => self.is_digest(),
            MemberOption::DisableDelivery => !self.status.is_enabled(),
            other => other.flag().is_some_and(|flag| self.flags.contains(flag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_set_and_clear() {
        let mut flags = MemberFlags::default();
        flags.set(MemberFlags::CONCEAL_SUBSCRIPTION, true);
        flags.set(MemberFlags::ACKNOWLEDGE_POSTS, true);
        assert!(flags.contains(MemberFlags::CONCEAL_SUBSCRIPTION));
        flags.set(MemberFlags::CONCEAL_SUBSCRIPTION, false);
        assert!(!flags.contains(MemberFlags::CONCEAL_SUBSCRIPTION));
        assert_eq!(flags.bits(), 4);
    }

    #[test]
    fn test_flags_stored_as_bits() {
        let flags = MemberFlags::ACKNOWLEDGE_POSTS | MemberFlags::DONT_RECEIVE_DUPLICATES;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "260");
        let back: MemberFlags = serde_json::from_str("260").unwrap();
        assert_eq!(back, flags);
        // Unknown bits are dropped on load.
        let back: MemberFlags = serde_json::from_str("261").unwrap();
        assert_eq!(back, flags);
    }

    #[test]
    fn test_option_reads_dedicated_state() {
        let mut m = Member::new("Ann@Example.com", PasswordHash::new("x"), "en");
        assert_eq!(m.key(), "ann@example.com");
        assert!(!m.option(MemberOption::Digest));
        m.mode = DeliveryMode::Digest;
        m.status = DeliveryStatus::ByBounce;
        assert!(m.option(MemberOption::Digest));
        assert!(m.option(MemberOption::DisableDelivery));
        assert!(m.status.is_site_disabled());
    }

    #[test]
    fn test_distinct_flags() {
        let flags: Vec<MemberFlags> = MemberOption::ALL.iter().filter_map(|o| o.flag()).collect();
        let combined = flags.iter().fold(MemberFlags::empty(), |acc, f| acc | *f);
        assert_eq!(combined.bits().count_ones() as usize, flags.len());
        assert_eq!(combined, MemberFlags::all());
    }
}
