//! Configuration schema: categories, option kinds and descriptors.
//!
//! Every configurable field is described by an [`OptionDescriptor`] whose
//! [`Binding`] is either a typed getter/setter pair on
//! [`ListConfig`](crate::model::list::ListConfig) or an action with a side
//! effect. The descriptor tables are built once, on first use.

mod catalog;
pub mod value;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::model::list::{ListConfig, MailingList};

pub use self::value::{ConfigValue, FieldValue};

/// Field names starting with this prefix denote actions, not stored values.
pub const ACTION_PREFIX: char = '_';

/// Configuration categories, in the order the admin interface lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    General,
    Members,
    Privacy,
    Nondigest,
    Digest,
    Bounce,
    Archive,
    Gateway,
    Autoreply,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Self::General,
        Self::Members,
        Self::Privacy,
        Self::Nondigest,
        Self::Digest,
        Self::Bounce,
        Self::Archive,
        Self::Gateway,
        Self::Autoreply,
    ];

    /// Parse a category name; `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Members => "members",
            Self::Privacy => "privacy",
            Self::Nondigest => "nondigest",
            Self::Digest => "digest",
            Self::Bounce => "bounce",
            Self::Archive => "archive",
            Self::Gateway => "gateway",
            Self::Autoreply => "autoreply",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::General => "General Options",
            Self::Members => "Membership Management",
            Self::Privacy => "Privacy Options",
            Self::Nondigest => "Regular-member (non-digest) Options",
            Self::Digest => "Digest-member Options",
            Self::Bounce => "Bounce Options",
            Self::Archive => "Archival Options",
            Self::Gateway => "Mail-News and News-Mail gateways",
            Self::Autoreply => "Auto-responder",
        }
    }

    /// The ordered descriptors of this category. `Members` has none: its
    /// form drives the roster and mass-subscribe operations instead.
    pub fn descriptors(self) -> &'static [OptionDescriptor] {
        SCHEMA
            .by_category
            .get(&self)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The closed set of option kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Toggle,
    Radio,
    String,
    Text,
    Email,
    EmailList,
    Host,
    Number,
    FileUpload,
}

/// Kind-specific parameters, mostly presentation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionParams {
    None,
    /// Labels of the alternatives for Toggle/Radio; the stored value is an index.
    Choices(&'static [&'static str]),
    /// Text box width.
    Width(u16),
    /// Text area rows and columns.
    Area(u16, u16),
}

pub type Getter = fn(&ListConfig) -> ConfigValue;
/// Returns `false` when the value does not fit the field.
pub type Setter = fn(&mut ListConfig, ConfigValue) -> bool;
pub type Action = fn(&mut MailingList, &ConfigValue);

/// How a descriptor reaches list state.
#[derive(Clone, Copy)]
pub enum Binding {
    Field { get: Getter, set: Setter },
    Action(Action),
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field { .. } => f.write_str("Field"),
            Self::Action(_) => f.write_str("Action"),
        }
    }
}

/// Static metadata for one configurable field.
#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    pub name: &'static str,
    pub kind: OptionKind,
    pub params: OptionParams,
    /// Other settings depend on this one.
    pub dependent: bool,
    pub description: &'static str,
    pub elaboration: Option<&'static str>,
    pub binding: Binding,
}

impl OptionDescriptor {
    pub fn is_action(&self) -> bool {
        self.name.starts_with(ACTION_PREFIX)
    }

    /// Current stored value. Actions always read as `0`.
    pub fn current(&self, config: &ListConfig) -> ConfigValue {
        match self.binding {
            Binding::Field { get, .. } => get(config),
            Binding::Action(_) => ConfigValue::Int(0),
        }
    }

    /// Number of alternatives for Toggle/Radio options.
    pub fn choice_count(&self) -> Option<usize> {
        match self.params {
            OptionParams::Choices(c) => Some(c.len()),
            _ => None,
        }
    }
}

struct Schema {
    by_category: HashMap<Category, Vec<OptionDescriptor>>,
    by_name: HashMap<&'static str, (Category, usize)>,
}

static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
    let mut by_category = HashMap::new();
    let mut by_name = HashMap::new();
    for category in Category::ALL {
        let descriptors = catalog::descriptors(category);
        for (idx, d) in descriptors.iter().enumerate() {
            by_name.insert(d.name, (category, idx));
        }
        by_category.insert(category, descriptors);
    }
    Schema {
        by_category,
        by_name,
    }
});

/// Look up a descriptor by variable name across all categories.
pub fn lookup(name: &str) -> Option<(Category, &'static OptionDescriptor)> {
    let (category, idx) = *SCHEMA.by_name.get(name)?;
    category.descriptors().get(idx).map(|d| (category, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::from_name("Privacy"), Some(Category::Privacy));
        assert_eq!(Category::from_name("logout"), None);
        assert_eq!(Category::Gateway.to_string(), "gateway");
    }

    #[test]
    fn test_every_category_but_members_has_options() {
        for category in Category::ALL {
            let n = category.descriptors().len();
            if category == Category::Members {
                assert_eq!(n, 0);
            } else {
                assert!(n > 0, "{category} has no descriptors");
            }
        }
    }

    #[test]
    fn test_names_are_unique_and_resolvable() {
        let total: usize = Category::ALL.iter().map(|c| c.descriptors().len()).sum();
        assert_eq!(SCHEMA.by_name.len(), total);
        let (category, d) = lookup("real_name").expect("real_name");
        assert_eq!(category, Category::General);
        assert_eq!(d.kind, OptionKind::String);
    }

    #[test]
    fn test_getters_and_setters_agree() {
        let mut config = ListConfig::default();
        for category in Category::ALL {
            for d in category.descriptors() {
                if let Binding::Field { get, set } = d.binding {
                    let v = get(&config);
                    assert!(set(&mut config, v.clone()), "{} rejects its own value", d.name);
                    assert_eq!(get(&config), v);
                }
            }
        }
    }

    #[test]
    fn test_choice_fields_have_choices() {
        for category in Category::ALL {
            for d in category.descriptors() {
                if matches!(d.kind, OptionKind::Toggle | OptionKind::Radio) {
                    assert!(d.choice_count().is_some(), "{} lacks choices", d.name);
                }
            }
        }
    }

    #[test]
    fn test_action_fields() {
        let (_, d) = lookup("_mass_catchup").expect("action");
        assert!(d.is_action());
        assert!(matches!(d.binding, Binding::Action(_)));
        assert_eq!(d.current(&ListConfig::default()), ConfigValue::Int(0));
    }
}
