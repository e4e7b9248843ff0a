//! Per-kind validation and coercion of submitted option values.
//!
//! Validation never fails outright: input that cannot be coerced reverts to
//! the value currently stored, which makes the field a no-op for this request.

use tracing::debug;

use crate::model::address::is_valid_email;
use crate::model::list::ListConfig;
use crate::schema::{ConfigValue, OptionDescriptor, OptionKind};

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub value: ConfigValue,
    /// Whether `value` differs from the stored value.
    pub changed: bool,
}

/// Validate `raw` for `descriptor` against the list's current configuration.
pub fn validate(config: &ListConfig, descriptor: &OptionDescriptor, raw: &str) -> Validated {
    let previous = descriptor.current(config);
    let value = coerce(descriptor, raw).unwrap_or_else(|| {
        debug!(field = descriptor.name, raw, "Invalid value, keeping previous");
        previous.clone()
    });
    let changed = !value.same_as(&previous);
    Validated { value, changed }
}

/// Coerce `raw` by kind; `None` means "revert to the previous value".
fn coerce(descriptor: &OptionDescriptor, raw: &str) -> Option<ConfigValue> {
    match descriptor.kind {
        OptionKind::Toggle | OptionKind::Radio => {
            let index: i64 = raw.trim().parse().ok()?;
            let in_range = match descriptor.choice_count() {
                Some(n) => (0..n as i64).contains(&index),
                None => index >= 0,
            };
            in_range.then_some(ConfigValue::Int(index))
        }
        OptionKind::String | OptionKind::Text | OptionKind::Host | OptionKind::FileUpload => {
            Some(ConfigValue::Text(raw.to_string()))
        }
        OptionKind::Email => {
            let addr = raw.trim();
            is_valid_email(addr).then(|| ConfigValue::Text(addr.to_string()))
        }
        OptionKind::EmailList => Some(ConfigValue::List(valid_addresses(raw))),
        OptionKind::Number => parse_number(raw),
    }
}

/// Split on newlines, trim, and keep only syntactically valid addresses.
/// Invalid lines are dropped silently.
pub fn valid_addresses(raw: &str) -> Vec<String> {
    raw.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && is_valid_email(line))
        .map(str::to_string)
        .collect()
}

/// Integer first, then float. Negative or non-finite numbers are rejected.
fn parse_number(raw: &str) -> Option<ConfigValue> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return (n >= 0).then_some(ConfigValue::Int(n));
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0).then_some(ConfigValue::Float(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::lookup;

    fn check(field: &str, raw: &str) -> Validated {
        let (_, d) = lookup(field).expect("known field");
        validate(&ListConfig::default(), d, raw)
    }

    #[test]
    fn test_toggle_and_radio() {
        assert_eq!(check("moderated", "1").value, ConfigValue::Int(1));
        assert!(check("moderated", "1").changed);
        // out of range and garbage revert
        assert_eq!(check("moderated", "2").value, ConfigValue::Int(0));
        assert_eq!(check("private_roster", "x").value, ConfigValue::Int(0));
        assert!(!check("private_roster", "x").changed);
        assert_eq!(check("private_roster", " 2 ").value, ConfigValue::Int(2));
    }

    #[test]
    fn test_strings_pass_through() {
        let v = check("description", "  <b>spaced</b> ");
        assert_eq!(v.value, ConfigValue::Text("  <b>spaced</b> ".to_string()));
        assert_eq!(check("host_name", "not a host!").value, ConfigValue::Text("not a host!".into()));
    }

    #[test]
    fn test_email_reverts_on_bad_syntax() {
        let v = check("reply_to_address", "nobody");
        assert_eq!(v.value, ConfigValue::Text(String::new()));
        assert!(!v.changed);
        let v = check("reply_to_address", "replies@example.com");
        assert_eq!(v.value, ConfigValue::Text("replies@example.com".into()));
        assert!(v.changed);
    }

    #[test]
    fn test_email_list_filters() {
        let v = check("owner", "a@example.com\n\n  bad line \n b@example.org \r\nnot-an-address\n");
        assert_eq!(
            v.value,
            ConfigValue::List(vec!["a@example.com".into(), "b@example.org".into()])
        );
    }

    #[test]
    fn test_number_rules() {
        assert_eq!(check("max_message_size", "100").value, ConfigValue::Int(100));
        assert_eq!(check("digest_size_threshhold", "12.5").value, ConfigValue::Float(12.5));
        assert_eq!(check("max_message_size", "-1").value, ConfigValue::Int(40));
        assert_eq!(check("max_message_size", "lots").value, ConfigValue::Int(40));
        assert_eq!(check("max_message_size", "inf").value, ConfigValue::Int(40));
        assert!(!check("max_message_size", "40").changed);
    }

    #[test]
    fn test_whole_number_matches_stored_float() {
        let v = check("digest_size_threshhold", "30");
        assert!(!v.changed);
        assert!(check("digest_size_threshhold", "30.0").value.same_as(&ConfigValue::Float(30.0)));
        assert!(check("digest_size_threshhold", "31").changed);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn email_list_keeps_exactly_the_valid_lines(
                lines in proptest::collection::vec(
                    prop_oneof![
                        ("[a-z]{1,6}(\\.[a-z]{1,4})?@[a-z]{1,6}\\.(com|org|net)", " {0,2}")
                            .prop_map(|(addr, pad)| (format!("{pad}{addr}{pad}"), true)),
                        "[a-z ]{0,10}".prop_map(|junk| (junk, false)),
                        "[a-z]{1,5}@[a-z]{1,5}".prop_map(|one_label| (one_label, false)),
                    ],
                    0..10,
                )
            ) {
                let raw = lines.iter().map(|(line, _)| line.as_str()).collect::<Vec<_>>().join("\n");
                let expected: Vec<String> = lines
                    .iter()
                    .filter(|(_, valid)| *valid)
                    .map(|(line, _)| line.trim().to_string())
                    .collect();
                let kept = valid_addresses(&raw);
                prop_assert_eq!(&kept, &expected);
                prop_assert_eq!(valid_addresses(&kept.join("\n")), kept);
            }

            #[test]
            fn number_is_never_negative(raw in "-?[0-9]{1,6}(\\.[0-9]{1,3})?") {
                match check("digest_size_threshhold", &raw).value {
                    ConfigValue::Int(n) => prop_assert!(n >= 0),
                    ConfigValue::Float(f) => prop_assert!(f >= 0.0),
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }
        }
    }
}
