//! Email address parsing and syntax validation.

use crate::error::AddressError;

/// Characters that could be abused for header injection or shell tricks.
const HOSTILE_CHARS: &[char] = &['[', ']', '(', ')', '<', '>', '|', ';', '^', ','];

/// A parsed batch-input line.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`), case preserved.
    pub address: String,
}

impl EmailAddress {
    /// Parse a single address in one of the forms
    /// `user@domain`, `<user@domain>`, `Name <user@domain>` or
    /// `"Quoted, Name" <user@domain>`.
    ///
    /// No validation happens here; the raw text is kept as `address` when
    /// there are no angle brackets.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim().to_string();
                    let name_part = trimmed[..angle_start].trim();
                    return Self {
                        display_name: strip_quotes(name_part),
                        address: addr,
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Validate the syntax of a bare address.
///
/// Order matters: emptiness and spaces are *bad*, suspicious characters are
/// *hostile*, and a missing or single-label domain is *bad* again.
pub fn validate_email(addr: &str) -> Result<(), AddressError> {
    if addr.is_empty() || addr.contains(' ') {
        return Err(AddressError::Bad(addr.to_string()));
    }
    if addr.starts_with('-') || addr.chars().any(is_hostile_char) {
        return Err(AddressError::Hostile(addr.to_string()));
    }
    let Some((local, domain)) = addr.rsplit_once('@') else {
        return Err(AddressError::Bad(addr.to_string()));
    };
    if local.is_empty() {
        return Err(AddressError::Bad(addr.to_string()));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(AddressError::Bad(addr.to_string()));
    }
    Ok(())
}

/// Whether `addr` passes [`validate_email`].
pub fn is_valid_email(addr: &str) -> bool {
    validate_email(addr).is_ok()
}

fn is_hostile_char(c: char) -> bool {
    HOSTILE_CHARS.contains(&c) || c.is_control() || !c.is_ascii()
}

/// Case-insensitive identity of a member address.
pub fn address_key(addr: &str) -> String {
    addr.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>");
        assert_eq!(addr.address, "user1@example.com");
        assert_eq!(addr.display_name, "User One");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "Last, First");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(EmailAddress::parse("   ").address, "");
    }

    #[test]
    fn test_validate_accepts_plain_address() {
        assert!(validate_email("Alice.Smith@Example.COM").is_ok());
        assert!(validate_email("a+tag@lists.example.org").is_ok());
    }

    #[test]
    fn test_validate_bad_addresses() {
        for bad in ["", "no-at-sign", "user@localhost", "@example.com", "a b@c.com", "a@b..com"] {
            assert!(
                matches!(validate_email(bad), Err(AddressError::Bad(_))),
                "expected bad: {bad:?}"
            );
        }
    }

    #[test]
    fn test_validate_hostile_addresses() {
        for bad in ["-rf@example.com", "a;b@example.com", "a@b.com\nBcc:x@y.com", "<a@b.com>", "jos\u{e9}@example.com"] {
            assert!(
                matches!(validate_email(bad), Err(AddressError::Hostile(_))),
                "expected hostile: {bad:?}"
            );
        }
    }

    #[test]
    fn test_address_key() {
        assert_eq!(address_key(" Bob@Example.COM "), "bob@example.com");
    }
}
