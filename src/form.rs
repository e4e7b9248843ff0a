//! Mutation request shape supplied by the calling layer.
//!
//! A submission maps field names to one or more string values. Checkbox-style
//! fields are presence flags: absence means "off".

use std::collections::HashMap;

/// Suffix of the file-upload variant of a text field.
pub const UPLOAD_SUFFIX: &str = "_upload";

/// Submitted form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// First value of `name`, if present and not blank after trimming.
    pub fn get_nonblank(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// All values of `name`, in submission order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Value for a text field, preferring a non-empty uploaded payload.
    pub fn text_or_upload(&self, name: &str) -> Option<&str> {
        let upload = format!("{name}{UPLOAD_SUFFIX}");
        match self.get(&upload) {
            Some(payload) if !payload.is_empty() => Some(payload),
            _ => self.get(name),
        }
    }

    /// Parse the first value as an integer.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    /// A checked flag: present with a value other than `0`/`off`/empty.
    pub fn flag(&self, name: &str) -> bool {
        match self.get(name) {
            Some(v) => !matches!(v.trim(), "" | "0" | "off"),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (k, v) in iter {
            form.insert(k, v);
        }
        form
    }
}

// ── Subscribe-policy index shift ────────────────────────────────
//
// When the site disallows open subscription the form omits the "None"
// alternative of `subscribe_policy`, so form index `i` means stored value
// `i + 1`. The shift is applied here, at the form boundary, and nowhere else.

/// Name of the only option affected by the shift.
pub const SUBSCRIBE_POLICY: &str = "subscribe_policy";

/// Translate a submitted form value into the stored-value domain.
pub fn inbound_value<'a>(field: &str, raw: &'a str, allow_open_subscribe: bool) -> std::borrow::Cow<'a, str> {
    if field == SUBSCRIBE_POLICY && !allow_open_subscribe {
        if let Ok(index) = raw.trim().parse::<i64>() {
            return std::borrow::Cow::Owned((index + 1).to_string());
        }
    }
    std::borrow::Cow::Borrowed(raw)
}

/// Translate a stored value into the index the form presents.
pub fn outbound_index(field: &str, stored: i64, allow_open_subscribe: bool) -> i64 {
    if field == SUBSCRIBE_POLICY && !allow_open_subscribe {
        stored - 1
    } else {
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_values_and_flags() {
        let form: FormData = [("user", "a@x.com"), ("user", "b@x.com"), ("a@x.com_hide", "on")]
            .into_iter()
            .collect();
        assert_eq!(form.get_all("user"), ["a@x.com", "b@x.com"]);
        assert!(form.flag("a@x.com_hide"));
        assert!(!form.flag("b@x.com_hide"));
        assert!(form.get_all("missing").is_empty());
    }

    #[test]
    fn test_flag_off_values() {
        let form = FormData::new().with("x", "0").with("y", "off").with("z", "1");
        assert!(!form.flag("x"));
        assert!(!form.flag("y"));
        assert!(form.flag("z"));
    }

    #[test]
    fn test_upload_takes_precedence_when_non_empty() {
        let form = FormData::new()
            .with("autoresponse_postings_text", "inline")
            .with("autoresponse_postings_text_upload", "uploaded");
        assert_eq!(form.text_or_upload("autoresponse_postings_text"), Some("uploaded"));

        let form = FormData::new()
            .with("autoresponse_postings_text", "inline")
            .with("autoresponse_postings_text_upload", "");
        assert_eq!(form.text_or_upload("autoresponse_postings_text"), Some("inline"));
    }

    #[test]
    fn test_subscribe_policy_shift_roundtrip() {
        assert_eq!(inbound_value(SUBSCRIBE_POLICY, "0", false), "1");
        assert_eq!(inbound_value(SUBSCRIBE_POLICY, "0", true), "0");
        assert_eq!(inbound_value("private_roster", "0", false), "0");
        assert_eq!(outbound_index(SUBSCRIBE_POLICY, 1, false), 0);
        assert_eq!(outbound_index(SUBSCRIBE_POLICY, 1, true), 1);
    }
}
