//! Loosely-typed configuration values and their typed field conversions.

use serde::{Deserialize, Serialize};

/// A validated option value, before it is written into a typed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl ConfigValue {
    /// Whether this value counts as "set" for action fields.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(n) => *n != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => !s.is_empty(),
            Self::List(v) => !v.is_empty(),
        }
    }
}

impl ConfigValue {
    /// Equality that treats `Int(n)` and `Float(n.0)` as the same number.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            _ => self == other,
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::List(v) => f.write_str(&v.join("\n")),
        }
    }
}

/// Conversion between a typed [`ListConfig`](crate::model::list::ListConfig)
/// field and a [`ConfigValue`].
pub trait FieldValue: Sized {
    fn to_value(&self) -> ConfigValue;
    /// `None` when the value cannot be represented by the field's type.
    fn from_value(value: ConfigValue) -> Option<Self>;
}

impl FieldValue for bool {
    fn to_value(&self) -> ConfigValue {
        ConfigValue::Int(i64::from(*self))
    }

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(0) => Some(false),
            ConfigValue::Int(1) => Some(true),
            _ => None,
        }
    }
}

impl FieldValue for u8 {
    fn to_value(&self) -> ConfigValue {
        ConfigValue::Int(i64::from(*self))
    }

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(n) => u8::try_from(n).ok(),
            _ => None,
        }
    }
}

impl FieldValue for i64 {
    fn to_value(&self) -> ConfigValue {
        ConfigValue::Int(*self)
    }

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(n) => Some(n),
            // Integral floats such as "40.0" are accepted.
            ConfigValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i64),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> ConfigValue {
        ConfigValue::Float(*self)
    }

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(f) => Some(f),
            ConfigValue::Int(n) => Some(n as f64),
            _ => None,
        }
    }
}

impl FieldValue for String {
    fn to_value(&self) -> ConfigValue {
        ConfigValue::Text(self.clone())
    }

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FieldValue for Vec<String> {
    fn to_value(&self) -> ConfigValue {
        ConfigValue::List(self.clone())
    }

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::List(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_only_accepts_zero_and_one() {
        assert_eq!(bool::from_value(ConfigValue::Int(1)), Some(true));
        assert_eq!(bool::from_value(ConfigValue::Int(2)), None);
        assert_eq!(bool::from_value(ConfigValue::Text("1".into())), None);
    }

    #[test]
    fn test_integer_fields_accept_integral_floats() {
        assert_eq!(i64::from_value(ConfigValue::Float(40.0)), Some(40));
        assert_eq!(i64::from_value(ConfigValue::Float(2.5)), None);
        assert_eq!(f64::from_value(ConfigValue::Int(3)), Some(3.0));
    }

    #[test]
    fn test_u8_range() {
        assert_eq!(u8::from_value(ConfigValue::Int(3)), Some(3));
        assert_eq!(u8::from_value(ConfigValue::Int(300)), None);
    }
}
