//! Bounce/spam header matching rules.
//!
//! The stored text holds one `header-name: regexp` pair per line. Lines that
//! start with `#` are comments and blank lines are ignored. The parsed rule
//! set is consumed by bounce processing, which lives outside this crate.

use regex::Regex;
use tracing::warn;

/// A single header rule.
#[derive(Debug, Clone)]
pub struct BounceRule {
    /// Lower-cased header name.
    pub header: String,
    pub pattern: Regex,
    /// The source line, for display.
    pub line: String,
}

impl BounceRule {
    /// Whether a message header `(name, value)` triggers this rule.
    pub fn matches(&self, name: &str, value: &str) -> bool {
        name.eq_ignore_ascii_case(&self.header) && self.pattern.is_match(value)
    }
}

/// Why a rule line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLineError {
    /// The line has no `:` separator.
    MissingColon { line_no: usize, line: String },
    /// The pattern does not compile.
    BadPattern {
        line_no: usize,
        line: String,
        reason: String,
    },
}

impl std::fmt::Display for RuleLineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColon { line_no, line } => {
                write!(f, "line {line_no}: bad header match rule (missing ':'): {line}")
            }
            Self::BadPattern {
                line_no,
                line,
                reason,
            } => write!(f, "line {line_no}: bad regular expression in {line}: {reason}"),
        }
    }
}

/// Parsed rules plus the lines that could not be used.
#[derive(Debug, Clone, Default)]
pub struct BounceRules {
    pub rules: Vec<BounceRule>,
    pub errors: Vec<RuleLineError>,
}

impl BounceRules {
    /// The first rule matching any of the given headers.
    pub fn first_match<'a, I>(&self, headers: I) -> Option<&BounceRule>
    where
        I: IntoIterator<Item = (&'a str, &'a str)> + Clone,
    {
        self.rules
            .iter()
            .find(|rule| headers.clone().into_iter().any(|(n, v)| rule.matches(n, v)))
    }
}

/// Parse the newline-separated rule text. Rule order is preserved.
pub fn parse_rules(text: &str) -> BounceRules {
    let mut out = BounceRules::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;
        let Some((header, pattern)) = line.split_once(':') else {
            warn!(line_no, line, "Bad header match rule, skipping");
            out.errors.push(RuleLineError::MissingColon {
                line_no,
                line: line.to_string(),
            });
            continue;
        };
        let pattern = pattern.trim();
        match Regex::new(&format!("(?i){pattern}")) {
            Ok(re) => out.rules.push(BounceRule {
                header: header.trim().to_lowercase(),
                pattern: re,
                line: line.to_string(),
            }),
            Err(e) => {
                warn!(line_no, line, error = %e, "Bad regular expression in header rule");
                out.errors.push(RuleLineError::BadPattern {
                    line_no,
                    line: line.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    out
}
