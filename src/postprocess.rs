//! Text transforms applied to extracted values

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

static REPLACE_DIRECTIVE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"replace\('([^']+)',\s*'([^']*)'\)").unwrap()
});

/// A post-process directive, parsed once when the rule is loaded.
///
/// Directives are written as `upper()`, `lower()`, `strip()` or
/// `replace('pattern','replacement')`. Anything else, including a replace
/// whose pattern is not a valid regex, becomes [`PostProcess::Passthrough`]
/// and leaves values untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PostProcess {
    Upper,
    Lower,
    Strip,
    Replace {
        directive: String,
        pattern: Regex,
        replacement: String,
    },
    /// Unrecognized or malformed directive, kept verbatim
    Passthrough(String),
}

impl PostProcess {
    /// Parse a directive string
    #[must_use]
    pub fn parse(directive: &str) -> Self {
        match directive {
            "upper()" => Self::Upper,
            "lower()" => Self::Lower,
            "strip()" => Self::Strip,
            d if d.starts_with("replace(") => Self::parse_replace(d)
                .unwrap_or_else(|| Self::Passthrough(d.to_string())),
            d => Self::Passthrough(d.to_string()),
        }
    }

    fn parse_replace(directive: &str) -> Option<Self> {
        let caps = REPLACE_DIRECTIVE.captures(directive)?;
        let pattern = Regex::new(caps.get(1)?.as_str()).ok()?;
        Some(Self::Replace {
            directive: directive.to_string(),
            pattern,
            replacement: caps.get(2)?.as_str().to_string(),
        })
    }

    /// Apply the transform. Never fails.
    #[must_use]
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::Strip => value.trim().to_string(),
            Self::Replace {
                pattern,
                replacement,
                ..
            } => pattern
                .replace_all(value, NoExpand(replacement))
                .into_owned(),
            Self::Passthrough(_) => value.to_string(),
        }
    }

    /// Whether the directive was understood
    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Passthrough(_))
    }

    /// The directive in its authored string form
    #[must_use]
    pub fn as_directive(&self) -> &str {
        match self {
            Self::Upper => "upper()",
            Self::Lower => "lower()",
            Self::Strip => "strip()",
            Self::Replace { directive, .. } | Self::Passthrough(directive) => directive,
        }
    }
}

impl fmt::Display for PostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_directive())
    }
}

impl From<String> for PostProcess {
    fn from(directive: String) -> Self {
        Self::parse(&directive)
    }
}

impl From<PostProcess> for String {
    fn from(directive: PostProcess) -> Self {
        directive.as_directive().to_string()
    }
}

/// Apply an optional directive to a value
#[must_use]
pub fn post_process(value: &str, directive: Option<&PostProcess>) -> String {
    directive.map_or_else(|| value.to_string(), |d| d.apply(value))
}
