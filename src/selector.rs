//! Field selectors with `:contains('text')` support
//!
//! Plain CSS is compiled with `scraper`. A selector carrying a
//! `:contains('text')` clause is split into three parts:
//!
//! ```text
//! table tr:contains('Total') td.amount
//! └──base──┘         └text┘  └within─┘
//! ```
//!
//! `base` picks candidate elements, the first one whose text includes
//! `text` wins, and `within` (optional) is then queried inside it.

use crate::error::SelectorError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

const CONTAINS_OPEN: &str = ":contains(";

/// Something elements can be selected from: a whole document or one element
pub(crate) trait Scope<'a> {
    fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'a>>;
}

impl<'a> Scope<'a> for &'a Html {
    fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'a>> {
        let document: &'a Html = *self;
        document.select(selector).collect()
    }
}

impl<'a> Scope<'a> for ElementRef<'a> {
    fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.select(selector).collect()
    }
}

/// Trimmed text content of an element
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// A compiled selector query
#[derive(Debug, Clone)]
pub enum SelectorQuery {
    /// Ordinary CSS selector
    Plain(Selector),

    /// CSS selector narrowed by a text match, optionally followed by a
    /// selector applied inside the matched element
    Contains {
        base: Selector,
        text: String,
        within: Option<Selector>,
    },
}

impl SelectorQuery {
    /// Parse and compile a selector string
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let Some(open) = source.find(CONTAINS_OPEN) else {
            return compile(source.trim()).map(Self::Plain);
        };

        let malformed = |reason: &str| SelectorError::MalformedContains {
            selector: source.to_string(),
            reason: reason.to_string(),
        };

        let base = source[..open].trim();
        if base.is_empty() {
            return Err(malformed("no selector before :contains"));
        }

        let argument = source[open + CONTAINS_OPEN.len()..].trim_start();
        let quote = argument
            .chars()
            .next()
            .filter(|c| *c == '\'' || *c == '"')
            .ok_or_else(|| malformed("argument must be quoted"))?;
        let argument = &argument[1..];
        let close_quote = argument
            .find(quote)
            .ok_or_else(|| malformed("unterminated quoted text"))?;
        let text = &argument[..close_quote];

        let rest = argument[close_quote + 1..].trim_start();
        let rest = rest
            .strip_prefix(')')
            .ok_or_else(|| malformed("missing closing parenthesis"))?
            .trim();

        let within = if rest.is_empty() {
            None
        } else {
            Some(compile(rest)?)
        };

        Ok(Self::Contains {
            base: compile(base)?,
            text: text.to_string(),
            within,
        })
    }

    /// First element the query resolves to, in document order
    pub(crate) fn first_match<'a>(&self, scope: &impl Scope<'a>) -> Option<ElementRef<'a>> {
        match self {
            Self::Plain(selector) => scope.select_all(selector).into_iter().next(),
            Self::Contains { base, text, within } => {
                let matched = scope
                    .select_all(base)
                    .into_iter()
                    .find(|el| el.text().collect::<String>().contains(text.as_str()))?;
                match within {
                    Some(inner) => matched.select(inner).next(),
                    None => Some(matched),
                }
            }
        }
    }

    /// Every element the query resolves to, in document order
    pub(crate) fn all_matches<'a>(&self, scope: &impl Scope<'a>) -> Vec<ElementRef<'a>> {
        match self {
            Self::Plain(selector) => scope.select_all(selector),
            Self::Contains { base, text, within } => scope
                .select_all(base)
                .into_iter()
                .filter(|el| el.text().collect::<String>().contains(text.as_str()))
                .filter_map(|el| match within {
                    Some(inner) => el.select(inner).next(),
                    None => Some(el),
                })
                .collect(),
        }
    }
}

fn compile(css: &str) -> Result<Selector, SelectorError> {
    Selector::parse(css).map_err(|e| SelectorError::Invalid {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// A selector as authored, together with its compiled form or the reason it
/// failed to compile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldSelector {
    source: String,
    query: Result<SelectorQuery, SelectorError>,
}

impl FieldSelector {
    /// Compile a selector. Compilation errors are kept, not returned.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            query: SelectorQuery::parse(source),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled query, or the compile error
    pub fn query(&self) -> Result<&SelectorQuery, SelectorError> {
        self.query.as_ref().map_err(Clone::clone)
    }

    /// Compile error, if any
    #[must_use]
    pub fn error(&self) -> Option<&SelectorError> {
        self.query.as_ref().err()
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl From<String> for FieldSelector {
    fn from(source: String) -> Self {
        Self::parse(&source)
    }
}

impl From<FieldSelector> for String {
    fn from(selector: FieldSelector) -> Self {
        selector.source
    }
}
