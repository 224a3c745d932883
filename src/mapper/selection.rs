use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::Result;

/// Default skip rule: names carrying the conventional private prefix.
pub const PRIVATE_PREFIX: &str = "^_.*$";

/// A name filter used on either side of a [`Selection`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<PatternRepr>", into = "Option<PatternRepr>")]
pub enum Pattern {
    /// Unrestricted: as an accept rule everything passes, as a skip rule nothing is skipped.
    #[default]
    Any,
    One(Regex),
    /// Matches when any member matches. An empty set matches nothing.
    Set(Vec<Regex>),
}

impl Pattern {
    pub fn one(source: &str) -> Result<Self> {
        Ok(Pattern::One(Regex::new(source)?))
    }

    pub fn set<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regexes = sources
            .into_iter()
            .map(|s| Regex::new(s.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Pattern::Set(regexes))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Pattern::Any)
    }

    fn matches(&self, name: &str) -> Option<bool> {
        match self {
            Pattern::Any => None,
            Pattern::One(re) => Some(re.is_match(name)),
            Pattern::Set(res) => Some(res.iter().any(|re| re.is_match(name))),
        }
    }

    /// Inclusionary reading.
    pub fn accepts(&self, name: &str) -> bool {
        self.matches(name).unwrap_or(true)
    }

    /// Exclusionary reading.
    pub fn rejects(&self, name: &str) -> bool {
        self.matches(name).unwrap_or(false)
    }
}

/// Wire form of a [`Pattern`]: `null`, one regex source, or a list of them.
#[doc(hidden)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternRepr {
    One(String),
    Set(Vec<String>),
}

impl TryFrom<Option<PatternRepr>> for Pattern {
    type Error = regex::Error;

    fn try_from(repr: Option<PatternRepr>) -> std::result::Result<Self, Self::Error> {
        match repr {
            None => Ok(Pattern::Any),
            Some(PatternRepr::One(source)) => Ok(Pattern::One(Regex::new(&source)?)),
            Some(PatternRepr::Set(sources)) => sources
                .iter()
                .map(|s| Regex::new(s))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Pattern::Set),
        }
    }
}

impl From<Pattern> for Option<PatternRepr> {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Any => None,
            Pattern::One(re) => Some(PatternRepr::One(re.as_str().to_string())),
            Pattern::Set(res) => Some(PatternRepr::Set(
                res.iter().map(|re| re.as_str().to_string()).collect(),
            )),
        }
    }
}

/// Which field names get instrumented, and whether the wildcard event fires.
///
/// A name is admitted when `accept` accepts it and `skip` does not reject it.
/// Immutable once built; the `with_*` methods return a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    accept: Pattern,
    skip: Pattern,
    emit_all: bool,
}

impl Selection {
    pub fn new(accept: Pattern, skip: Pattern, emit_all: bool) -> Self {
        Self {
            accept,
            skip,
            emit_all,
        }
    }

    /// Every name, wildcard on.
    pub fn all() -> Self {
        Self::new(Pattern::Any, Pattern::Any, true)
    }

    pub fn with_accept(self, accept: Pattern) -> Self {
        Self { accept, ..self }
    }

    pub fn with_skip(self, skip: Pattern) -> Self {
        Self { skip, ..self }
    }

    pub fn with_emit_all(self, emit_all: bool) -> Self {
        Self { emit_all, ..self }
    }

    pub fn accept(&self) -> &Pattern {
        &self.accept
    }

    pub fn skip(&self) -> &Pattern {
        &self.skip
    }

    pub fn emit_all(&self) -> bool {
        self.emit_all
    }

    pub fn admits(&self, name: &str) -> bool {
        self.accept.accepts(name) && !self.skip.rejects(name)
    }
}

fn private_prefix() -> &'static Regex {
    static PRIVATE: OnceLock<Regex> = OnceLock::new();
    // PRIVATE_PREFIX is a valid constant pattern.
    PRIVATE.get_or_init(|| Regex::new(PRIVATE_PREFIX).unwrap())
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(Pattern::Any, Pattern::One(private_prefix().clone()), true)
    }
}
