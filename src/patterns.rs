//! Include/exclude name matching for dependency discovery

use log::warn;
use regex::Regex;
use regex_cache::LazyRegex;
use serde::{Deserialize, Deserializer};

use crate::config_file::{ConfigError, parse_regexes};

/// A single name pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Regex source, compiled each time it is matched.
    Source(String),
    /// A regex compiled up front.
    Compiled(LazyRegex),
}

impl Pattern {
    /// Test `name` against this pattern. A source that fails to compile never matches.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Pattern::Source(source) => match Regex::new(source) {
                Ok(re) => re.is_match(name),
                Err(e) => {
                    warn!("Ignoring invalid pattern `{source}`: {e}");
                    false
                }
            },
            Pattern::Compiled(re) => re.is_match(name),
        }
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Pattern::Source(source.to_string())
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Pattern::Source(source)
    }
}

impl From<LazyRegex> for Pattern {
    fn from(re: LazyRegex) -> Self {
        Pattern::Compiled(re)
    }
}

/// Zero or more patterns combined with logical OR.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every source eagerly, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Regex` naming the offending pattern.
    pub fn compiled<I, S>(sources: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regexes = parse_regexes(sources.into_iter().map(Into::into).collect())?;
        Ok(regexes.into_iter().collect())
    }

    #[must_use]
    pub fn with(mut self, pattern: impl Into<Pattern>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if any pattern matches `name`. An empty set matches nothing.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// True if `name` matches `include` and does not match `exclude`.
    #[must_use]
    pub fn admits(name: &str, include: &PatternSet, exclude: &PatternSet) -> bool {
        include.matches(name) && !exclude.matches(name)
    }
}

/// Free-function form of [`PatternSet::matches`].
#[must_use]
pub fn matches(name: &str, set: &PatternSet) -> bool {
    set.matches(name)
}

impl<P: Into<Pattern>> FromIterator<P> for PatternSet {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        PatternSet {
            patterns: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&str> for PatternSet {
    fn from(source: &str) -> Self {
        PatternSet::new().with(source)
    }
}

impl From<String> for PatternSet {
    fn from(source: String) -> Self {
        PatternSet::new().with(source)
    }
}

impl From<LazyRegex> for PatternSet {
    fn from(re: LazyRegex) -> Self {
        PatternSet::new().with(re)
    }
}

impl From<Vec<String>> for PatternSet {
    fn from(sources: Vec<String>) -> Self {
        sources.into_iter().collect()
    }
}

impl From<Vec<&str>> for PatternSet {
    fn from(sources: Vec<&str>) -> Self {
        sources.into_iter().collect()
    }
}

impl From<Vec<LazyRegex>> for PatternSet {
    fn from(regexes: Vec<LazyRegex>) -> Self {
        regexes.into_iter().collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPatternSet {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for PatternSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sources = match RawPatternSet::deserialize(deserializer)? {
            RawPatternSet::One(source) => vec![source],
            RawPatternSet::Many(sources) => sources,
        };
        PatternSet::compiled(sources).map_err(serde::de::Error::custom)
    }
}
