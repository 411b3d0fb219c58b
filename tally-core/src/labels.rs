//! Label and label-set types.
//!
//! A [`LabelSet`] is the identity of one observation: a set of
//! `(name, value)` dimensions with unique names. Names are kept sorted so the
//! content hash does not depend on construction order.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::constants::{LABEL_SEPARATOR, METRIC_NAME_LABEL, TTL_LABEL};
use crate::error::LabelError;

/// A single dimension of a label-set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.name)?;
        write_quoted(f, &self.value)
    }
}

/// A set of labels with unique names, iterated in ascending name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: BTreeMap<String, String>,
}

impl LabelSet {
    /// Create an empty label-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a label-set from `(name, value)` pairs. Later duplicates win.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let labels = pairs
            .into_iter()
            .map(|(n, v)| (n.into(), v.into()))
            .collect();
        Self { labels }
    }

    /// Add a label, replacing any existing value for the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Declare a TTL (seconds) through the reserved `__ttl__` label.
    pub fn with_ttl(self, ttl_secs: i64) -> Self {
        self.with(TTL_LABEL, ttl_secs.to_string())
    }

    /// Insert a label, returning the previous value for that name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.labels.insert(name.into(), value.into())
    }

    /// Remove a label by name.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.labels.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Number of dimensions (the quorum denominator).
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate `(name, value)` pairs in ascending name order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.labels.iter(),
        }
    }

    /// Iterate dimension names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Iterate the keys used to bucket this set's dimensions.
    ///
    /// Every dimension is keyed by its name, except `__name__`, which is
    /// keyed by its value so the metric's identity votes like any other
    /// dimension.
    pub fn dimension_keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(name, value)| {
            if name == METRIC_NAME_LABEL {
                value
            } else {
                name
            }
        })
    }

    /// The value of the `__name__` dimension, if present.
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    /// The self-declared TTL in seconds.
    ///
    /// Missing or unparseable `__ttl__` values yield 0, which callers treat
    /// as "does not participate in freshness tracking".
    pub fn ttl(&self) -> i64 {
        self.get(TTL_LABEL)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Stable 64-bit content hash over names and values.
    ///
    /// Hashes `name 0xFF value 0xFF` for every dimension in name order with
    /// Blake3 and keeps the first eight bytes. `0xFF` never occurs in UTF-8,
    /// so the byte stream is unambiguous.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.labels {
            hasher.update(name.as_bytes());
            hasher.update(&[LABEL_SEPARATOR]);
            hasher.update(value.as_bytes());
            hasher.update(&[LABEL_SEPARATOR]);
        }
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    /// Merge `other` into a copy of `self`. On a name collision the value
    /// already in `self` is kept.
    pub fn merged_with(&self, other: &LabelSet) -> LabelSet {
        let mut merged = other.clone();
        for (name, value) in &self.labels {
            merged.labels.insert(name.clone(), value.clone());
        }
        merged
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}=", name)?;
            write_quoted(f, value)?;
        }
        f.write_str("}")
    }
}

/// Write `value` double-quoted, escaping `\`, `"` and newlines.
fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Read a quoted value whose opening quote is already consumed.
///
/// Returns the unescaped value and the input after the closing quote, or
/// `None` for an unterminated value or an unknown escape.
fn read_quoted(quoted: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &quoted[i + 1..])),
            '\\' => match chars.next()?.1 {
                '\\' => value.push('\\'),
                '"' => value.push('"'),
                'n' => value.push('\n'),
                _ => return None,
            },
            c => value.push(c),
        }
    }
    None
}

/// Parses the `{name="value", ...}` form produced by `Display`.
///
/// Values understand the `\\`, `\"` and `\n` escapes. Names run up to the
/// first `=` and are trimmed.
impl FromStr for LabelSet {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| LabelError::Malformed {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut rest = s
            .trim()
            .strip_prefix('{')
            .ok_or_else(|| malformed("expected opening brace"))?;
        let mut set = LabelSet::new();

        loop {
            rest = rest.trim_start();
            if let Some(after) = rest.strip_prefix('}') {
                if !after.trim().is_empty() {
                    return Err(malformed("unexpected input after closing brace"));
                }
                return Ok(set);
            }

            let (name, after_eq) = rest
                .split_once('=')
                .ok_or_else(|| malformed("expected name=value"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(LabelError::EmptyName);
            }

            let quoted = after_eq
                .trim_start()
                .strip_prefix('"')
                .ok_or_else(|| malformed("value must be double-quoted"))?;
            let (value, after_value) =
                read_quoted(quoted).ok_or_else(|| malformed("unterminated value or bad escape"))?;

            if set.insert(name, value).is_some() {
                return Err(LabelError::DuplicateName {
                    name: name.to_string(),
                });
            }

            rest = after_value.trim_start();
            match rest.strip_prefix(',') {
                Some(after_comma) => rest = after_comma,
                None if rest.starts_with('}') => {}
                None => return Err(malformed("expected ',' or '}'")),
            }
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl From<Vec<Label>> for LabelSet {
    fn from(labels: Vec<Label>) -> Self {
        Self::from_pairs(labels.into_iter().map(|l| (l.name, l.value)))
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`LabelSet`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, String, String>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}
