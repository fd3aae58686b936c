//! Mask-target expressions.
//!
//! A free-form list such as `"1-3, 7，12、20~22"` resolves to a set of
//! integers. Separators are ASCII and full-width commas, the enumeration comma
//! `、` and whitespace; `~`, `—` and `–` are read as `-`. A token is either a
//! single integer or an inclusive range `A-B` in either order.
//!
//! Parsing never fails. Tokens that do not parse are collected in
//! [`IndexExpr::skipped`] so a caller can show them, and the rest of the
//! expression still applies. Numbers are read from the leading digit run of a
//! token, so `"12abc"` counts as 12.

use std::fmt;
use std::ops::RangeInclusive;

/// A set of integers stored as sorted, non-overlapping, non-adjacent ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    ranges: Vec<RangeInclusive<i64>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary (possibly overlapping, unordered) ranges.
    pub fn from_ranges(ranges: impl IntoIterator<Item = RangeInclusive<i64>>) -> Self {
        let mut ranges: Vec<_> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        ranges.sort_by_key(|r| *r.start());

        let mut merged: Vec<RangeInclusive<i64>> = Vec::with_capacity(ranges.len());
        for r in ranges {
            match merged.last_mut() {
                Some(last) if *r.start() <= last.end().saturating_add(1) => {
                    if r.end() > last.end() {
                        *last = *last.start()..=*r.end();
                    }
                }
                _ => merged.push(r),
            }
        }
        Self { ranges: merged }
    }

    pub fn contains(&self, index: i64) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if *r.end() < index {
                    std::cmp::Ordering::Less
                } else if *r.start() > index {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of integers in the set.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| (*r.end() as i128 - *r.start() as i128 + 1) as u64)
            .sum()
    }

    /// All members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }

    pub fn ranges(&self) -> &[RangeInclusive<i64>] {
        &self.ranges
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if r.start() == r.end() {
                write!(f, "{}", r.start())?;
            } else {
                write!(f, "{}-{}", r.start(), r.end())?;
            }
        }
        Ok(())
    }
}

/// Result of parsing an index expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexExpr {
    pub set: IndexSet,
    /// Tokens that contributed nothing, in input order.
    pub skipped: Vec<String>,
    /// Input was empty or whitespace only.
    pub blank: bool,
}

impl IndexExpr {
    pub fn parse(input: &str) -> Self {
        let blank = input.trim().is_empty();
        let mut ranges = Vec::new();
        let mut skipped = Vec::new();

        for token in input
            .split(|c: char| c == ',' || c == '，' || c == '、' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            match parse_token(token) {
                Some(range) => ranges.push(range),
                None => skipped.push(token.to_string()),
            }
        }

        Self {
            set: IndexSet::from_ranges(ranges),
            skipped,
            blank,
        }
    }
}

/// Parse an expression, keeping only the resolved set.
pub fn parse_indices(input: &str) -> IndexSet {
    IndexExpr::parse(input).set
}

fn parse_token(token: &str) -> Option<RangeInclusive<i64>> {
    let normalized: String = token
        .chars()
        .map(|c| if matches!(c, '~' | '—' | '–') { '-' } else { c })
        .collect();

    if normalized.contains('-') {
        let mut parts = normalized.split('-');
        let (a, b) = (parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let (a, b) = (leading_int(a)?, leading_int(b)?);
        Some(a.min(b)..=a.max(b))
    } else {
        let n = leading_int(&normalized)?;
        Some(n..=n)
    }
}

/// Integer value of the leading ASCII digit run, if any.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}
