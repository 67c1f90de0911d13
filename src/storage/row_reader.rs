//! Operator-aware reading of map rows.
//!
//! A [`RowReader`] turns a comparison operator and a value into a walk over
//! the matching rows of an index bucket. Rows are always visited in
//! ascending key order, so the same store state and query visit the same
//! rows in the same order.

use std::fmt;
use std::fmt::Write;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::traits::{Bucket, RowVisitor};

/// Comparison operator applied to row keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Key equals the value.
    Equal,
    /// Key differs from the value.
    NotEqual,
    /// Key sorts after the value.
    GreaterThan,
    /// Key sorts after or equals the value.
    GreaterThanEqual,
    /// Key sorts before the value.
    LessThan,
    /// Key sorts before or equals the value.
    LessThanEqual,
    /// Key matches a wildcard pattern (`*` any run, `?` any single character).
    Like,
}

impl Operator {
    /// Whether the set of matched rows is independent of scan order.
    ///
    /// Equality always reads a single row, so any fold over its row hashes
    /// is trivially order-independent.
    pub fn is_order_independent(&self) -> bool {
        matches!(self, Operator::Equal)
    }

    /// Short symbolic name used in log lines.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::Like => "like",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Reads the rows of one bucket matching `operator value`.
pub struct RowReader<'a> {
    bucket: &'a dyn Bucket,
    value: &'a [u8],
    operator: Operator,
}

impl<'a> RowReader<'a> {
    /// Create a new row reader.
    pub fn new(bucket: &'a dyn Bucket, value: &'a [u8], operator: Operator) -> Self {
        RowReader {
            bucket,
            value,
            operator,
        }
    }

    /// Visit every matching row until the visitor returns `false`.
    ///
    /// Rows without pairs are never visited.
    pub fn read(&self, visit: &mut RowVisitor<'_>) -> Result<()> {
        match self.operator {
            Operator::Equal => self.equal(visit),
            Operator::NotEqual => self.scan_all(visit, |key, value| key != value),
            Operator::GreaterThan => self.greater_than(visit, false),
            Operator::GreaterThanEqual => self.greater_than(visit, true),
            Operator::LessThan => self.less_than(visit, false),
            Operator::LessThanEqual => self.less_than(visit, true),
            Operator::Like => self.like(visit),
        }
    }

    fn equal(&self, visit: &mut RowVisitor<'_>) -> Result<()> {
        let pairs = self.bucket.map_list(self.value)?;
        if !pairs.is_empty() {
            visit(self.value, &pairs)?;
        }
        Ok(())
    }

    fn scan_all(
        &self,
        visit: &mut RowVisitor<'_>,
        keep: impl Fn(&[u8], &[u8]) -> bool,
    ) -> Result<()> {
        self.bucket.scan_map(None, &mut |key, pairs| {
            if pairs.is_empty() || !keep(key, self.value) {
                return Ok(true);
            }
            visit(key, pairs)
        })
    }

    fn greater_than(&self, visit: &mut RowVisitor<'_>, inclusive: bool) -> Result<()> {
        self.bucket.scan_map(Some(self.value), &mut |key, pairs| {
            if pairs.is_empty() || (!inclusive && key == self.value) {
                return Ok(true);
            }
            visit(key, pairs)
        })
    }

    fn less_than(&self, visit: &mut RowVisitor<'_>, inclusive: bool) -> Result<()> {
        self.bucket.scan_map(None, &mut |key, pairs| {
            let past_end = if inclusive {
                key > self.value
            } else {
                key >= self.value
            };
            if past_end {
                return Ok(false);
            }
            if pairs.is_empty() {
                return Ok(true);
            }
            visit(key, pairs)
        })
    }

    fn like(&self, visit: &mut RowVisitor<'_>) -> Result<()> {
        let pattern = LikePattern::parse(self.value)?;
        let prefix = pattern.prefix.as_slice();
        let from = if prefix.is_empty() { None } else { Some(prefix) };

        self.bucket.scan_map(from, &mut |key, pairs| {
            if !key.starts_with(prefix) {
                return Ok(false);
            }
            if pairs.is_empty() || !pattern.regex.is_match(key) {
                return Ok(true);
            }
            visit(key, pairs)
        })
    }
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct LikePattern {
    /// Literal bytes before the first wildcard.
    pub prefix: Vec<u8>,
    regex: Regex,
}

impl LikePattern {
    /// Compile a `*`/`?` wildcard pattern into an anchored regex.
    pub fn parse(pattern: &[u8]) -> Result<Self> {
        let first_wildcard = pattern
            .iter()
            .position(|b| *b == b'*' || *b == b'?')
            .unwrap_or(pattern.len());
        let prefix = pattern[..first_wildcard].to_vec();

        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push_str("(?s)^");
        let mut literal = String::new();
        for chunk in pattern.utf8_chunks() {
            for c in chunk.valid().chars() {
                match c {
                    '*' | '?' => {
                        expr.push_str(&regex::escape(&literal));
                        literal.clear();
                        expr.push_str(if c == '*' { "(?-u:.)*" } else { "." });
                    }
                    other => literal.push(other),
                }
            }
            if !chunk.invalid().is_empty() {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                // Raw bytes match only with Unicode mode off.
                for byte in chunk.invalid() {
                    let _ = write!(expr, "(?-u:\\x{byte:02X})");
                }
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        Ok(LikePattern {
            prefix,
            regex: Regex::new(&expr)?,
        })
    }

    /// Whether `key` matches the pattern.
    pub fn is_match(&self, key: &[u8]) -> bool {
        self.regex.is_match(key)
    }
}
