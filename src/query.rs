//! Query predicates and their modifiers.
//!
//! A [`Query`] pairs an immutable [`Criteria`] tree with the modifiers that
//! are attached rather than baked in: sort, skip/limit pagination and scan
//! consistency.
//!
//! ```ignore
//! use docspace::query::{where_field, Query, SortOrder};
//!
//! let query = Query::new(where_field("age").gte(18).and(where_field("active").is_true()))
//!     .with_sort("name", SortOrder::Ascending)
//!     .limit(10);
//! ```

use bson::{Bson, Document};
use regex::Regex;

use crate::error::{Result, StoreError};
use std::cmp::Ordering;
use std::fmt;

/// Scan consistency for predicate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanConsistency {
    /// Eventually consistent: indexes may lag recent writes.
    #[default]
    NotBounded,
    /// Read-your-writes: wait for indexes to catch up with the request.
    RequestPlus,
}

impl ScanConsistency {
    /// Parse the connection-string spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "notBounded" | "not_bounded" => Some(ScanConsistency::NotBounded),
            "requestPlus" | "request_plus" => Some(ScanConsistency::RequestPlus),
            _ => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A predicate expression over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Field equals value.
    Eq(String, Bson),
    /// Field differs from value.
    Ne(String, Bson),
    /// Field greater than value.
    Gt(String, Bson),
    /// Field greater than or equal to value.
    Gte(String, Bson),
    /// Field less than value.
    Lt(String, Bson),
    /// Field less than or equal to value.
    Lte(String, Bson),
    /// Field within the inclusive range.
    Between(String, Bson, Bson),
    /// Field equals one of the values.
    In(String, Vec<Bson>),
    /// Field equals none of the values.
    NotIn(String, Vec<Bson>),
    /// String field matches a `%`/`_` wildcard pattern.
    Like(String, LikePattern),
    /// String field starts with the prefix.
    StartsWith(String, String),
    /// String field ends with the suffix.
    EndsWith(String, String),
    /// String field contains the substring, or array field contains the value.
    Contains(String, Bson),
    /// Field is null or missing.
    IsNull(String),
    /// Field is present and not null.
    IsNotNull(String),
    /// Field is present (possibly null).
    Exists(String),
    /// Field is boolean true.
    IsTrue(String),
    /// Field is boolean false.
    IsFalse(String),
    /// All sub-criteria hold.
    And(Vec<Criteria>),
    /// Any sub-criterion holds.
    Or(Vec<Criteria>),
    /// Negation.
    Not(Box<Criteria>),
}

/// Start a criteria expression on a field.
pub fn where_field(field: impl Into<String>) -> FieldCriteria {
    FieldCriteria {
        field: field.into(),
    }
}

/// A field awaiting its comparison.
#[derive(Debug, Clone)]
pub struct FieldCriteria {
    field: String,
}

impl FieldCriteria {
    pub fn eq(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Eq(self.field, value.into())
    }

    pub fn ne(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Ne(self.field, value.into())
    }

    pub fn gt(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Gt(self.field, value.into())
    }

    pub fn gte(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Gte(self.field, value.into())
    }

    pub fn lt(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Lt(self.field, value.into())
    }

    pub fn lte(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Lte(self.field, value.into())
    }

    pub fn between(self, low: impl Into<Bson>, high: impl Into<Bson>) -> Criteria {
        Criteria::Between(self.field, low.into(), high.into())
    }

    pub fn in_values<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> Criteria {
        Criteria::In(self.field, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> Criteria {
        Criteria::NotIn(self.field, values.into_iter().map(Into::into).collect())
    }

    pub fn like(self, pattern: impl Into<String>) -> Criteria {
        Criteria::Like(self.field, LikePattern::new(pattern))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Criteria {
        Criteria::StartsWith(self.field, prefix.into())
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Criteria {
        Criteria::EndsWith(self.field, suffix.into())
    }

    pub fn contains(self, value: impl Into<Bson>) -> Criteria {
        Criteria::Contains(self.field, value.into())
    }

    pub fn is_null(self) -> Criteria {
        Criteria::IsNull(self.field)
    }

    pub fn is_not_null(self) -> Criteria {
        Criteria::IsNotNull(self.field)
    }

    pub fn exists(self) -> Criteria {
        Criteria::Exists(self.field)
    }

    pub fn is_true(self) -> Criteria {
        Criteria::IsTrue(self.field)
    }

    pub fn is_false(self) -> Criteria {
        Criteria::IsFalse(self.field)
    }
}

impl Criteria {
    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Criteria) -> Criteria {
        match self {
            Criteria::And(mut parts) => {
                parts.push(other);
                Criteria::And(parts)
            }
            first => Criteria::And(vec![first, other]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Criteria) -> Criteria {
        match self {
            Criteria::Or(mut parts) => {
                parts.push(other);
                Criteria::Or(parts)
            }
            first => Criteria::Or(vec![first, other]),
        }
    }

    /// Negate this criteria.
    pub fn not(self) -> Criteria {
        Criteria::Not(Box::new(self))
    }

    /// Evaluate the criteria against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Criteria::Eq(field, value) => lookup(doc, field).is_some_and(|v| bson_eq(v, value)),
            Criteria::Ne(field, value) => !lookup(doc, field).is_some_and(|v| bson_eq(v, value)),
            Criteria::Gt(field, value) => compare_field(doc, field, value) == Some(Ordering::Greater),
            Criteria::Gte(field, value) => matches!(
                compare_field(doc, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Criteria::Lt(field, value) => compare_field(doc, field, value) == Some(Ordering::Less),
            Criteria::Lte(field, value) => matches!(
                compare_field(doc, field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Criteria::Between(field, low, high) => {
                matches!(
                    compare_field(doc, field, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_field(doc, field, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Criteria::In(field, values) => lookup(doc, field)
                .is_some_and(|v| values.iter().any(|candidate| bson_eq(v, candidate))),
            Criteria::NotIn(field, values) => !lookup(doc, field)
                .is_some_and(|v| values.iter().any(|candidate| bson_eq(v, candidate))),
            Criteria::Like(field, pattern) => {
                string_field(doc, field).is_some_and(|s| pattern.is_match(s))
            }
            Criteria::StartsWith(field, prefix) => {
                string_field(doc, field).is_some_and(|s| s.starts_with(prefix.as_str()))
            }
            Criteria::EndsWith(field, suffix) => {
                string_field(doc, field).is_some_and(|s| s.ends_with(suffix.as_str()))
            }
            Criteria::Contains(field, value) => match (lookup(doc, field), value) {
                (Some(Bson::String(s)), Bson::String(needle)) => s.contains(needle.as_str()),
                (Some(Bson::Array(items)), needle) => items.iter().any(|item| bson_eq(item, needle)),
                _ => false,
            },
            Criteria::IsNull(field) => matches!(lookup(doc, field), None | Some(Bson::Null)),
            Criteria::IsNotNull(field) => !matches!(lookup(doc, field), None | Some(Bson::Null)),
            Criteria::Exists(field) => lookup(doc, field).is_some(),
            Criteria::IsTrue(field) => matches!(lookup(doc, field), Some(Bson::Boolean(true))),
            Criteria::IsFalse(field) => matches!(lookup(doc, field), Some(Bson::Boolean(false))),
            Criteria::And(parts) => parts.iter().all(|c| c.matches(doc)),
            Criteria::Or(parts) => parts.iter().any(|c| c.matches(doc)),
            Criteria::Not(inner) => !inner.matches(doc),
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, parts: &[Criteria], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{part}")?;
            }
            f.write_str(")")
        }

        match self {
            Criteria::Eq(field, v) => write!(f, "{field} = {v}"),
            Criteria::Ne(field, v) => write!(f, "{field} != {v}"),
            Criteria::Gt(field, v) => write!(f, "{field} > {v}"),
            Criteria::Gte(field, v) => write!(f, "{field} >= {v}"),
            Criteria::Lt(field, v) => write!(f, "{field} < {v}"),
            Criteria::Lte(field, v) => write!(f, "{field} <= {v}"),
            Criteria::Between(field, low, high) => write!(f, "{field} BETWEEN {low} AND {high}"),
            Criteria::In(field, values) => write!(f, "{field} IN {}", Bson::Array(values.clone())),
            Criteria::NotIn(field, values) => {
                write!(f, "{field} NOT IN {}", Bson::Array(values.clone()))
            }
            Criteria::Like(field, p) => write!(f, "{field} LIKE \"{p}\""),
            Criteria::StartsWith(field, p) => write!(f, "{field} LIKE \"{p}%\""),
            Criteria::EndsWith(field, p) => write!(f, "{field} LIKE \"%{p}\""),
            Criteria::Contains(field, v) => write!(f, "CONTAINS({field}, {v})"),
            Criteria::IsNull(field) => write!(f, "{field} IS NULL"),
            Criteria::IsNotNull(field) => write!(f, "{field} IS NOT NULL"),
            Criteria::Exists(field) => write!(f, "{field} IS NOT MISSING"),
            Criteria::IsTrue(field) => write!(f, "{field} = true"),
            Criteria::IsFalse(field) => write!(f, "{field} = false"),
            Criteria::And(parts) => join(f, parts, "AND"),
            Criteria::Or(parts) => join(f, parts, "OR"),
            Criteria::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pageable {
    /// Page number, starting at 0.
    pub page: u64,
    /// Page size.
    pub size: u64,
}

impl Pageable {
    /// Create a page request.
    pub fn of(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    /// Number of elements before this page, saturating at `u64::MAX`.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// Number of elements before this page, or `None` when it overflows.
    pub fn checked_offset(&self) -> Option<u64> {
        self.page.checked_mul(self.size)
    }

    /// Fail with `InvalidArgument` when the offset does not fit in a `u64`.
    pub(crate) fn validate(&self) -> Result<()> {
        match self.checked_offset() {
            Some(_) => Ok(()),
            None => Err(StoreError::invalid_argument(format!(
                "page {} of size {} is out of range",
                self.page, self.size
            ))),
        }
    }

    /// The following page.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            size: self.size,
        }
    }
}

/// A window of results plus the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub content: Vec<T>,
    /// The request this page answers.
    pub pageable: Pageable,
    /// Number of matches across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` elements.
    pub fn total_pages(&self) -> u64 {
        if self.pageable.size == 0 {
            return if self.total == 0 { 0 } else { 1 };
        }
        self.total.div_ceil(self.pageable.size)
    }

    /// Whether another page follows.
    pub fn has_next(&self) -> bool {
        self.pageable.page.saturating_add(1) < self.total_pages()
    }

    /// Transform the page content.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total: self.total,
        }
    }
}

/// A predicate plus its modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter; `None` matches every document.
    pub criteria: Option<Criteria>,
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortOrder)>,
    /// Number of matches to skip.
    pub skip: Option<u64>,
    /// Maximum number of matches to return.
    pub limit: Option<u64>,
    /// Requested scan consistency.
    pub consistency: Option<ScanConsistency>,
}

impl Query {
    /// Query with the given criteria.
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria: Some(criteria),
            ..Self::default()
        }
    }

    /// Query matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add criteria with AND.
    pub fn and(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(match self.criteria.take() {
            Some(existing) => existing.and(criteria),
            None => criteria,
        });
        self
    }

    /// Append a sort key.
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    /// Skip matches.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Limit matches.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restrict to a page window.
    pub fn with_pageable(mut self, pageable: Pageable) -> Self {
        self.skip = Some(pageable.offset());
        self.limit = Some(pageable.size);
        self
    }

    /// Set the scan consistency.
    pub fn with_consistency(mut self, consistency: ScanConsistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// The same predicate without skip/limit, for total counts.
    pub fn unpaged(&self) -> Self {
        Self {
            skip: None,
            limit: None,
            ..self.clone()
        }
    }

    /// Whether a document satisfies the predicate.
    pub fn matches(&self, doc: &Document) -> bool {
        self.criteria.as_ref().map_or(true, |c| c.matches(doc))
    }

    /// Order two documents by the sort keys.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.sort {
            let ordering = match (lookup(a, field), lookup(b, field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_bson(x, y).unwrap_or(Ordering::Equal),
            };
            let ordering = match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.criteria {
            Some(criteria) => write!(f, "WHERE {criteria}")?,
            None => f.write_str("WHERE true")?,
        }
        if !self.sort.is_empty() {
            f.write_str(" ORDER BY ")?;
            for (i, (field, order)) in self.sort.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                let dir = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                write!(f, "{field} {dir}")?;
            }
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(skip) = self.skip {
            write!(f, " OFFSET {skip}")?;
        }
        Ok(())
    }
}

/// Resolve a dotted path inside a document.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn string_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    match lookup(doc, field) {
        Some(Bson::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn compare_field(doc: &Document, field: &str, value: &Bson) -> Option<Ordering> {
    compare_bson(lookup(doc, field)?, value)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// A `LIKE` pattern compiled once into an anchored regex.
///
/// `%` matches any run of characters and `_` exactly one; everything else is
/// literal. A pattern that fails to compile matches nothing.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Option<Regex>,
}

impl LikePattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut translated = String::with_capacity(source.len() + 8);
        translated.push_str("(?s)^");
        let mut literal = String::new();
        for c in source.chars() {
            match c {
                '%' | '_' => {
                    translated.push_str(&regex::escape(&literal));
                    literal.clear();
                    translated.push_str(if c == '%' { ".*" } else { "." });
                }
                c => literal.push(c),
            }
        }
        translated.push_str(&regex::escape(&literal));
        translated.push('$');

        let regex = match Regex::new(&translated) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern = %source, error = %e, "invalid LIKE pattern");
                None
            }
        };
        Self { source, regex }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(text))
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
