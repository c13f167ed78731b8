//! Query derivation from method names.
//!
//! A name such as `findTop3ByCountryAndRatingGreaterThanOrderByNameAsc` is
//! split into a subject (`find`, limited to 3), a predicate of `Or`-joined
//! groups of `And`-joined parts, and a sort. Binding parameters to the parts
//! produces a [`Query`].

use bson::Bson;

use crate::error::{Result, StoreError};
use crate::query::{where_field, Criteria, Query, SortOrder};

const FIND_PREFIXES: &[&str] = &["find", "read", "get", "query", "search", "stream"];

/// What a derived method does with its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Return matches.
    Find,
    /// Count matches.
    Count,
    /// Check whether anything matches.
    Exists,
    /// Remove matches.
    Delete,
}

/// Comparison applied by one predicate part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    In,
    NotIn,
    Like,
    NotLike,
    StartingWith,
    EndingWith,
    Containing,
    IsNull,
    IsNotNull,
    True,
    False,
    Exists,
}

// longest keyword first so `NotIn` wins over `In` and `IsNotNull` over `NotNull`
const KEYWORDS: &[(&str, Operator)] = &[
    ("GreaterThanEqual", Operator::GreaterThanEqual),
    ("LessThanEqual", Operator::LessThanEqual),
    ("StartingWith", Operator::StartingWith),
    ("GreaterThan", Operator::GreaterThan),
    ("EndingWith", Operator::EndingWith),
    ("Containing", Operator::Containing),
    ("IsNotNull", Operator::IsNotNull),
    ("StartsWith", Operator::StartingWith),
    ("EndsWith", Operator::EndingWith),
    ("LessThan", Operator::LessThan),
    ("Contains", Operator::Containing),
    ("NotNull", Operator::IsNotNull),
    ("NotLike", Operator::NotLike),
    ("Between", Operator::Between),
    ("IsFalse", Operator::False),
    ("Equals", Operator::Equals),
    ("IsNull", Operator::IsNull),
    ("IsTrue", Operator::True),
    ("Before", Operator::LessThan),
    ("Exists", Operator::Exists),
    ("After", Operator::GreaterThan),
    ("False", Operator::False),
    ("NotIn", Operator::NotIn),
    ("IsNot", Operator::NotEquals),
    ("Null", Operator::IsNull),
    ("Like", Operator::Like),
    ("True", Operator::True),
    ("Not", Operator::NotEquals),
    ("In", Operator::In),
    ("Is", Operator::Equals),
];

impl Operator {
    /// Number of parameters the operator consumes.
    pub fn arity(self) -> usize {
        match self {
            Operator::Between => 2,
            Operator::IsNull
            | Operator::IsNotNull
            | Operator::True
            | Operator::False
            | Operator::Exists => 0,
            _ => 1,
        }
    }
}

/// One `property operator` part of a derived predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Dotted document path.
    pub property: String,
    pub operator: Operator,
}

impl Part {
    fn parse(source: &str) -> Result<Self> {
        let (property, operator) = KEYWORDS
            .iter()
            .find_map(|(keyword, operator)| {
                source
                    .strip_suffix(keyword)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest, *operator))
            })
            .unwrap_or((source, Operator::Equals));
        // `AgeIsGreaterThan` reads the same as `AgeGreaterThan`
        let property = property
            .strip_suffix("Is")
            .filter(|rest| !rest.is_empty())
            .unwrap_or(property);

        Ok(Self {
            property: property_path(property)?,
            operator,
        })
    }

    fn bind(&self, params: &mut std::slice::Iter<'_, Bson>) -> Result<Criteria> {
        let mut next = || {
            params.next().cloned().ok_or_else(|| {
                StoreError::QueryDerivation(format!("missing parameter for `{}`", self.property))
            })
        };
        let field = || where_field(self.property.clone());

        Ok(match self.operator {
            Operator::Equals => field().eq(next()?),
            Operator::NotEquals => field().ne(next()?),
            Operator::GreaterThan => field().gt(next()?),
            Operator::GreaterThanEqual => field().gte(next()?),
            Operator::LessThan => field().lt(next()?),
            Operator::LessThanEqual => field().lte(next()?),
            Operator::Between => {
                let low = next()?;
                let high = next()?;
                field().between(low, high)
            }
            Operator::In => field().in_values(values(next()?)),
            Operator::NotIn => field().not_in(values(next()?)),
            Operator::Like => field().like(self.text(next()?)?),
            Operator::NotLike => field().like(self.text(next()?)?).not(),
            Operator::StartingWith => field().starts_with(self.text(next()?)?),
            Operator::EndingWith => field().ends_with(self.text(next()?)?),
            Operator::Containing => field().contains(next()?),
            Operator::IsNull => field().is_null(),
            Operator::IsNotNull => field().is_not_null(),
            Operator::True => field().is_true(),
            Operator::False => field().is_false(),
            Operator::Exists => field().exists(),
        })
    }

    fn text(&self, value: Bson) -> Result<String> {
        match value {
            Bson::String(s) => Ok(s),
            other => Err(StoreError::QueryDerivation(format!(
                "`{}` expects a string, got {other}",
                self.property
            ))),
        }
    }
}

fn values(value: Bson) -> Vec<Bson> {
    match value {
        Bson::Array(items) => items,
        single => vec![single],
    }
}

/// A parsed method name.
///
/// # Example
///
/// ```ignore
/// let tree = PartTree::parse("findByCountryAndFleetGreaterThan")?;
/// let query = tree.bind(&[Bson::from("France"), Bson::from(10)])?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTree {
    subject: Subject,
    distinct: bool,
    limit: Option<u64>,
    predicate: Vec<Vec<Part>>,
    sort: Vec<(String, SortOrder)>,
}

impl PartTree {
    /// Parse a method name.
    pub fn parse(name: &str) -> Result<Self> {
        let (subject, rest) = parse_subject(name)?;

        let (head, body) = match find_keyword(rest, "By", 0) {
            // `findAllOrderByName`: the first `By` belongs to the sort
            Some(at) if rest[..at].ends_with("Order") => {
                let order = at - "Order".len();
                (&rest[..order], &rest[order..])
            }
            Some(at) => (&rest[..at], &rest[at + 2..]),
            None => (rest, ""),
        };
        let (distinct, limit) = parse_head(head)?;

        let (predicate_src, order_src) = match find_keyword(body, "OrderBy", 0) {
            Some(at) => (&body[..at], Some(&body[at + "OrderBy".len()..])),
            None => (body, None),
        };

        let predicate = if predicate_src.is_empty() {
            Vec::new()
        } else {
            split_keyword(predicate_src, "Or")
                .into_iter()
                .map(|group| {
                    split_keyword(group, "And")
                        .into_iter()
                        .map(Part::parse)
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?
        };
        let sort = match order_src {
            Some(src) => parse_order(src)?,
            None => Vec::new(),
        };

        Ok(Self {
            subject,
            distinct,
            limit,
            predicate,
            sort,
        })
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Limit from a `First<N>`/`Top<N>` subject.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Whether the subject limits the result (`First`, `Top`).
    pub fn is_limiting(&self) -> bool {
        self.limit.is_some()
    }

    /// Predicate parts, `Or` of `And` groups.
    pub fn parts(&self) -> &[Vec<Part>] {
        &self.predicate
    }

    /// Total number of parameters the predicate consumes.
    pub fn arity(&self) -> usize {
        self.predicate
            .iter()
            .flatten()
            .map(|part| part.operator.arity())
            .sum()
    }

    /// Bind parameters in declaration order.
    pub fn bind(&self, params: &[Bson]) -> Result<Query> {
        if params.len() != self.arity() {
            return Err(StoreError::QueryDerivation(format!(
                "expected {} parameter(s), got {}",
                self.arity(),
                params.len()
            )));
        }

        let mut iter = params.iter();
        let mut criteria: Option<Criteria> = None;
        for group in &self.predicate {
            let mut conjunction: Option<Criteria> = None;
            for part in group {
                let bound = part.bind(&mut iter)?;
                conjunction = Some(match conjunction {
                    Some(existing) => existing.and(bound),
                    None => bound,
                });
            }
            if let Some(conjunction) = conjunction {
                criteria = Some(match criteria {
                    Some(existing) => existing.or(conjunction),
                    None => conjunction,
                });
            }
        }

        let mut query = criteria.map_or_else(Query::all, Query::new);
        for (field, order) in &self.sort {
            query = query.with_sort(field.clone(), *order);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        Ok(query)
    }
}

fn parse_subject(name: &str) -> Result<(Subject, &str)> {
    let candidates = FIND_PREFIXES
        .iter()
        .map(|p| (*p, Subject::Find))
        .chain([
            ("count", Subject::Count),
            ("exists", Subject::Exists),
            ("delete", Subject::Delete),
            ("remove", Subject::Delete),
        ]);
    for (prefix, subject) in candidates {
        if let Some(rest) = name.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Ok((subject, rest));
            }
        }
    }
    Err(StoreError::QueryDerivation(format!(
        "`{name}` does not start with a query subject"
    )))
}

fn parse_head(head: &str) -> Result<(bool, Option<u64>)> {
    let distinct = head.contains("Distinct");
    let mut limit = None;
    for keyword in ["First", "Top"] {
        if let Some(at) = find_keyword(head, keyword, 0) {
            let digits: String = head[at + keyword.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            let n = if digits.is_empty() {
                1
            } else {
                digits.parse().map_err(|_| {
                    StoreError::QueryDerivation(format!("bad limit in `{head}`"))
                })?
            };
            limit = Some(n);
            break;
        }
    }
    Ok((distinct, limit))
}

fn parse_order(src: &str) -> Result<Vec<(String, SortOrder)>> {
    let mut sort = Vec::new();
    let mut rest = src;
    while !rest.is_empty() {
        let asc = find_keyword(rest, "Asc", 1);
        let desc = find_keyword(rest, "Desc", 1);
        let (at, len, order) = match (asc, desc) {
            (Some(a), Some(d)) if d < a => (d, 4, SortOrder::Descending),
            (Some(a), _) => (a, 3, SortOrder::Ascending),
            (None, Some(d)) => (d, 4, SortOrder::Descending),
            (None, None) => (rest.len(), 0, SortOrder::Ascending),
        };
        sort.push((property_path(&rest[..at])?, order));
        rest = &rest[at + len..];
    }
    Ok(sort)
}

/// Position of `keyword` at or after `from` that ends a camel-case word
/// boundary: followed by an uppercase letter, a digit or the end.
fn find_keyword(s: &str, keyword: &str, from: usize) -> Option<usize> {
    let mut start = from;
    while let Some(offset) = s.get(start..)?.find(keyword) {
        let at = start + offset;
        let after = &s[at + keyword.len()..];
        if after.is_empty() || after.starts_with(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Some(at);
        }
        start = at + 1;
    }
    None
}

/// Split on `keyword` where it starts a new word and another word follows.
fn split_keyword<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut begin = 0;
    let mut from = 1;
    while let Some(at) = find_keyword(s, keyword, from) {
        if at + keyword.len() == s.len() {
            break;
        }
        parts.push(&s[begin..at]);
        begin = at + keyword.len();
        from = begin + 1;
    }
    parts.push(&s[begin..]);
    parts
}

/// `Hq_City` becomes `hq.city`; `FleetSize` becomes `fleetSize`.
fn property_path(source: &str) -> Result<String> {
    if source.is_empty() {
        return Err(StoreError::QueryDerivation("empty property name".to_string()));
    }
    let segments: Vec<String> = source
        .split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if segments.iter().any(String::is_empty) {
        return Err(StoreError::QueryDerivation(format!(
            "malformed property path `{source}`"
        )));
    }
    Ok(segments.join("."))
}
