//! Execution strategies for declared query methods.
//!
//! A [`QueryMethod`] describes a method statically: its name, the shape it
//! returns and whether it counts, checks existence or deletes. That
//! description selects exactly one [`ExecutionStrategy`], once, when the
//! method is registered.

use crate::cursor::Cursor;
use crate::derive::{PartTree, Subject};
use crate::entity::Entity;
use crate::error::{Result, StoreError};
use crate::operation::OperationSpec;
use crate::ops::{Builder, FindByQuery, Matched, RemoveByQuery};
use crate::options::QueryOptions;
use crate::query::{Page, Pageable, Query, ScanConsistency};
use crate::result::{BatchOutcome, RemoveResult};
use crate::template::Template;

/// What a query method hands back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// Exactly one value.
    Single,
    /// Zero or one value.
    Optional,
    /// A finite sequence.
    Collection,
    /// A lazy sequence; `tailable` keeps it open for later writes.
    Stream {
        /// Keep streaming matching writes after the initial results.
        tailable: bool,
    },
    /// A page window plus the total count.
    Page,
    /// A number.
    Count,
    /// A boolean.
    Exists,
}

/// Static description of a declared query method.
///
/// # Example
///
/// ```ignore
/// let method = QueryMethod::new("findByCountry", ReturnShape::Collection)
///     .with_consistency(ScanConsistency::RequestPlus)
///     .in_collection("airline");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMethod {
    name: String,
    shape: ReturnShape,
    count: bool,
    exists: bool,
    delete: bool,
    limiting: bool,
    consistency: Option<ScanConsistency>,
    collection: Option<String>,
    query: Option<Query>,
}

impl QueryMethod {
    /// Describe a method by name and return shape.
    pub fn new(name: impl Into<String>, shape: ReturnShape) -> Self {
        Self {
            name: name.into(),
            shape,
            count: matches!(shape, ReturnShape::Count),
            exists: matches!(shape, ReturnShape::Exists),
            delete: false,
            limiting: false,
            consistency: None,
            collection: None,
            query: None,
        }
    }

    /// Declare a count query.
    pub fn count_query(mut self) -> Self {
        self.count = true;
        self
    }

    /// Declare an existence query.
    pub fn exists_query(mut self) -> Self {
        self.exists = true;
        self
    }

    /// Declare a delete query.
    pub fn delete_query(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Require a scan consistency, overriding the query's.
    pub fn with_consistency(mut self, consistency: ScanConsistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Run against a specific collection.
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Use an explicit query instead of deriving one from the name.
    pub fn with_query(mut self, query: Query) -> Self {
        self.limiting = query.limit.is_some();
        self.query = Some(query);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> ReturnShape {
        self.shape
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    pub fn is_exists(&self) -> bool {
        self.exists
    }

    pub fn is_delete(&self) -> bool {
        self.delete
    }

    /// Whether the method returns only the top matches.
    pub fn is_limiting(&self) -> bool {
        self.limiting
    }

    pub fn consistency(&self) -> Option<ScanConsistency> {
        self.consistency
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Parse the name unless an explicit query is set, folding the derived
    /// subject and limit into the flags.
    pub(crate) fn derive(mut self) -> Result<(Self, Option<PartTree>)> {
        if self.query.is_some() {
            return Ok((self, None));
        }
        let tree = PartTree::parse(&self.name)?;
        if tree.is_distinct() {
            return Err(StoreError::QueryDerivation(format!(
                "`{}` asks for distinct results, which are not supported",
                self.name
            )));
        }
        match tree.subject() {
            Subject::Count => self.count = true,
            Subject::Exists => self.exists = true,
            Subject::Delete => self.delete = true,
            Subject::Find => {}
        }
        self.limiting |= tree.is_limiting();
        Ok((self, Some(tree)))
    }
}

/// How a query method runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStrategy {
    /// Remove matches.
    Delete,
    /// Stream matches and keep following later writes.
    Streaming,
    /// Fetch every match.
    Collection,
    /// Count matches.
    Count,
    /// Check whether anything matches.
    Exists,
    /// Fetch one page and the total count.
    Paged,
    /// Take the first match of a limited query.
    First,
    /// Expect exactly one match.
    Single,
}

impl ExecutionStrategy {
    /// Pick the strategy for a method, first match wins:
    /// delete, tailable stream, collection, count, exists, page, then the
    /// single-result default.
    ///
    /// A method that is both a count and an exists query is ambiguous and
    /// rejected. Delete wins over either; its shape picks what is returned.
    pub fn select(method: &QueryMethod) -> Result<Self> {
        if method.count && method.exists {
            return Err(StoreError::AmbiguousQuery(format!(
                "`{}` is declared as both count and exists",
                method.name
            )));
        }

        Ok(if method.delete {
            ExecutionStrategy::Delete
        } else if matches!(method.shape, ReturnShape::Stream { tailable: true }) {
            ExecutionStrategy::Streaming
        } else if matches!(
            method.shape,
            ReturnShape::Collection | ReturnShape::Stream { tailable: false }
        ) {
            ExecutionStrategy::Collection
        } else if method.count {
            ExecutionStrategy::Count
        } else if method.exists {
            ExecutionStrategy::Exists
        } else if method.shape == ReturnShape::Page {
            ExecutionStrategy::Paged
        } else if method.limiting {
            ExecutionStrategy::First
        } else {
            ExecutionStrategy::Single
        })
    }

    /// Run `query` for `method` and shape the result.
    pub(crate) async fn execute<T: Entity>(
        self,
        template: &Template,
        method: &QueryMethod,
        query: Query,
        pageable: Option<Pageable>,
    ) -> Result<QueryOutput<T>> {
        let query = match method.consistency {
            Some(consistency) => query.with_consistency(consistency),
            None => query,
        };
        let mut spec = OperationSpec::<QueryOptions>::new().with_query(query.clone());
        if let Some(collection) = &method.collection {
            spec = spec.with_collection(collection.clone());
        }
        let find = Builder::<FindByQuery<T>, Matched>::from_spec(template.clone(), spec.clone());
        tracing::debug!(method = %method.name, strategy = ?self, query = %query, "executing query method");

        match self {
            ExecutionStrategy::Delete => {
                let remove = Builder::<RemoveByQuery<T>, Matched>::from_spec(template.clone(), spec);
                let removed = remove.all().await?;
                let count = removed.successes().count() as u64;
                Ok(match method.shape {
                    ReturnShape::Count => QueryOutput::Count(count),
                    ReturnShape::Exists => QueryOutput::Exists(count > 0),
                    _ => QueryOutput::Removed(removed),
                })
            }
            ExecutionStrategy::Streaming => Ok(QueryOutput::Stream(find.tail().await?)),
            ExecutionStrategy::Collection => {
                let find = match pageable {
                    Some(pageable) => {
                        pageable.validate()?;
                        Builder::<FindByQuery<T>, Matched>::from_spec(
                            template.clone(),
                            spec.with_query(query.with_pageable(pageable)),
                        )
                    }
                    None => find,
                };
                match method.shape {
                    ReturnShape::Stream { .. } => Ok(QueryOutput::Stream(find.stream().await?)),
                    _ => Ok(QueryOutput::Many(find.all().await?)),
                }
            }
            ExecutionStrategy::Count => Ok(QueryOutput::Count(find.count().await?)),
            ExecutionStrategy::Exists => Ok(QueryOutput::Exists(find.exists().await?)),
            ExecutionStrategy::Paged => {
                let pageable = pageable.ok_or_else(|| {
                    StoreError::invalid_argument(format!(
                        "`{}` returns a page and needs a page request",
                        method.name
                    ))
                })?;
                Ok(QueryOutput::Page(find.page(pageable).await?))
            }
            ExecutionStrategy::First => {
                let first = find.first().await?;
                shape_single(method, first, &query)
            }
            ExecutionStrategy::Single => match find.one().await {
                Ok(value) => shape_single(method, Some(value), &query),
                Err(e) if e.is_not_found() => shape_single(method, None, &query),
                Err(e) => Err(e),
            },
        }
    }
}

fn shape_single<T>(method: &QueryMethod, value: Option<T>, query: &Query) -> Result<QueryOutput<T>> {
    match (method.shape, value) {
        (ReturnShape::Optional, value) => Ok(QueryOutput::Optional(value)),
        (_, Some(value)) => Ok(QueryOutput::Single(value)),
        (_, None) => Err(StoreError::not_found(query.to_string())),
    }
}

/// Result of running a query method.
#[derive(Debug)]
pub enum QueryOutput<T> {
    Single(T),
    Optional(Option<T>),
    Many(Vec<T>),
    Count(u64),
    Exists(bool),
    Page(Page<T>),
    Removed(BatchOutcome<RemoveResult>),
    Stream(Cursor<T>),
}

impl<T> QueryOutput<T> {
    pub fn into_single(self) -> Option<T> {
        match self {
            QueryOutput::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_optional(self) -> Option<Option<T>> {
        match self {
            QueryOutput::Optional(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<T>> {
        match self {
            QueryOutput::Many(values) => Some(values),
            _ => None,
        }
    }

    pub fn into_count(self) -> Option<u64> {
        match self {
            QueryOutput::Count(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_exists(self) -> Option<bool> {
        match self {
            QueryOutput::Exists(found) => Some(found),
            _ => None,
        }
    }

    pub fn into_page(self) -> Option<Page<T>> {
        match self {
            QueryOutput::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn into_removed(self) -> Option<BatchOutcome<RemoveResult>> {
        match self {
            QueryOutput::Removed(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<Cursor<T>> {
        match self {
            QueryOutput::Stream(cursor) => Some(cursor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(method: QueryMethod) -> Result<ExecutionStrategy> {
        let (method, _) = method.derive()?;
        ExecutionStrategy::select(&method)
    }

    #[test]
    fn test_select_priority() {
        let cases = [
            (QueryMethod::new("deleteByName", ReturnShape::Collection), ExecutionStrategy::Delete),
            (
                QueryMethod::new("findByName", ReturnShape::Stream { tailable: true }),
                ExecutionStrategy::Streaming,
            ),
            (
                QueryMethod::new("findByName", ReturnShape::Stream { tailable: false }),
                ExecutionStrategy::Collection,
            ),
            (QueryMethod::new("countByName", ReturnShape::Collection), ExecutionStrategy::Collection),
            (QueryMethod::new("countByName", ReturnShape::Single), ExecutionStrategy::Count),
            (QueryMethod::new("findByName", ReturnShape::Count), ExecutionStrategy::Count),
            (QueryMethod::new("existsByName", ReturnShape::Single), ExecutionStrategy::Exists),
            (QueryMethod::new("findByName", ReturnShape::Page), ExecutionStrategy::Paged),
            (QueryMethod::new("findFirstByName", ReturnShape::Single), ExecutionStrategy::First),
            (QueryMethod::new("findByName", ReturnShape::Optional), ExecutionStrategy::Single),
        ];
        for (method, expected) in cases {
            let name = method.name().to_string();
            assert_eq!(select(method).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn test_select_is_deterministic() {
        let method = QueryMethod::new("findTop5ByName", ReturnShape::Single);
        assert_eq!(select(method.clone()).unwrap(), select(method).unwrap());
    }

    #[test]
    fn test_select_rejects_ambiguous() {
        let err = select(QueryMethod::new("countByName", ReturnShape::Single).exists_query()).unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousQuery(_)));

        let err = select(QueryMethod::new("findByName", ReturnShape::Count).exists_query()).unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousQuery(_)));
    }

    #[test]
    fn test_delete_wins_over_count_and_exists() {
        let strategy = select(QueryMethod::new("deleteByName", ReturnShape::Count)).unwrap();
        assert_eq!(strategy, ExecutionStrategy::Delete);

        let strategy = select(QueryMethod::new("removeByName", ReturnShape::Exists)).unwrap();
        assert_eq!(strategy, ExecutionStrategy::Delete);

        let strategy = select(QueryMethod::new("findByName", ReturnShape::Single).delete_query().count_query()).unwrap();
        assert_eq!(strategy, ExecutionStrategy::Delete);
    }

    #[test]
    fn test_distinct_is_rejected() {
        let err = select(QueryMethod::new("findDistinctByName", ReturnShape::Collection)).unwrap_err();
        assert!(matches!(err, StoreError::QueryDerivation(_)));
    }

    #[test]
    fn test_explicit_query_skips_derivation() {
        let method = QueryMethod::new("airlinesInFrance", ReturnShape::Single)
            .with_query(Query::all().limit(1));
        let (method, tree) = method.derive().unwrap();
        assert!(tree.is_none());
        assert!(method.is_limiting());
        assert_eq!(ExecutionStrategy::select(&method).unwrap(), ExecutionStrategy::First);
    }

    #[test]
    fn test_unparseable_name_without_query() {
        let err = select(QueryMethod::new("airlinesInFrance", ReturnShape::Single)).unwrap_err();
        assert!(matches!(err, StoreError::QueryDerivation(_)));
    }
}
