//! Registry of declared query methods.
//!
//! Methods are parsed and assigned a strategy when registered; the built
//! registry is immutable and can be shared across tasks.

use std::collections::HashMap;

use bson::Bson;

use crate::derive::PartTree;
use crate::entity::Entity;
use crate::error::{Result, StoreError};
use crate::execution::{ExecutionStrategy, QueryMethod, QueryOutput};
use crate::query::{Pageable, Query};
use crate::template::Template;

#[derive(Debug, Clone)]
struct Registered {
    method: QueryMethod,
    tree: Option<PartTree>,
    strategy: ExecutionStrategy,
}

impl Registered {
    fn query(&self, params: &[Bson]) -> Result<Query> {
        match (&self.tree, self.method.query()) {
            (Some(tree), _) => tree.bind(params),
            (None, Some(query)) if params.is_empty() => Ok(query.clone()),
            (None, Some(_)) => Err(StoreError::QueryDerivation(format!(
                "`{}` has an explicit query and takes no parameters, got {}",
                self.method.name(),
                params.len()
            ))),
            (None, None) => Err(StoreError::Internal(format!(
                "`{}` has neither a derived nor an explicit query",
                self.method.name()
            ))),
        }
    }
}

/// Immutable table of query methods keyed by name.
///
/// # Example
///
/// ```ignore
/// let registry = QueryRegistry::builder()
///     .register(QueryMethod::new("findByCountry", ReturnShape::Collection))?
///     .register(QueryMethod::new("countByCountry", ReturnShape::Count))?
///     .build();
///
/// let french = registry
///     .execute::<Airline>(&template, "findByCountry", &["France".into()], None)
///     .await?
///     .into_many();
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    methods: HashMap<String, Registered>,
}

/// Builder for [`QueryRegistry`].
#[derive(Debug, Default)]
pub struct QueryRegistryBuilder {
    methods: HashMap<String, Registered>,
}

impl QueryRegistryBuilder {
    /// Register a method, deriving its query and selecting its strategy.
    ///
    /// Fails on a duplicate name, an unparseable or distinct name without an
    /// explicit query, or a method that is both count and exists.
    pub fn register(mut self, method: QueryMethod) -> Result<Self> {
        if self.methods.contains_key(method.name()) {
            return Err(StoreError::invalid_argument(format!(
                "query method `{}` is already registered",
                method.name()
            )));
        }
        let (method, tree) = method.derive()?;
        let strategy = ExecutionStrategy::select(&method)?;
        tracing::debug!(method = %method.name(), strategy = ?strategy, "registered query method");

        self.methods.insert(
            method.name().to_string(),
            Registered {
                method,
                tree,
                strategy,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> QueryRegistry {
        tracing::info!(methods = self.methods.len(), "query registry ready");
        QueryRegistry {
            methods: self.methods,
        }
    }
}

impl QueryRegistry {
    pub fn builder() -> QueryRegistryBuilder {
        QueryRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// The strategy selected for a method.
    pub fn strategy(&self, name: &str) -> Option<ExecutionStrategy> {
        self.methods.get(name).map(|registered| registered.strategy)
    }

    pub fn method(&self, name: &str) -> Option<&QueryMethod> {
        self.methods.get(name).map(|registered| &registered.method)
    }

    /// Bind `params` to the named method and run it with its strategy.
    ///
    /// `pageable` is required by page methods and applied as skip and
    /// limit by collection methods.
    pub async fn execute<T: Entity>(
        &self,
        template: &Template,
        name: &str,
        params: &[Bson],
        pageable: Option<Pageable>,
    ) -> Result<QueryOutput<T>> {
        let registered = self.methods.get(name).ok_or_else(|| {
            StoreError::invalid_argument(format!("no query method named `{name}`"))
        })?;
        let query = registered.query(params)?;
        registered
            .strategy
            .execute(template, &registered.method, query, pageable)
            .await
    }
}
