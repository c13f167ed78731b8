//! Immutable description of one pending operation.

use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::options::{CallOptions, Durability};
use crate::query::{Query, ScanConsistency};
use crate::store::Keyspace;
use crate::template::TemplateOptions;

/// Everything a builder has collected so far.
///
/// Unset fields fall back to the template defaults during [`resolve`].
/// Every setter consumes the value and returns the changed copy.
///
/// [`resolve`]: OperationSpec::resolve
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec<O> {
    /// Target scope.
    pub scope: Option<String>,
    /// Target collection.
    pub collection: Option<String>,
    /// Per-call options.
    pub options: Option<O>,
    /// Write durability.
    pub durability: Option<Durability>,
    /// Time to live for writes.
    pub expiry: Option<Duration>,
    /// Fields to return on reads.
    pub projection: Vec<String>,
    /// Scan consistency for queries.
    pub consistency: Option<ScanConsistency>,
    /// Predicate for query operations.
    pub query: Option<Query>,
}

impl<O> Default for OperationSpec<O> {
    fn default() -> Self {
        Self {
            scope: None,
            collection: None,
            options: None,
            durability: None,
            expiry: None,
            projection: Vec::new(),
            consistency: None,
            query: None,
        }
    }
}

impl<O> OperationSpec<O> {
    /// An empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(self, scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..self
        }
    }

    pub fn with_collection(self, collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..self
        }
    }

    pub fn with_options(self, options: O) -> Self {
        Self {
            options: Some(options),
            ..self
        }
    }

    pub fn with_durability(self, durability: Durability) -> Self {
        Self {
            durability: Some(durability),
            ..self
        }
    }

    pub fn with_expiry(self, expiry: Duration) -> Self {
        Self {
            expiry: Some(expiry),
            ..self
        }
    }

    pub fn with_projection(self, projection: Vec<String>) -> Self {
        Self { projection, ..self }
    }

    pub fn with_consistency(self, consistency: ScanConsistency) -> Self {
        Self {
            consistency: Some(consistency),
            ..self
        }
    }

    pub fn with_query(self, query: Query) -> Self {
        Self {
            query: Some(query),
            ..self
        }
    }
}

impl<O: CallOptions + Clone + Default> OperationSpec<O> {
    /// Apply defaults and validate names.
    ///
    /// The collection falls back to the entity's declared collection, then
    /// to the template default. Scan consistency set on the builder wins
    /// over the one attached to the query, which wins over the default.
    pub fn resolve(
        &self,
        defaults: &TemplateOptions,
        entity_collection: Option<&str>,
    ) -> Result<ResolvedSpec<O>> {
        let scope = self
            .scope
            .clone()
            .unwrap_or_else(|| defaults.default_scope.clone());
        let collection = self
            .collection
            .clone()
            .or_else(|| entity_collection.map(str::to_string))
            .unwrap_or_else(|| defaults.default_collection.clone());
        validate_name("scope", &scope)?;
        validate_name("collection", &collection)?;

        let options = self.options.clone().unwrap_or_default();
        let timeout = options.timeout().or(defaults.default_timeout);

        let mut query = self.query.clone().unwrap_or_default();
        let consistency = self
            .consistency
            .or(query.consistency)
            .unwrap_or(defaults.default_consistency);
        query.consistency = Some(consistency);

        for field in &self.projection {
            if field.is_empty() {
                return Err(StoreError::invalid_argument("projection field is empty"));
            }
        }

        Ok(ResolvedSpec {
            keyspace: Keyspace::new(scope, collection),
            options,
            timeout,
            durability: self.durability.unwrap_or(defaults.default_durability),
            expiry: self.expiry,
            projection: self.projection.clone(),
            consistency,
            query,
        })
    }
}

/// An [`OperationSpec`] with every field concrete.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSpec<O> {
    pub keyspace: Keyspace,
    pub options: O,
    /// Options timeout, else the template default.
    pub timeout: Option<Duration>,
    pub durability: Durability,
    pub expiry: Option<Duration>,
    pub projection: Vec<String>,
    pub consistency: ScanConsistency,
    /// Predicate with the effective consistency attached.
    pub query: Query,
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::invalid_argument(format!("{what} name is empty")));
    }
    if name.contains(['.', '`']) {
        return Err(StoreError::invalid_argument(format!(
            "{what} name `{name}` contains a reserved character"
        )));
    }
    Ok(())
}
