//! Staged operation builders.
//!
//! Every operation starts at a [`Template`] factory in stage [`Start`] and is
//! narrowed through optional refinements, each returning a builder in a later
//! stage:
//!
//! ```text
//! Start -> [in_scope] -> [in_collection] -> [with_options] -> [durability | expiry]* -> terminal
//! ```
//!
//! Terminals (`one`, `all`, ...) are callable from every stage. Builders are
//! plain values; clone one to branch a configuration.

mod exists_by_id;
mod find_by_id;
mod find_by_query;
mod find_from_replicas;
mod remove_by_id;
mod remove_by_query;
mod stage;
mod write_by_id;

pub use exists_by_id::ExistsById;
pub use find_by_id::FindById;
pub use find_by_query::FindByQuery;
pub use find_from_replicas::FindFromReplicasById;
pub use remove_by_id::RemoveById;
pub use remove_by_query::RemoveByQuery;
pub use stage::{
    CanCollect, CanConfigure, CanConsist, CanMatch, CanProject, CanScope, CanTune, Collected,
    Consistent, Matched, Optioned, Projected, Scoped, Stage, Start, Tuned,
};
pub use write_by_id::{Insert, Replace, Upsert, WriteById, WriteKind, WriteMode};

use std::marker::PhantomData;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::operation::{OperationSpec, ResolvedSpec};
use crate::options::{CallOptions, Durability, DurabilityLevel, PersistTo, ReplicateTo};
use crate::query::{Query, ScanConsistency};
use crate::template::Template;

/// An operation family.
pub trait Operation {
    /// Per-call options accepted by `with_options`.
    type Options: CallOptions + Clone + Default + Send + Sync + 'static;

    /// Name used in log records.
    const NAME: &'static str;

    /// Collection declared by the target entity, if any.
    fn entity_collection() -> Option<&'static str> {
        None
    }
}

/// Operations that accept a write-durability requirement.
pub trait DurableOperation: Operation {}

/// Operations that accept a time to live.
pub trait ExpiringOperation: Operation {}

/// Operations driven by a predicate query.
pub trait QueryOperation: Operation {}

/// A builder for operation `K` in stage `S`.
pub struct Builder<K: Operation, S> {
    template: Template,
    spec: OperationSpec<K::Options>,
    _stage: PhantomData<fn() -> (K, S)>,
}

impl<K: Operation, S> Clone for Builder<K, S> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            spec: self.spec.clone(),
            _stage: PhantomData,
        }
    }
}

impl<K: Operation, S> std::fmt::Debug for Builder<K, S>
where
    K::Options: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("operation", &K::NAME)
            .field("stage", &std::any::type_name::<S>())
            .field("spec", &self.spec)
            .finish()
    }
}

impl<K: Operation> Builder<K, Start> {
    pub(crate) fn new(template: Template) -> Self {
        Self::from_spec(template, OperationSpec::new())
    }
}

impl<K: Operation, S> Builder<K, S> {
    pub(crate) fn from_spec(template: Template, spec: OperationSpec<K::Options>) -> Self {
        Self {
            template,
            spec,
            _stage: PhantomData,
        }
    }

    fn advance<N>(
        self,
        change: impl FnOnce(OperationSpec<K::Options>) -> OperationSpec<K::Options>,
    ) -> Builder<K, N> {
        Builder {
            template: self.template,
            spec: change(self.spec),
            _stage: PhantomData,
        }
    }

    /// The settings collected so far.
    pub fn spec(&self) -> &OperationSpec<K::Options> {
        &self.spec
    }

    /// The settings with template defaults applied.
    pub fn resolved(&self) -> Result<ResolvedSpec<K::Options>> {
        self.spec
            .resolve(self.template.options(), K::entity_collection())
    }

    pub(crate) fn template(&self) -> &Template {
        &self.template
    }

    pub(crate) fn concurrency(&self) -> usize {
        self.template.options().bulk_concurrency
    }
}

impl<K: Operation, S: CanScope> Builder<K, S> {
    /// Target a scope.
    pub fn in_scope(self, scope: impl Into<String>) -> Builder<K, Scoped> {
        self.advance(|spec| spec.with_scope(scope))
    }
}

impl<K: Operation, S: CanCollect> Builder<K, S> {
    /// Target a collection.
    pub fn in_collection(self, collection: impl Into<String>) -> Builder<K, Collected> {
        self.advance(|spec| spec.with_collection(collection))
    }
}

impl<K: Operation, S: CanConfigure> Builder<K, S> {
    /// Attach per-call options.
    pub fn with_options(self, options: K::Options) -> Builder<K, Optioned> {
        self.advance(|spec| spec.with_options(options))
    }
}

impl<K: DurableOperation, S: CanTune> Builder<K, S> {
    /// Require a server-enforced durability level.
    ///
    /// Replaces any observe-based requirement set earlier.
    pub fn with_durability(self, level: DurabilityLevel) -> Builder<K, Tuned> {
        self.advance(|spec| spec.with_durability(Durability::Level(level)))
    }

    /// Require client-observed persistence and replication counts.
    ///
    /// Replaces any durability level set earlier.
    pub fn with_durability_observe(
        self,
        persist_to: PersistTo,
        replicate_to: ReplicateTo,
    ) -> Builder<K, Tuned> {
        self.advance(|spec| spec.with_durability(Durability::Observe {
            persist_to,
            replicate_to,
        }))
    }
}

impl<K: ExpiringOperation, S: CanTune> Builder<K, S> {
    /// Expire written documents after `expiry`.
    pub fn with_expiry(self, expiry: Duration) -> Builder<K, Tuned> {
        self.advance(|spec| spec.with_expiry(expiry))
    }
}

impl<K: QueryOperation, S: CanConsist> Builder<K, S> {
    /// Choose the scan consistency; overrides the query's own.
    pub fn with_consistency(self, consistency: ScanConsistency) -> Builder<K, Consistent> {
        self.advance(|spec| spec.with_consistency(consistency))
    }
}

impl<K: QueryOperation, S: CanMatch> Builder<K, S> {
    /// Attach the predicate.
    pub fn matching(self, query: Query) -> Builder<K, Matched> {
        self.advance(|spec| spec.with_query(query))
    }
}

pub(crate) fn ensure_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(StoreError::invalid_argument("document id is empty"));
    }
    Ok(())
}

pub(crate) fn id_inputs<I>(ids: I) -> Vec<(String, ())>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    ids.into_iter().map(|id| (id.into(), ())).collect()
}
