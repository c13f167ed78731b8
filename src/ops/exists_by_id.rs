use std::collections::HashMap;
use std::marker::PhantomData;

use super::{ensure_id, id_inputs, Builder, Operation, Stage};
use crate::batch;
use crate::entity::Entity;
use crate::error::Result;
use crate::options::ExistsOptions;

/// Check whether documents exist.
pub struct ExistsById<T>(PhantomData<fn() -> T>);

impl<T: Entity> Operation for ExistsById<T> {
    type Options = ExistsOptions;
    const NAME: &'static str = "exists_by_id";

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity, S: Stage> Builder<ExistsById<T>, S> {
    /// Whether a document exists for `id`.
    pub async fn one(&self, id: &str) -> Result<bool> {
        ensure_id(id)?;
        let resolved = self.resolved()?;
        tracing::debug!(keyspace = %resolved.keyspace, id, "exists_by_id");

        self.template()
            .client()
            .exists(&resolved.keyspace, id, resolved.timeout)
            .await
    }

    /// Existence per id. Any store error fails the whole call.
    pub async fn all<I>(&self, ids: I) -> Result<HashMap<String, bool>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let resolved = self.resolved()?;
        let inputs = id_inputs(ids);
        tracing::debug!(keyspace = %resolved.keyspace, count = inputs.len(), "exists_by_id all");

        let client = self.template().client();
        let keyspace = &resolved.keyspace;
        let timeout = resolved.timeout;
        let found = batch::try_ordered(inputs, self.concurrency(), |id, ()| async move {
            ensure_id(&id)?;
            client.exists(keyspace, &id, timeout).await
        })
        .await?;

        Ok(found.into_iter().collect())
    }
}
