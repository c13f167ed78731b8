use std::marker::PhantomData;

use super::{ensure_id, id_inputs, Builder, CanProject, Operation, Projected, Stage};
use crate::batch;
use crate::entity::{decode_entity, Entity};
use crate::error::Result;
use crate::operation::ResolvedSpec;
use crate::options::GetOptions;
use crate::result::BatchOutcome;
use crate::store::GetRequest;

/// Fetch entities by id.
pub struct FindById<T>(PhantomData<fn() -> T>);

impl<T: Entity> Operation for FindById<T> {
    type Options = GetOptions;
    const NAME: &'static str = "find_by_id";

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity, S: CanProject> Builder<FindById<T>, S> {
    /// Return only the listed fields.
    ///
    /// Fields left out must be optional (or defaulted) on `T`.
    pub fn project<I, F>(self, fields: I) -> Builder<FindById<T>, Projected>
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        let fields = fields.into_iter().map(Into::into).collect();
        self.advance(|spec| spec.with_projection(fields))
    }
}

impl<T: Entity, S: Stage> Builder<FindById<T>, S> {
    /// Fetch one entity; `NotFound` when absent.
    pub async fn one(&self, id: &str) -> Result<T> {
        ensure_id(id)?;
        let resolved = self.resolved()?;
        let request = get_request(&resolved);
        tracing::debug!(keyspace = %resolved.keyspace, id, "find_by_id");

        let stored = self
            .template()
            .client()
            .get(&resolved.keyspace, id, &request)
            .await?;
        decode_entity(stored)
    }

    /// Fetch every id, reporting each outcome at its input position.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let outcome = template.find_by_id::<Airline>().all(["a", "missing", "b"]).await?;
    /// assert!(outcome.get(1).unwrap().error().unwrap().is_not_found());
    /// ```
    pub async fn all<I>(&self, ids: I) -> Result<BatchOutcome<T>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let resolved = self.resolved()?;
        let request = get_request(&resolved);
        let inputs = id_inputs(ids);
        tracing::debug!(keyspace = %resolved.keyspace, count = inputs.len(), "find_by_id all");

        let client = self.template().client();
        let keyspace = &resolved.keyspace;
        let request = &request;
        batch::run_ordered(inputs, self.concurrency(), |id, ()| async move {
            ensure_id(&id)?;
            let stored = client.get(keyspace, &id, request).await?;
            decode_entity(stored)
        })
        .await
    }
}

fn get_request(resolved: &ResolvedSpec<GetOptions>) -> GetRequest {
    GetRequest {
        projection: resolved.projection.clone(),
        with_expiry: resolved.options.with_expiry,
        timeout: resolved.timeout,
    }
}
