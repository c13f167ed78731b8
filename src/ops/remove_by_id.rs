use std::marker::PhantomData;

use super::{ensure_id, id_inputs, Builder, DurableOperation, Operation, Stage};
use crate::batch;
use crate::entity::Entity;
use crate::error::Result;
use crate::operation::ResolvedSpec;
use crate::options::RemoveOptions;
use crate::result::{BatchOutcome, RemoveResult};
use crate::store::{MutationRequest, StoreClient};

/// Remove documents by id.
pub struct RemoveById<T>(PhantomData<fn() -> T>);

impl<T: Entity> Operation for RemoveById<T> {
    type Options = RemoveOptions;
    const NAME: &'static str = "remove_by_id";

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity> DurableOperation for RemoveById<T> {}

impl<T: Entity, S: Stage> Builder<RemoveById<T>, S> {
    /// Remove one document; `NotFound` when absent.
    pub async fn one(&self, id: &str) -> Result<RemoveResult> {
        let resolved = self.resolved()?;
        tracing::debug!(keyspace = %resolved.keyspace, id, "remove_by_id");
        remove(self.template().client().as_ref(), &resolved, id.to_string()).await
    }

    /// Remove every id, reporting each outcome at its input position.
    pub async fn all<I>(&self, ids: I) -> Result<BatchOutcome<RemoveResult>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let resolved = self.resolved()?;
        let inputs = id_inputs(ids);
        tracing::debug!(keyspace = %resolved.keyspace, count = inputs.len(), "remove_by_id all");

        let client = self.template().client().as_ref();
        let resolved = &resolved;
        batch::run_ordered(inputs, self.concurrency(), |id, ()| {
            remove(client, resolved, id)
        })
        .await
    }
}

async fn remove(
    client: &dyn StoreClient,
    resolved: &ResolvedSpec<RemoveOptions>,
    id: String,
) -> Result<RemoveResult> {
    ensure_id(&id)?;
    let request = MutationRequest {
        durability: resolved.durability,
        cas: resolved.options.cas,
        timeout: resolved.timeout,
        ..MutationRequest::default()
    };
    let result = client.remove(&resolved.keyspace, &id, &request).await?;
    Ok(RemoveResult {
        id,
        cas: result.cas,
    })
}
