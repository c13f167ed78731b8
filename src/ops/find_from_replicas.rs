use std::marker::PhantomData;

use super::{ensure_id, id_inputs, Builder, Operation, Stage};
use crate::batch;
use crate::entity::{decode_entity, Entity};
use crate::error::Result;
use crate::options::ReplicaOptions;
use crate::result::BatchOutcome;

/// Fetch entities from whichever copy answers first.
pub struct FindFromReplicasById<T>(PhantomData<fn() -> T>);

impl<T: Entity> Operation for FindFromReplicasById<T> {
    type Options = ReplicaOptions;
    const NAME: &'static str = "find_from_replicas_by_id";

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity, S: Stage> Builder<FindFromReplicasById<T>, S> {
    /// Fetch one entity from any replica; the value may be stale.
    pub async fn any(&self, id: &str) -> Result<T> {
        ensure_id(id)?;
        let resolved = self.resolved()?;
        tracing::debug!(keyspace = %resolved.keyspace, id, "find_from_replicas_by_id");

        let stored = self
            .template()
            .client()
            .get_any_replica(&resolved.keyspace, id, resolved.timeout)
            .await?;
        decode_entity(stored)
    }

    /// Fetch every id from any replica, in input order.
    pub async fn any_of<I>(&self, ids: I) -> Result<BatchOutcome<T>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let resolved = self.resolved()?;
        let inputs = id_inputs(ids);
        tracing::debug!(
            keyspace = %resolved.keyspace,
            count = inputs.len(),
            "find_from_replicas_by_id any_of"
        );

        let client = self.template().client();
        let keyspace = &resolved.keyspace;
        let timeout = resolved.timeout;
        batch::run_ordered(inputs, self.concurrency(), |id, ()| async move {
            ensure_id(&id)?;
            let stored = client.get_any_replica(keyspace, &id, timeout).await?;
            decode_entity(stored)
        })
        .await
    }
}
