use std::marker::PhantomData;

use futures::TryStreamExt;

use super::find_by_query::query_request;
use super::{Builder, Operation, QueryOperation, Stage};
use crate::batch;
use crate::entity::Entity;
use crate::error::Result;
use crate::options::QueryOptions;
use crate::result::{BatchOutcome, RemoveResult};
use crate::store::MutationRequest;

/// Remove every document matching a predicate.
pub struct RemoveByQuery<T>(PhantomData<fn() -> T>);

impl<T: Entity> Operation for RemoveByQuery<T> {
    type Options = QueryOptions;
    const NAME: &'static str = "remove_by_query";

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity> QueryOperation for RemoveByQuery<T> {}

impl<T: Entity, S: Stage> Builder<RemoveByQuery<T>, S> {
    /// Remove all matches.
    ///
    /// A failing query fails the call; a match that cannot be removed is
    /// recorded at its position in the outcome.
    pub async fn all(&self) -> Result<BatchOutcome<RemoveResult>> {
        let resolved = self.resolved()?;
        let client = self.template().client();
        let request = query_request(&resolved, resolved.query.clone());

        let ids: Vec<(String, ())> = client
            .query(&resolved.keyspace, &request)
            .await?
            .map_ok(|stored| (stored.id, ()))
            .try_collect()
            .await?;
        tracing::debug!(
            keyspace = %resolved.keyspace,
            query = %request.query,
            count = ids.len(),
            "remove_by_query"
        );

        let keyspace = &resolved.keyspace;
        let mutation = MutationRequest {
            durability: resolved.durability,
            timeout: resolved.timeout,
            ..MutationRequest::default()
        };
        let mutation = &mutation;
        batch::run_ordered(ids, self.concurrency(), |id, ()| async move {
            let removed = client.remove(keyspace, &id, mutation).await;
            removed.map(|result| RemoveResult {
                id,
                cas: result.cas,
            })
        })
        .await
    }
}
