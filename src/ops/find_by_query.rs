use std::marker::PhantomData;

use futures::TryStreamExt;
use serde::de::DeserializeOwned;

use super::{Builder, Operation, QueryOperation, Stage, Start};
use crate::cursor::Cursor;
use crate::entity::{decode_as, Entity};
use crate::error::{Result, StoreError};
use crate::operation::ResolvedSpec;
use crate::options::QueryOptions;
use crate::query::{Page, Pageable, Query};
use crate::store::{DocumentStream, QueryRequest};

/// Run a predicate query over `T`'s collection, decoding results as `R`.
pub struct FindByQuery<T, R = T>(PhantomData<fn() -> (T, R)>);

impl<T: Entity, R: DeserializeOwned + Send + 'static> Operation for FindByQuery<T, R> {
    type Options = QueryOptions;
    const NAME: &'static str = "find_by_query";

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity, R: DeserializeOwned + Send + 'static> QueryOperation for FindByQuery<T, R> {}

impl<T: Entity, R: DeserializeOwned + Send + 'static> Builder<FindByQuery<T, R>, Start> {
    /// Decode results as `R2` instead, e.g. a narrower view of `T`.
    pub fn as_type<R2: DeserializeOwned + Send + 'static>(self) -> Builder<FindByQuery<T, R2>, Start> {
        Builder::from_spec(self.template, self.spec)
    }
}

impl<T: Entity, R: DeserializeOwned + Send + 'static, S: Stage> Builder<FindByQuery<T, R>, S> {
    /// Exactly one match.
    ///
    /// `NotFound` when nothing matches, `IncorrectResultSize` when more
    /// than one document does.
    pub async fn one(&self) -> Result<R> {
        let resolved = self.resolved()?;
        let probe = resolved.query.clone().limit(resolved.query.limit.map_or(2, |l| l.min(2)));
        let mut found = self.fetch(&resolved, probe).await?;
        match found.len() {
            0 => Err(StoreError::not_found(resolved.query.to_string())),
            1 => Ok(found.remove(0)),
            _ => {
                let actual = self.count_matches(&resolved, resolved.query.clone()).await?;
                Err(StoreError::IncorrectResultSize {
                    expected: 1,
                    actual: usize::try_from(actual).unwrap_or(usize::MAX),
                })
            }
        }
    }

    /// The first match, if any.
    pub async fn first(&self) -> Result<Option<R>> {
        let resolved = self.resolved()?;
        let query = resolved.query.clone().limit(1);
        Ok(self.fetch(&resolved, query).await?.into_iter().next())
    }

    /// Every match.
    pub async fn all(&self) -> Result<Vec<R>> {
        let resolved = self.resolved()?;
        let query = resolved.query.clone();
        self.fetch(&resolved, query).await
    }

    /// Number of matches, ignoring skip and limit.
    pub async fn count(&self) -> Result<u64> {
        let resolved = self.resolved()?;
        let query = resolved.query.clone();
        self.count_matches(&resolved, query).await
    }

    /// Whether anything matches.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.first().await?.is_some())
    }

    /// One page of matches plus the total match count.
    pub async fn page(&self, pageable: Pageable) -> Result<Page<R>> {
        pageable.validate()?;
        let resolved = self.resolved()?;
        let total_query = resolved.query.unpaged();
        let content = self
            .fetch(&resolved, resolved.query.clone().with_pageable(pageable))
            .await?;
        let total = self.count_matches(&resolved, total_query).await?;
        Ok(Page {
            content,
            pageable,
            total,
        })
    }

    /// Lazily stream the matches.
    pub async fn stream(&self) -> Result<Cursor<R>> {
        let resolved = self.resolved()?;
        let query = resolved.query.clone();
        let inner = self.open(&resolved, query).await?;
        Ok(Cursor::new(inner, decode_as::<R>))
    }

    /// Stream current matches, then every later matching write.
    ///
    /// Fails with `UnsupportedExecution` when the store cannot tail.
    pub async fn tail(&self) -> Result<Cursor<R>> {
        let resolved = self.resolved()?;
        let request = query_request(&resolved, resolved.query.clone());
        tracing::debug!(keyspace = %resolved.keyspace, query = %request.query, "find_by_query tail");
        let inner = self
            .template()
            .client()
            .tail(&resolved.keyspace, &request)
            .await?;
        Ok(Cursor::new(inner, decode_as::<R>))
    }

    async fn open(&self, resolved: &ResolvedSpec<QueryOptions>, query: Query) -> Result<DocumentStream> {
        let request = query_request(resolved, query);
        tracing::debug!(keyspace = %resolved.keyspace, query = %request.query, "find_by_query");
        self.template()
            .client()
            .query(&resolved.keyspace, &request)
            .await
    }

    async fn fetch(&self, resolved: &ResolvedSpec<QueryOptions>, query: Query) -> Result<Vec<R>> {
        let inner = self.open(resolved, query).await?;
        inner
            .and_then(|stored| async move { decode_as::<R>(stored) })
            .try_collect()
            .await
    }

    async fn count_matches(&self, resolved: &ResolvedSpec<QueryOptions>, query: Query) -> Result<u64> {
        let request = query_request(resolved, query);
        tracing::debug!(keyspace = %resolved.keyspace, query = %request.query, "find_by_query count");
        self.template()
            .client()
            .count(&resolved.keyspace, &request)
            .await
    }
}

pub(crate) fn query_request(resolved: &ResolvedSpec<QueryOptions>, query: Query) -> QueryRequest {
    QueryRequest {
        query,
        timeout: resolved.timeout,
        read_only: resolved.options.read_only,
        client_context_id: resolved.options.client_context_id.clone(),
    }
}
