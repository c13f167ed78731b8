use std::marker::PhantomData;

use super::{ensure_id, Builder, DurableOperation, ExpiringOperation, Operation, Stage};
use crate::batch;
use crate::entity::{encode, Entity};
use crate::error::Result;
use crate::operation::ResolvedSpec;
use crate::options::WriteOptions;
use crate::result::BatchOutcome;
use crate::store::{Keyspace, MutationRequest, StoreClient};

/// The store call a write maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Upsert,
    Replace,
}

/// How a write treats an existing document.
pub trait WriteMode: Send + Sync + 'static {
    /// Name used in log records.
    const NAME: &'static str;
    /// Store call issued per entity.
    const KIND: WriteKind;
}

/// Create; fails with `AlreadyExists` when the id is taken.
pub struct Insert;

/// Create or overwrite.
pub struct Upsert;

/// Overwrite; fails with `NotFound` when absent and `Conflict` on a stale CAS.
pub struct Replace;

impl WriteMode for Insert {
    const NAME: &'static str = "insert_by_id";
    const KIND: WriteKind = WriteKind::Insert;
}

impl WriteMode for Upsert {
    const NAME: &'static str = "upsert_by_id";
    const KIND: WriteKind = WriteKind::Upsert;
}

impl WriteMode for Replace {
    const NAME: &'static str = "replace_by_id";
    const KIND: WriteKind = WriteKind::Replace;
}

/// Write entities by id in mode `M`.
pub struct WriteById<T, M>(PhantomData<fn() -> (T, M)>);

impl<T: Entity, M: WriteMode> Operation for WriteById<T, M> {
    type Options = WriteOptions;
    const NAME: &'static str = M::NAME;

    fn entity_collection() -> Option<&'static str> {
        T::COLLECTION
    }
}

impl<T: Entity, M: WriteMode> DurableOperation for WriteById<T, M> {}
impl<T: Entity, M: WriteMode> ExpiringOperation for WriteById<T, M> {}

impl<T: Entity, M: WriteMode, S: Stage> Builder<WriteById<T, M>, S> {
    /// Write one entity and return it with its new version.
    pub async fn one(&self, entity: T) -> Result<T> {
        let resolved = self.resolved()?;
        tracing::debug!(
            keyspace = %resolved.keyspace,
            id = %entity.id(),
            durability = ?resolved.durability,
            "{}",
            M::NAME
        );
        write::<T, M>(self.template().client().as_ref(), &resolved, entity).await
    }

    /// Write every entity, reporting each outcome at its input position.
    pub async fn all<I>(&self, entities: I) -> Result<BatchOutcome<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let resolved = self.resolved()?;
        let inputs: Vec<(String, T)> = entities
            .into_iter()
            .map(|entity| (entity.id(), entity))
            .collect();
        tracing::debug!(keyspace = %resolved.keyspace, count = inputs.len(), "{} all", M::NAME);

        let client = self.template().client().as_ref();
        let resolved = &resolved;
        batch::run_ordered(inputs, self.concurrency(), |_, entity| {
            write::<T, M>(client, resolved, entity)
        })
        .await
    }
}

async fn write<T: Entity, M: WriteMode>(
    client: &dyn StoreClient,
    resolved: &ResolvedSpec<WriteOptions>,
    mut entity: T,
) -> Result<T> {
    let id = entity.id();
    ensure_id(&id)?;
    let content = encode(&entity)?;
    // only replace is guarded by the entity's version
    let cas = match M::KIND {
        WriteKind::Replace => resolved.options.cas.or_else(|| entity.version()),
        WriteKind::Insert | WriteKind::Upsert => None,
    };
    let request = MutationRequest {
        durability: resolved.durability,
        expiry: resolved.expiry,
        preserve_expiry: resolved.options.preserve_expiry,
        cas,
        timeout: resolved.timeout,
    };

    let keyspace: &Keyspace = &resolved.keyspace;
    let result = match M::KIND {
        WriteKind::Insert => client.insert(keyspace, &id, content, &request).await?,
        WriteKind::Upsert => client.upsert(keyspace, &id, content, &request).await?,
        WriteKind::Replace => client.replace(keyspace, &id, content, &request).await?,
    };
    entity.set_version(result.cas);
    Ok(entity)
}
