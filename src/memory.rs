//! In-memory [`StoreClient`] for tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use crate::error::{Result, StoreError};
use crate::options::Durability;
use crate::query::{lookup, Query};
use crate::store::{
    DocumentStream, GetRequest, Keyspace, MutationRequest, MutationResult, QueryRequest,
    StoreClient, StoredDocument,
};

const TAIL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    cas: u64,
    content: Document,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }

    fn to_stored(&self, id: &str, now: Instant) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            cas: self.cas,
            content: self.content.clone(),
            expiry: self.expires_at.map(|at| at.saturating_duration_since(now)),
        }
    }
}

#[derive(Debug, Clone)]
struct WriteEvent {
    keyspace: Keyspace,
    document: StoredDocument,
}

#[derive(Default)]
struct State {
    collections: HashMap<Keyspace, BTreeMap<String, Entry>>,
    last_cas: u64,
    faults: HashMap<String, StoreError>,
}

impl State {
    fn next_cas(&mut self) -> u64 {
        self.last_cas += 1;
        self.last_cas
    }

    fn take_fault(&mut self, id: &str) -> Result<()> {
        match self.faults.remove(id) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn live(&self, keyspace: &Keyspace, id: &str, now: Instant) -> Option<&Entry> {
        self.collections
            .get(keyspace)?
            .get(id)
            .filter(|entry| entry.is_live(now))
    }

    fn matches(&self, keyspace: &Keyspace, query: &Query, now: Instant) -> Vec<StoredDocument> {
        let mut found: Vec<StoredDocument> = self
            .collections
            .get(keyspace)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .filter(|(_, entry)| entry.is_live(now) && query.matches(&entry.content))
            .map(|(id, entry)| entry.to_stored(id, now))
            .collect();
        // stable: equal sort keys stay in id order
        found.sort_by(|a, b| query.compare(&a.content, &b.content));
        found
    }
}

struct Inner {
    state: Mutex<State>,
    replicas: u8,
    available: AtomicBool,
    events: broadcast::Sender<WriteEvent>,
}

/// A document store held in process memory.
///
/// Documents are grouped per keyspace; every write gets a fresh CAS and
/// expired documents are invisible. Cloning shares the same data.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::with_replicas(2);
/// store.fail_next("airline_10", StoreError::Timeout).await;
/// let template = Template::new(store.clone());
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a store with one replica.
    pub fn new() -> Self {
        Self::with_replicas(1)
    }

    /// Creates a store reporting `replicas` replicas per document.
    ///
    /// Durability requirements that need more copies than this fail with
    /// `DurabilityUnsatisfiable`.
    pub fn with_replicas(replicas: u8) -> Self {
        let (events, _) = broadcast::channel(TAIL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                replicas,
                available: AtomicBool::new(true),
                events,
            }),
        }
    }

    /// Number of replicas per document.
    pub fn replicas(&self) -> u8 {
        self.inner.replicas
    }

    /// Make the next key-value call addressing `id` fail with `error`.
    pub async fn fail_next(&self, id: impl Into<String>, error: StoreError) {
        let mut state = self.inner.state.lock().await;
        state.faults.insert(id.into(), error);
    }

    /// Toggle availability; while unavailable every call fails with
    /// `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of live documents in a keyspace.
    pub async fn len(&self, keyspace: &Keyspace) -> usize {
        let state = self.inner.state.lock().await;
        let now = Instant::now();
        state
            .collections
            .get(keyspace)
            .map_or(0, |docs| docs.values().filter(|e| e.is_live(now)).count())
    }

    /// Raw stored copy of a document, including its remaining expiry.
    pub async fn peek(&self, keyspace: &Keyspace, id: &str) -> Option<StoredDocument> {
        let state = self.inner.state.lock().await;
        let now = Instant::now();
        state
            .live(keyspace, id, now)
            .map(|entry| entry.to_stored(id, now))
    }

    fn ensure_available(&self) -> Result<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store is offline"))
        }
    }

    fn check_durability(&self, durability: &Durability) -> Result<()> {
        let replicas = self.inner.replicas;
        match durability {
            Durability::Level(level) if !level.satisfiable_with(replicas) => {
                Err(StoreError::durability(format!(
                    "{level} needs at least one replica, store has {replicas}"
                )))
            }
            Durability::Observe {
                persist_to,
                replicate_to,
            } if persist_to.nodes() > replicas.saturating_add(1)
                || replicate_to.replicas() > replicas =>
            {
                Err(StoreError::durability(format!(
                    "persist to {} / replicate to {} exceeds {replicas} replica(s)",
                    persist_to.nodes(),
                    replicate_to.replicas()
                )))
            }
            _ => Ok(()),
        }
    }

    async fn write(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
        mode: WriteMode,
    ) -> Result<MutationResult> {
        self.ensure_available()?;
        let mut state = self.inner.state.lock().await;
        state.take_fault(id)?;
        self.check_durability(&request.durability)?;

        let now = Instant::now();
        let existing = state.live(keyspace, id, now).cloned();
        match (mode, &existing) {
            (WriteMode::Insert, Some(_)) => return Err(StoreError::already_exists(id)),
            (WriteMode::Replace, None) => return Err(StoreError::not_found(id)),
            (WriteMode::Replace, Some(entry)) if request.cas.is_some_and(|cas| cas != entry.cas) => {
                return Err(StoreError::conflict(id))
            }
            _ => {}
        }

        let expires_at = match request.expiry {
            Some(expiry) => Some(now + expiry),
            None if request.preserve_expiry => existing.and_then(|entry| entry.expires_at),
            None => None,
        };
        let cas = state.next_cas();
        let entry = Entry {
            cas,
            content,
            expires_at,
        };
        let stored = entry.to_stored(id, now);
        state
            .collections
            .entry(keyspace.clone())
            .or_default()
            .insert(id.to_string(), entry);

        // no receivers is fine
        let _ = self.inner.events.send(WriteEvent {
            keyspace: keyspace.clone(),
            document: stored,
        });
        Ok(MutationResult { cas })
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    Upsert,
    Replace,
}

fn project(content: &Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return content.clone();
    }
    let mut projected = Document::new();
    for field in fields {
        if let Some(value) = lookup(content, field) {
            insert_path(&mut projected, field, value.clone());
        }
    }
    projected
}

/// Insert `value` at a dotted `path`, creating intermediate documents.
fn insert_path(target: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = target.get_mut(head) {
                insert_path(child, rest, value);
            }
        }
        None => {
            target.insert(path, value);
        }
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get(
        &self,
        keyspace: &Keyspace,
        id: &str,
        request: &GetRequest,
    ) -> Result<StoredDocument> {
        self.ensure_available()?;
        let mut state = self.inner.state.lock().await;
        state.take_fault(id)?;
        let now = Instant::now();
        let entry = state
            .live(keyspace, id, now)
            .ok_or_else(|| StoreError::not_found(id))?;

        let mut stored = entry.to_stored(id, now);
        stored.content = project(&entry.content, &request.projection);
        if !request.with_expiry {
            stored.expiry = None;
        }
        Ok(stored)
    }

    async fn get_any_replica(
        &self,
        keyspace: &Keyspace,
        id: &str,
        _timeout: Option<Duration>,
    ) -> Result<StoredDocument> {
        self.get(keyspace, id, &GetRequest::default()).await
    }

    async fn exists(&self, keyspace: &Keyspace, id: &str, _timeout: Option<Duration>) -> Result<bool> {
        self.ensure_available()?;
        let mut state = self.inner.state.lock().await;
        state.take_fault(id)?;
        Ok(state.live(keyspace, id, Instant::now()).is_some())
    }

    async fn insert(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
    ) -> Result<MutationResult> {
        self.write(keyspace, id, content, request, WriteMode::Insert)
            .await
    }

    async fn upsert(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
    ) -> Result<MutationResult> {
        self.write(keyspace, id, content, request, WriteMode::Upsert)
            .await
    }

    async fn replace(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
    ) -> Result<MutationResult> {
        self.write(keyspace, id, content, request, WriteMode::Replace)
            .await
    }

    async fn remove(
        &self,
        keyspace: &Keyspace,
        id: &str,
        request: &MutationRequest,
    ) -> Result<MutationResult> {
        self.ensure_available()?;
        let mut state = self.inner.state.lock().await;
        state.take_fault(id)?;
        self.check_durability(&request.durability)?;

        let current = state
            .live(keyspace, id, Instant::now())
            .map(|entry| entry.cas)
            .ok_or_else(|| StoreError::not_found(id))?;
        if request.cas.is_some_and(|cas| cas != current) {
            return Err(StoreError::conflict(id));
        }

        let cas = state.next_cas();
        if let Some(docs) = state.collections.get_mut(keyspace) {
            docs.remove(id);
        }
        Ok(MutationResult { cas })
    }

    async fn query(&self, keyspace: &Keyspace, request: &QueryRequest) -> Result<DocumentStream> {
        self.ensure_available()?;
        let state = self.inner.state.lock().await;
        let query = &request.query;
        let skip = query.skip.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let limit = query.limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        let found: Vec<_> = state
            .matches(keyspace, query, Instant::now())
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(Ok)
            .collect();
        Ok(stream::iter(found).boxed())
    }

    async fn count(&self, keyspace: &Keyspace, request: &QueryRequest) -> Result<u64> {
        self.ensure_available()?;
        let state = self.inner.state.lock().await;
        let found = state.matches(keyspace, &request.query, Instant::now());
        Ok(found.len() as u64)
    }

    async fn tail(&self, keyspace: &Keyspace, request: &QueryRequest) -> Result<DocumentStream> {
        self.ensure_available()?;
        // subscribe under the lock so no write slips between snapshot and feed
        let state = self.inner.state.lock().await;
        let receiver = self.inner.events.subscribe();
        let initial = state.matches(keyspace, &request.query, Instant::now());
        drop(state);

        let keyspace = keyspace.clone();
        let query = request.query.unpaged();
        let live = stream::unfold(receiver, move |mut receiver| {
            let keyspace = keyspace.clone();
            let query = query.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.keyspace == keyspace && query.matches(&event.document.content) => {
                            return Some((Ok(event.document), receiver));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(%keyspace, missed, "tail fell behind, writes skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream::iter(initial.into_iter().map(Ok)).chain(live).boxed())
    }
}
