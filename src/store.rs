//! The external document-store client seam.
//!
//! Every terminal operation in this crate ends in exactly one of the calls
//! below. Implementations own connections, retries and timeouts; this crate
//! only passes the resolved per-call settings through.

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::fmt;
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::options::Durability;
use crate::query::Query;

/// Fully resolved storage location of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyspace {
    /// Scope (namespace).
    pub scope: String,
    /// Collection (sub-namespace).
    pub collection: String,
}

impl Keyspace {
    /// Create a keyspace.
    pub fn new(scope: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope, self.collection)
    }
}

/// A document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document identifier.
    pub id: String,
    /// Compare-and-swap value of the current revision.
    pub cas: u64,
    /// Document body.
    pub content: Document,
    /// Remaining time to live, when requested and set.
    pub expiry: Option<Duration>,
}

/// Outcome of a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationResult {
    /// Compare-and-swap value after the mutation.
    pub cas: u64,
}

/// Key-value read settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRequest {
    /// Fields to return; empty returns the whole document.
    pub projection: Vec<String>,
    /// Include the remaining expiry.
    pub with_expiry: bool,
    /// Per-call timeout.
    pub timeout: Option<Duration>,
}

/// Mutation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRequest {
    /// Durability the write must reach before it is acknowledged.
    pub durability: Durability,
    /// Time to live; `None` keeps no expiry (or the existing one when
    /// `preserve_expiry` is set).
    pub expiry: Option<Duration>,
    /// Keep the existing expiry.
    pub preserve_expiry: bool,
    /// Compare-and-swap guard.
    pub cas: Option<u64>,
    /// Per-call timeout.
    pub timeout: Option<Duration>,
}

/// Predicate query settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    /// Predicate and modifiers.
    pub query: Query,
    /// Per-call timeout.
    pub timeout: Option<Duration>,
    /// Read-only hint.
    pub read_only: bool,
    /// Client context id.
    pub client_context_id: Option<String>,
}

/// A lazy sequence of stored documents.
pub type DocumentStream = BoxStream<'static, Result<StoredDocument>>;

/// A document store reachable asynchronously.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetch a document by id; `NotFound` when absent.
    async fn get(&self, keyspace: &Keyspace, id: &str, request: &GetRequest)
        -> Result<StoredDocument>;

    /// Fetch a document from whichever copy answers first.
    async fn get_any_replica(
        &self,
        keyspace: &Keyspace,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<StoredDocument>;

    /// Check whether a document exists.
    async fn exists(&self, keyspace: &Keyspace, id: &str, timeout: Option<Duration>)
        -> Result<bool>;

    /// Create a document; `AlreadyExists` when the id is taken.
    async fn insert(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
    ) -> Result<MutationResult>;

    /// Create or overwrite a document.
    async fn upsert(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
    ) -> Result<MutationResult>;

    /// Overwrite an existing document; `NotFound` when absent, `Conflict`
    /// on CAS mismatch.
    async fn replace(
        &self,
        keyspace: &Keyspace,
        id: &str,
        content: Document,
        request: &MutationRequest,
    ) -> Result<MutationResult>;

    /// Delete a document; `NotFound` when absent.
    async fn remove(
        &self,
        keyspace: &Keyspace,
        id: &str,
        request: &MutationRequest,
    ) -> Result<MutationResult>;

    /// Run a predicate query.
    async fn query(&self, keyspace: &Keyspace, request: &QueryRequest) -> Result<DocumentStream>;

    /// Count the matches of a predicate query, ignoring skip and limit.
    async fn count(&self, keyspace: &Keyspace, request: &QueryRequest) -> Result<u64>;

    /// Stream current matches, then keep streaming matching writes.
    async fn tail(&self, keyspace: &Keyspace, request: &QueryRequest) -> Result<DocumentStream> {
        let _ = request;
        Err(StoreError::UnsupportedExecution(format!(
            "store cannot tail {keyspace}"
        )))
    }
}
