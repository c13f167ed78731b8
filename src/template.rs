//! Template: the entry point handing out operation builders.

use std::sync::Arc;
use std::time::Duration;

use crate::entity::Entity;
use crate::error::Result;
use crate::ops::{
    Builder, ExistsById, FindById, FindByQuery, FindFromReplicasById, Insert, RemoveById,
    RemoveByQuery, Replace, Start, Upsert, WriteById,
};
use crate::options::{Durability, DurabilityLevel};
use crate::query::ScanConsistency;
use crate::store::StoreClient;

/// Declared defaults every operation falls back to.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOptions {
    /// Bucket name, taken from the connection-string path.
    pub bucket: Option<String>,
    /// Scope used when an operation names none.
    pub default_scope: String,
    /// Collection used when neither the operation nor the entity names one.
    pub default_collection: String,
    /// Durability for writes that do not request one.
    pub default_durability: Durability,
    /// Scan consistency for queries that do not request one.
    pub default_consistency: ScanConsistency,
    /// Timeout for calls whose options carry none.
    pub default_timeout: Option<Duration>,
    /// Maximum in-flight store calls per bulk operation.
    pub bulk_concurrency: usize,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            bucket: None,
            default_scope: "_default".to_string(),
            default_collection: "_default".to_string(),
            default_durability: Durability::default(),
            default_consistency: ScanConsistency::NotBounded,
            default_timeout: None,
            bulk_concurrency: 16,
        }
    }
}

impl TemplateOptions {
    /// Create a new TemplateOptionsBuilder.
    pub fn builder() -> TemplateOptionsBuilder {
        TemplateOptionsBuilder::default()
    }

    /// Parse options from a connection string.
    ///
    /// `couchbase://host/bucket?scope=inventory&durability=majority` sets the
    /// bucket, default scope and default durability. Unknown parameters are
    /// ignored and malformed values keep the default.
    pub fn parse(uri: &str) -> Result<Self> {
        let mut options = TemplateOptions::default();

        let without_scheme = uri.split_once("://").map_or(uri, |(_, rest)| rest);
        let (location, query) = match without_scheme.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (without_scheme, None),
        };
        if let Some((_, bucket)) = location.split_once('/') {
            let bucket = bucket.trim_end_matches('/');
            if !bucket.is_empty() {
                options.bucket = Some(bucket.to_string());
            }
        }

        for param in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key {
                "scope" if !value.is_empty() => {
                    options.default_scope = value.to_string();
                }
                "collection" if !value.is_empty() => {
                    options.default_collection = value.to_string();
                }
                "durability" => {
                    if let Ok(level) = value.parse::<DurabilityLevel>() {
                        options.default_durability = Durability::Level(level);
                    }
                }
                "consistency" => {
                    if let Some(consistency) = ScanConsistency::parse(value) {
                        options.default_consistency = consistency;
                    }
                }
                "timeoutMs" => {
                    if let Ok(ms) = value.parse() {
                        options.default_timeout = Some(Duration::from_millis(ms));
                    }
                }
                "bulkConcurrency" => {
                    if let Ok(n) = value.parse::<usize>() {
                        if n > 0 {
                            options.bulk_concurrency = n;
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(options)
    }
}

/// Builder for TemplateOptions.
#[derive(Debug, Clone, Default)]
pub struct TemplateOptionsBuilder {
    options: TemplateOptions,
}

impl TemplateOptionsBuilder {
    /// Set the bucket name.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.options.bucket = Some(bucket.into());
        self
    }

    /// Set the default scope.
    pub fn default_scope(mut self, scope: impl Into<String>) -> Self {
        self.options.default_scope = scope.into();
        self
    }

    /// Set the default collection.
    pub fn default_collection(mut self, collection: impl Into<String>) -> Self {
        self.options.default_collection = collection.into();
        self
    }

    /// Set the default write durability.
    pub fn default_durability(mut self, durability: impl Into<Durability>) -> Self {
        self.options.default_durability = durability.into();
        self
    }

    /// Set the default scan consistency.
    pub fn default_consistency(mut self, consistency: ScanConsistency) -> Self {
        self.options.default_consistency = consistency;
        self
    }

    /// Set the default per-call timeout.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.options.default_timeout = Some(timeout);
        self
    }

    /// Set the bulk concurrency limit (minimum 1).
    pub fn bulk_concurrency(mut self, n: usize) -> Self {
        self.options.bulk_concurrency = n.max(1);
        self
    }

    /// Build the options.
    pub fn build(self) -> TemplateOptions {
        self.options
    }
}

/// Hands out operation builders bound to one store client.
///
/// Cloning is cheap; every clone shares the client handle and defaults.
///
/// # Example
///
/// ```ignore
/// use docspace::{MemoryStore, Template};
/// use docspace::options::DurabilityLevel;
///
/// let template = Template::new(MemoryStore::new());
///
/// let saved = template
///     .insert_by_id::<Airline>()
///     .in_scope("inventory")
///     .in_collection("airline")
///     .with_durability(DurabilityLevel::Majority)
///     .one(airline)
///     .await?;
///
/// let found = template.find_by_id::<Airline>().one("airline_10").await?;
/// ```
#[derive(Clone)]
pub struct Template {
    client: Arc<dyn StoreClient>,
    options: Arc<TemplateOptions>,
}

impl Template {
    /// Create a template with default options.
    pub fn new(client: impl StoreClient + 'static) -> Self {
        Self::with_options(client, TemplateOptions::default())
    }

    /// Create a template with custom options.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let options = TemplateOptions::builder()
    ///     .default_scope("inventory")
    ///     .bulk_concurrency(4)
    ///     .build();
    /// let template = Template::with_options(MemoryStore::new(), options);
    /// ```
    pub fn with_options(client: impl StoreClient + 'static, options: TemplateOptions) -> Self {
        Self::with_client(Arc::new(client), options)
    }

    /// Create a template over a shared client handle.
    pub fn with_client(client: Arc<dyn StoreClient>, options: TemplateOptions) -> Self {
        Self {
            client,
            options: Arc::new(options),
        }
    }

    /// Create a template with options parsed from a connection string.
    pub fn from_uri(client: impl StoreClient + 'static, uri: &str) -> Result<Self> {
        let options = TemplateOptions::parse(uri)?;
        Ok(Self::with_options(client, options))
    }

    /// Get the store client.
    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.client
    }

    /// Get the template options.
    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Fetch entities by id.
    pub fn find_by_id<T: Entity>(&self) -> Builder<FindById<T>, Start> {
        Builder::new(self.clone())
    }

    /// Fetch entities from whichever replica answers.
    pub fn find_from_replicas_by_id<T: Entity>(&self) -> Builder<FindFromReplicasById<T>, Start> {
        Builder::new(self.clone())
    }

    /// Check whether documents exist.
    pub fn exists_by_id<T: Entity>(&self) -> Builder<ExistsById<T>, Start> {
        Builder::new(self.clone())
    }

    /// Create entities; fails for ids already taken.
    pub fn insert_by_id<T: Entity>(&self) -> Builder<WriteById<T, Insert>, Start> {
        Builder::new(self.clone())
    }

    /// Create or overwrite entities.
    pub fn upsert_by_id<T: Entity>(&self) -> Builder<WriteById<T, Upsert>, Start> {
        Builder::new(self.clone())
    }

    /// Overwrite existing entities.
    pub fn replace_by_id<T: Entity>(&self) -> Builder<WriteById<T, Replace>, Start> {
        Builder::new(self.clone())
    }

    /// Remove documents by id.
    pub fn remove_by_id<T: Entity>(&self) -> Builder<RemoveById<T>, Start> {
        Builder::new(self.clone())
    }

    /// Run predicate queries.
    pub fn find_by_query<T: Entity>(&self) -> Builder<FindByQuery<T>, Start> {
        Builder::new(self.clone())
    }

    /// Remove every document matching a predicate.
    pub fn remove_by_query<T: Entity>(&self) -> Builder<RemoveByQuery<T>, Start> {
        Builder::new(self.clone())
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
