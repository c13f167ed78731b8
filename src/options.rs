//! Durability settings and per-operation call options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;

/// Synchronous durability level enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityLevel {
    /// Acknowledge once the active node has the write in memory.
    #[default]
    None,
    /// Replicated to a majority of nodes.
    Majority,
    /// Majority replicated and persisted on the active node.
    MajorityAndPersistToActive,
    /// Persisted on a majority of nodes.
    PersistToMajority,
}

impl DurabilityLevel {
    /// Whether a bucket with `replicas` configured replicas can honor the level.
    pub fn satisfiable_with(self, replicas: u8) -> bool {
        match self {
            DurabilityLevel::None => true,
            // a majority of (active + replicas) always fits once one replica exists
            _ => replicas >= 1,
        }
    }
}

impl fmt::Display for DurabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DurabilityLevel::None => "none",
            DurabilityLevel::Majority => "majority",
            DurabilityLevel::MajorityAndPersistToActive => "majorityAndPersistToActive",
            DurabilityLevel::PersistToMajority => "persistToMajority",
        };
        f.write_str(name)
    }
}

impl FromStr for DurabilityLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DurabilityLevel::None),
            "majority" => Ok(DurabilityLevel::Majority),
            "majorityAndPersistToActive" => Ok(DurabilityLevel::MajorityAndPersistToActive),
            "persistToMajority" => Ok(DurabilityLevel::PersistToMajority),
            other => Err(StoreError::invalid_argument(format!(
                "unknown durability level `{other}`"
            ))),
        }
    }
}

/// Number of nodes a write must be persisted to (observe-based durability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PersistTo {
    /// No persistence requirement.
    #[default]
    None,
    /// The active node only.
    Active,
    /// One node.
    One,
    /// Two nodes.
    Two,
    /// Three nodes.
    Three,
    /// Four nodes.
    Four,
}

impl PersistTo {
    /// Number of nodes that must persist the write.
    pub fn nodes(self) -> u8 {
        match self {
            PersistTo::None => 0,
            PersistTo::Active | PersistTo::One => 1,
            PersistTo::Two => 2,
            PersistTo::Three => 3,
            PersistTo::Four => 4,
        }
    }
}

/// Number of replicas a write must reach (observe-based durability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReplicateTo {
    /// No replication requirement.
    #[default]
    None,
    /// One replica.
    One,
    /// Two replicas.
    Two,
    /// Three replicas.
    Three,
}

impl ReplicateTo {
    /// Number of replicas that must receive the write.
    pub fn replicas(self) -> u8 {
        match self {
            ReplicateTo::None => 0,
            ReplicateTo::One => 1,
            ReplicateTo::Two => 2,
            ReplicateTo::Three => 3,
        }
    }
}

/// Write durability requirement.
///
/// The two ways of expressing durability are mutually exclusive, so they
/// live in one enum: setting either replaces the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Server-enforced durability level.
    Level(DurabilityLevel),
    /// Client-observed persistence and replication counts.
    Observe {
        /// Persistence requirement.
        persist_to: PersistTo,
        /// Replication requirement.
        replicate_to: ReplicateTo,
    },
}

impl Default for Durability {
    fn default() -> Self {
        Durability::Level(DurabilityLevel::None)
    }
}

impl From<DurabilityLevel> for Durability {
    fn from(level: DurabilityLevel) -> Self {
        Durability::Level(level)
    }
}

/// Settings shared by every per-call options type.
pub trait CallOptions {
    /// Per-call timeout, if set.
    fn timeout(&self) -> Option<Duration>;
}

macro_rules! call_options {
    ($($ty:ty),* $(,)?) => {
        $(impl CallOptions for $ty {
            fn timeout(&self) -> Option<Duration> {
                self.timeout
            }
        })*
    };
}

call_options!(
    GetOptions,
    ReplicaOptions,
    ExistsOptions,
    WriteOptions,
    RemoveOptions,
    QueryOptions,
);

/// Options for key-value reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Per-call timeout.
    pub timeout: Option<Duration>,
    /// Also fetch the document's expiry.
    pub with_expiry: bool,
}

impl GetOptions {
    /// Create a builder.
    pub fn builder() -> GetOptionsBuilder {
        GetOptionsBuilder::default()
    }
}

/// Builder for GetOptions.
#[derive(Debug, Clone, Default)]
pub struct GetOptionsBuilder {
    options: GetOptions,
}

impl GetOptionsBuilder {
    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Fetch the expiry alongside the document.
    pub fn with_expiry(mut self, with_expiry: bool) -> Self {
        self.options.with_expiry = with_expiry;
        self
    }

    /// Build the options.
    pub fn build(self) -> GetOptions {
        self.options
    }
}

/// Options for reads from any replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaOptions {
    /// Per-call timeout.
    pub timeout: Option<Duration>,
}

/// Options for existence checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistsOptions {
    /// Per-call timeout.
    pub timeout: Option<Duration>,
}

/// Options for insert, upsert and replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Per-call timeout.
    pub timeout: Option<Duration>,
    /// Compare-and-swap value; overrides the entity version on replace.
    pub cas: Option<u64>,
    /// Keep the existing expiry when no new one is given (upsert/replace).
    pub preserve_expiry: bool,
}

impl WriteOptions {
    /// Create a builder.
    pub fn builder() -> WriteOptionsBuilder {
        WriteOptionsBuilder::default()
    }
}

/// Builder for WriteOptions.
#[derive(Debug, Clone, Default)]
pub struct WriteOptionsBuilder {
    options: WriteOptions,
}

impl WriteOptionsBuilder {
    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Set the compare-and-swap value.
    pub fn cas(mut self, cas: u64) -> Self {
        self.options.cas = Some(cas);
        self
    }

    /// Preserve the existing expiry.
    pub fn preserve_expiry(mut self, preserve: bool) -> Self {
        self.options.preserve_expiry = preserve;
        self
    }

    /// Build the options.
    pub fn build(self) -> WriteOptions {
        self.options
    }
}

/// Options for removes by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Per-call timeout.
    pub timeout: Option<Duration>,
    /// Only remove when the stored CAS matches.
    pub cas: Option<u64>,
}

/// Options for predicate queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Per-call timeout.
    pub timeout: Option<Duration>,
    /// Read-only hint for the query service.
    pub read_only: bool,
    /// Client context id echoed in store logs.
    pub client_context_id: Option<String>,
}

impl QueryOptions {
    /// Create a builder.
    pub fn builder() -> QueryOptionsBuilder {
        QueryOptionsBuilder::default()
    }
}

/// Builder for QueryOptions.
#[derive(Debug, Clone, Default)]
pub struct QueryOptionsBuilder {
    options: QueryOptions,
}

impl QueryOptionsBuilder {
    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Mark the query read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.options.read_only = read_only;
        self
    }

    /// Set the client context id.
    pub fn client_context_id(mut self, id: impl Into<String>) -> Self {
        self.options.client_context_id = Some(id.into());
        self
    }

    /// Build the options.
    pub fn build(self) -> QueryOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durability_default() {
        assert_eq!(
            Durability::default(),
            Durability::Level(DurabilityLevel::None)
        );
    }

    #[test]
    fn test_durability_level_parse() {
        assert_eq!(
            "majority".parse::<DurabilityLevel>().unwrap(),
            DurabilityLevel::Majority
        );
        assert_eq!(
            "persistToMajority".parse::<DurabilityLevel>().unwrap(),
            DurabilityLevel::PersistToMajority
        );
        assert!("quorum".parse::<DurabilityLevel>().is_err());
    }

    #[test]
    fn test_durability_level_display_round_trip() {
        let level = DurabilityLevel::MajorityAndPersistToActive;
        assert_eq!(level.to_string().parse::<DurabilityLevel>().unwrap(), level);
    }

    #[test]
    fn test_satisfiable_with() {
        assert!(DurabilityLevel::None.satisfiable_with(0));
        assert!(!DurabilityLevel::Majority.satisfiable_with(0));
        assert!(DurabilityLevel::Majority.satisfiable_with(1));
        assert!(DurabilityLevel::PersistToMajority.satisfiable_with(3));
    }

    #[test]
    fn test_observe_counts() {
        assert_eq!(PersistTo::Active.nodes(), 1);
        assert_eq!(PersistTo::Four.nodes(), 4);
        assert_eq!(ReplicateTo::Two.replicas(), 2);
    }

    #[test]
    fn test_write_options_builder() {
        let options = WriteOptions::builder()
            .timeout(Duration::from_millis(250))
            .cas(42)
            .preserve_expiry(true)
            .build();

        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.cas, Some(42));
        assert!(options.preserve_expiry);
    }

    #[test]
    fn test_query_options_builder() {
        let options = QueryOptions::builder()
            .read_only(true)
            .client_context_id("req-7")
            .build();

        assert!(options.read_only);
        assert_eq!(options.client_context_id.as_deref(), Some("req-7"));
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_get_options_default() {
        let options = GetOptions::default();
        assert!(options.timeout.is_none());
        assert!(!options.with_expiry);
    }
}
