//! # docspace
//!
//! Staged fluent operations and derived-query execution over async document
//! stores.
//!
//! A [`Template`] hands out operation builders. Each builder is refined in a
//! fixed order (scope, collection, options, then durability or expiry) and
//! ends in a terminal that talks to the [`StoreClient`] behind the template.
//! Query methods declared by name are parsed once, mapped to an
//! [`ExecutionStrategy`] and run through a [`QueryRegistry`].
//!
//! ## Features
//!
//! - Typestate builders: misordered refinements do not compile
//! - By-id reads, replica reads, existence checks, writes and removals
//! - Ordered bulk terminals with per-item outcomes
//! - Predicate queries with paging, counting, streaming and tailing
//! - Query derivation from method names (`findByNameAndAgeGreaterThan`)
//! - In-memory store for tests (`memory` feature, on by default)
//! - Blocking adapter for synchronous callers
//!
//! ## Quick Start
//!
//! ```ignore
//! use docspace::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Airline {
//!     id: String,
//!     name: String,
//!     country: String,
//! }
//!
//! impl Entity for Airline {
//!     const COLLECTION: Option<&'static str> = Some("airline");
//!
//!     fn id(&self) -> String {
//!         self.id.clone()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> docspace::Result<()> {
//!     let template = Template::from_uri(MemoryStore::new(), "docspace://localhost/travel?scope=inventory")?;
//!
//!     // Write with a durability requirement
//!     template
//!         .upsert_by_id::<Airline>()
//!         .with_durability(DurabilityLevel::Majority)
//!         .one(Airline {
//!             id: "airline_10".to_string(),
//!             name: "40-Mile Air".to_string(),
//!             country: "United States".to_string(),
//!         })
//!         .await?;
//!
//!     // Read it back
//!     let airline = template.find_by_id::<Airline>().one("airline_10").await?;
//!
//!     // Query
//!     let us = template
//!         .find_by_query::<Airline>()
//!         .with_consistency(ScanConsistency::RequestPlus)
//!         .matching(Query::new(where_field("country").eq("United States")))
//!         .all()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod batch;
pub mod blocking;
pub mod cursor;
pub mod derive;
pub mod entity;
pub mod error;
pub mod execution;
#[cfg(feature = "memory")]
pub mod memory;
pub mod operation;
pub mod ops;
pub mod options;
pub mod query;
pub mod registry;
pub mod result;
pub mod store;
pub mod template;

// Re-export main types
pub use blocking::Blocking;
pub use cursor::Cursor;
pub use derive::{Operator, Part, PartTree, Subject};
pub use entity::Entity;
pub use error::{ErrorKind, ItemFailure, Result, StoreError};
pub use execution::{ExecutionStrategy, QueryMethod, QueryOutput, ReturnShape};
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use operation::{OperationSpec, ResolvedSpec};
pub use ops::Builder;
pub use options::{
    CallOptions, Durability, DurabilityLevel, ExistsOptions, GetOptions, PersistTo, QueryOptions,
    RemoveOptions, ReplicaOptions, ReplicateTo, WriteOptions,
};
pub use query::{where_field, Criteria, LikePattern, Page, Pageable, Query, ScanConsistency, SortOrder};
pub use registry::{QueryRegistry, QueryRegistryBuilder};
pub use result::{BatchOutcome, ItemOutcome, RemoveResult};
pub use store::{Keyspace, MutationResult, StoreClient, StoredDocument};
pub use template::{Template, TemplateOptions, TemplateOptionsBuilder};

// Re-export bson for convenience
pub use bson;
pub use bson::doc;

/// Prelude module for common imports.
pub mod prelude {
    pub use super::entity::Entity;
    pub use super::error::{ErrorKind, Result, StoreError};
    pub use super::execution::{QueryMethod, QueryOutput, ReturnShape};
    #[cfg(feature = "memory")]
    pub use super::memory::MemoryStore;
    pub use super::options::{Durability, DurabilityLevel, PersistTo, ReplicateTo};
    pub use super::query::{where_field, Pageable, Query, ScanConsistency, SortOrder};
    pub use super::registry::QueryRegistry;
    pub use super::template::{Template, TemplateOptions};
    pub use bson::{doc, Document};
    pub use serde::{Deserialize, Serialize};
}

/// Get the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "0.1.0");
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _: Result<()> = Ok(());
        let _doc = doc! { "id": "airline_10" };
        let _query = Query::new(where_field("country").eq("France"));
    }

    #[test]
    fn test_error_kind_variants() {
        let _ = ErrorKind::NotFound;
        let _ = ErrorKind::Conflict;
        let _ = ErrorKind::Timeout;
        let _ = ErrorKind::Query;
        let _ = ErrorKind::Serialization;
        let _ = ErrorKind::Internal;
    }
}
