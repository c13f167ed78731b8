//! Tests for declared query methods.
//!
//! Methods are registered once and executed against a template backed by
//! the in-memory store.

use bson::Bson;
use docspace::{prelude::*, store::Keyspace, ExecutionStrategy, PartTree, Subject};
use futures::StreamExt;

// ============================================================================
// Test Entity Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Route {
    id: String,
    airline: String,
    source: String,
    destination: String,
    stops: i32,
}

impl Route {
    fn new(id: &str, airline: &str, source: &str, destination: &str, stops: i32) -> Self {
        Self {
            id: id.to_string(),
            airline: airline.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
            stops,
        }
    }
}

impl Entity for Route {
    const COLLECTION: Option<&'static str> = Some("route");

    fn id(&self) -> String {
        self.id.clone()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup() -> (MemoryStore, Template) {
    init_tracing();
    let store = MemoryStore::new();
    let template = Template::new(store.clone());
    template
        .upsert_by_id::<Route>()
        .all(vec![
            Route::new("r1", "AF", "CDG", "LHR", 0),
            Route::new("r2", "AF", "CDG", "JFK", 0),
            Route::new("r3", "AF", "ORY", "LIS", 1),
            Route::new("r4", "BA", "LHR", "JFK", 0),
            Route::new("r5", "BA", "LHR", "SFO", 1),
        ])
        .await
        .unwrap()
        .into_result()
        .unwrap();
    (store, template)
}

fn registry() -> QueryRegistry {
    QueryRegistry::builder()
        .register(QueryMethod::new("findByAirline", ReturnShape::Collection))
        .unwrap()
        .register(QueryMethod::new(
            "findByAirlineOrderByDestinationDesc",
            ReturnShape::Collection,
        ))
        .unwrap()
        .register(QueryMethod::new("findPageByAirline", ReturnShape::Page))
        .unwrap()
        .register(QueryMethod::new("findBySourceAndDestination", ReturnShape::Single))
        .unwrap()
        .register(QueryMethod::new("findOneByDestination", ReturnShape::Optional))
        .unwrap()
        .register(QueryMethod::new("findFirstByAirlineOrderByIdDesc", ReturnShape::Single))
        .unwrap()
        .register(QueryMethod::new("countByStopsGreaterThan", ReturnShape::Count))
        .unwrap()
        .register(QueryMethod::new("existsByDestination", ReturnShape::Exists))
        .unwrap()
        .register(QueryMethod::new("deleteByAirline", ReturnShape::Collection))
        .unwrap()
        .register(QueryMethod::new(
            "streamByDestination",
            ReturnShape::Stream { tailable: true },
        ))
        .unwrap()
        .register(QueryMethod::new(
            "streamByAirline",
            ReturnShape::Stream { tailable: false },
        ))
        .unwrap()
        .build()
}

fn param(value: &str) -> Bson {
    Bson::String(value.to_string())
}

// ============================================================================
// Registration Tests
// ============================================================================

mod registration_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strategies_selected_once() {
        let registry = registry();
        assert_eq!(registry.len(), 11);

        let expected = [
            ("findByAirline", ExecutionStrategy::Collection),
            ("findPageByAirline", ExecutionStrategy::Paged),
            ("findBySourceAndDestination", ExecutionStrategy::Single),
            ("findFirstByAirlineOrderByIdDesc", ExecutionStrategy::First),
            ("countByStopsGreaterThan", ExecutionStrategy::Count),
            ("existsByDestination", ExecutionStrategy::Exists),
            ("deleteByAirline", ExecutionStrategy::Delete),
            ("streamByDestination", ExecutionStrategy::Streaming),
            ("streamByAirline", ExecutionStrategy::Collection),
        ];
        for (name, strategy) in expected {
            assert_eq!(registry.strategy(name), Some(strategy), "{name}");
        }
    }

    #[test]
    fn test_count_and_exists_rejected() {
        let err = QueryRegistry::builder()
            .register(QueryMethod::new("countByAirline", ReturnShape::Count).exists_query())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
    }

    #[test]
    fn test_delete_with_count_shape_registers() {
        let registry = QueryRegistry::builder()
            .register(QueryMethod::new("deleteByAirline", ReturnShape::Count))
            .unwrap()
            .register(QueryMethod::new("removeByAirline", ReturnShape::Exists))
            .unwrap()
            .build();
        assert_eq!(registry.strategy("deleteByAirline"), Some(ExecutionStrategy::Delete));
        assert_eq!(registry.strategy("removeByAirline"), Some(ExecutionStrategy::Delete));
    }

    #[test]
    fn test_distinct_rejected() {
        let err = QueryRegistry::builder()
            .register(QueryMethod::new("findDistinctByAirline", ReturnShape::Collection))
            .unwrap_err();
        assert!(matches!(err, StoreError::QueryDerivation(_)));
    }

    #[test]
    fn test_unparseable_name_rejected() {
        let err = QueryRegistry::builder()
            .register(QueryMethod::new("routesOfAirline", ReturnShape::Collection))
            .unwrap_err();
        assert!(matches!(err, StoreError::QueryDerivation(_)));
    }

    #[test]
    fn test_derived_tree() {
        let tree = PartTree::parse("findFirstByAirlineOrderByIdDesc").unwrap();
        assert_eq!(tree.subject(), Subject::Find);
        assert_eq!(tree.limit(), Some(1));
        assert_eq!(tree.arity(), 1);
    }
}

// ============================================================================
// Execution Tests
// ============================================================================

mod execution_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_collection() {
        let (_store, template) = setup().await;
        let registry = registry();

        let routes = registry
            .execute::<Route>(&template, "findByAirlineOrderByDestinationDesc", &[param("AF")], None)
            .await
            .unwrap()
            .into_many()
            .unwrap();
        let destinations: Vec<&str> = routes.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(destinations, vec!["LIS", "LHR", "JFK"]);
    }

    #[tokio::test]
    async fn test_collection_applies_pageable() {
        let (_store, template) = setup().await;
        let routes = registry()
            .execute::<Route>(&template, "findByAirline", &[param("AF")], Some(Pageable::of(1, 2)))
            .await
            .unwrap()
            .into_many()
            .unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[tokio::test]
    async fn test_paged() {
        let store = MemoryStore::new();
        let template = Template::new(store);
        let routes: Vec<Route> = (0..25)
            .map(|i| Route::new(&format!("r{i:02}"), "AF", "CDG", "LHR", 0))
            .collect();
        template.upsert_by_id::<Route>().all(routes).await.unwrap();

        let page = registry()
            .execute::<Route>(&template, "findPageByAirline", &[param("AF")], Some(Pageable::of(0, 10)))
            .await
            .unwrap()
            .into_page()
            .unwrap();
        assert_eq!(page.content.len(), 10);
        assert_eq!(page.total, 25);
    }

    #[tokio::test]
    async fn test_paged_needs_pageable() {
        let (_store, template) = setup().await;
        let err = registry()
            .execute::<Route>(&template, "findPageByAirline", &[param("AF")], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_single() {
        let (_store, template) = setup().await;
        let registry = registry();

        let route = registry
            .execute::<Route>(
                &template,
                "findBySourceAndDestination",
                &[param("LHR"), param("SFO")],
                None,
            )
            .await
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(route.id, "r5");

        let err = registry
            .execute::<Route>(
                &template,
                "findBySourceAndDestination",
                &[param("LHR"), param("NRT")],
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = registry
            .execute::<Route>(&template, "findBySourceAndDestination", &[param("LHR")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QueryDerivation(_)));
    }

    #[tokio::test]
    async fn test_single_with_many_matches() {
        let (_store, template) = setup().await;
        let err = registry()
            .execute::<Route>(&template, "findOneByDestination", &[param("JFK")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IncorrectResultSize { actual: 2, .. }));
    }

    #[tokio::test]
    async fn test_optional() {
        let (_store, template) = setup().await;
        let registry = registry();

        let found = registry
            .execute::<Route>(&template, "findOneByDestination", &[param("LIS")], None)
            .await
            .unwrap()
            .into_optional()
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some("r3".to_string()));

        let missing = registry
            .execute::<Route>(&template, "findOneByDestination", &[param("NRT")], None)
            .await
            .unwrap()
            .into_optional()
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_first() {
        let (_store, template) = setup().await;
        let route = registry()
            .execute::<Route>(&template, "findFirstByAirlineOrderByIdDesc", &[param("AF")], None)
            .await
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(route.id, "r3");
    }

    #[tokio::test]
    async fn test_count_and_exists() {
        let (_store, template) = setup().await;
        let registry = registry();

        let count = registry
            .execute::<Route>(&template, "countByStopsGreaterThan", &[Bson::Int32(0)], None)
            .await
            .unwrap()
            .into_count();
        assert_eq!(count, Some(2));

        let exists = registry
            .execute::<Route>(&template, "existsByDestination", &[param("SFO")], None)
            .await
            .unwrap()
            .into_exists();
        assert_eq!(exists, Some(true));
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, template) = setup().await;
        let removed = registry()
            .execute::<Route>(&template, "deleteByAirline", &[param("BA")], None)
            .await
            .unwrap()
            .into_removed()
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert!(removed.is_complete());
        assert_eq!(store.len(&Keyspace::new("_default", "route")).await, 3);
    }

    #[tokio::test]
    async fn test_delete_returning_count() {
        let (store, template) = setup().await;
        let registry = QueryRegistry::builder()
            .register(QueryMethod::new("deleteByAirline", ReturnShape::Count))
            .unwrap()
            .register(QueryMethod::new("removeByAirline", ReturnShape::Exists))
            .unwrap()
            .build();

        let count = registry
            .execute::<Route>(&template, "deleteByAirline", &[param("BA")], None)
            .await
            .unwrap()
            .into_count();
        assert_eq!(count, Some(2));
        assert_eq!(store.len(&Keyspace::new("_default", "route")).await, 3);

        let removed_any = registry
            .execute::<Route>(&template, "removeByAirline", &[param("BA")], None)
            .await
            .unwrap()
            .into_exists();
        assert_eq!(removed_any, Some(false));
    }

    #[tokio::test]
    async fn test_page_offset_overflow() {
        let (_store, template) = setup().await;
        let huge = Some(Pageable::of(u64::MAX / 2, 10));

        let err = registry()
            .execute::<Route>(&template, "findPageByAirline", &[param("AF")], huge)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = registry()
            .execute::<Route>(&template, "findByAirline", &[param("AF")], huge)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_bounded_stream() {
        let (_store, template) = setup().await;
        let cursor = registry()
            .execute::<Route>(&template, "streamByAirline", &[param("BA")], None)
            .await
            .unwrap()
            .into_stream()
            .unwrap();
        assert_eq!(cursor.collect().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tailable_stream() {
        let (_store, template) = setup().await;
        let mut cursor = registry()
            .execute::<Route>(&template, "streamByDestination", &[param("SFO")], None)
            .await
            .unwrap()
            .into_stream()
            .unwrap();

        template
            .insert_by_id::<Route>()
            .one(Route::new("r6", "UA", "ORD", "SFO", 0))
            .await
            .unwrap();

        assert_eq!(cursor.next().await.unwrap().unwrap().id, "r5");
        assert_eq!(cursor.next().await.unwrap().unwrap().id, "r6");
    }

    #[tokio::test]
    async fn test_method_collection_and_consistency() {
        let (store, template) = setup().await;
        template
            .upsert_by_id::<Route>()
            .in_collection("archived_route")
            .one(Route::new("old", "AF", "CDG", "TXL", 0))
            .await
            .unwrap();

        let registry = QueryRegistry::builder()
            .register(
                QueryMethod::new("findByAirline", ReturnShape::Collection)
                    .in_collection("archived_route")
                    .with_consistency(ScanConsistency::RequestPlus),
            )
            .unwrap()
            .build();
        let routes = registry
            .execute::<Route>(&template, "findByAirline", &[param("AF")], None)
            .await
            .unwrap()
            .into_many()
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].id, "old");
        assert_eq!(store.len(&Keyspace::new("_default", "archived_route")).await, 1);
    }

    #[tokio::test]
    async fn test_explicit_query() {
        let (_store, template) = setup().await;
        let registry = QueryRegistry::builder()
            .register(
                QueryMethod::new("nonstopRoutes", ReturnShape::Count)
                    .with_query(Query::new(where_field("stops").eq(0))),
            )
            .unwrap()
            .build();
        let count = registry
            .execute::<Route>(&template, "nonstopRoutes", &[], None)
            .await
            .unwrap()
            .into_count();
        assert_eq!(count, Some(3));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_store, template) = setup().await;
        let err = registry()
            .execute::<Route>(&template, "findByPilot", &[param("x")], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
