//! Mapping between typed entities and stored documents.

use bson::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::store::StoredDocument;

/// A type persisted as one document keyed by its identifier.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Airline {
///     id: String,
///     name: String,
///     #[serde(skip)]
///     version: Option<u64>,
/// }
///
/// impl Entity for Airline {
///     const COLLECTION: Option<&'static str> = Some("airline");
///
///     fn id(&self) -> String {
///         self.id.clone()
///     }
///
///     fn version(&self) -> Option<u64> {
///         self.version
///     }
///
///     fn set_version(&mut self, cas: u64) {
///         self.version = Some(cas);
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Collection used when an operation does not name one.
    const COLLECTION: Option<&'static str> = None;

    /// Document identifier.
    fn id(&self) -> String;

    /// CAS of the revision this value was read from, if tracked.
    fn version(&self) -> Option<u64> {
        None
    }

    /// Record the CAS after a read or write.
    fn set_version(&mut self, cas: u64) {
        let _ = cas;
    }
}

/// Untyped documents are entities keyed by their `id` field.
impl Entity for Document {
    fn id(&self) -> String {
        match self.get("id") {
            Some(bson::Bson::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Document> {
    Ok(bson::to_document(value)?)
}

pub(crate) fn decode_entity<T: Entity>(stored: StoredDocument) -> Result<T> {
    let mut entity: T = bson::from_document(stored.content)?;
    entity.set_version(stored.cas);
    Ok(entity)
}

pub(crate) fn decode_as<R: DeserializeOwned>(stored: StoredDocument) -> Result<R> {
    Ok(bson::from_document(stored.content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Route {
        id: String,
        stops: i32,
        #[serde(skip)]
        version: Option<u64>,
    }

    impl Entity for Route {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn version(&self) -> Option<u64> {
            self.version
        }

        fn set_version(&mut self, cas: u64) {
            self.version = Some(cas);
        }
    }

    #[test]
    fn test_decode_entity_sets_version() {
        let stored = StoredDocument {
            id: "r1".to_string(),
            cas: 17,
            content: doc! { "id": "r1", "stops": 2 },
            expiry: None,
        };
        let route: Route = decode_entity(stored).unwrap();
        assert_eq!(route.stops, 2);
        assert_eq!(route.version(), Some(17));
    }

    #[test]
    fn test_encode_skips_version() {
        let route = Route {
            id: "r1".to_string(),
            stops: 3,
            version: Some(9),
        };
        let doc = encode(&route).unwrap();
        assert_eq!(doc, doc! { "id": "r1", "stops": 3 });
    }

    #[test]
    fn test_document_entity_id() {
        assert_eq!(doc! { "id": "a" }.id(), "a");
        assert_eq!(doc! { "id": 7 }.id(), "7");
        assert_eq!(doc! {}.id(), "");
    }
}
