//! Cursor implementation for iterating over query results.

use futures::stream::{self, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::Result;
use crate::store::{DocumentStream, StoredDocument};

type Decode<T> = fn(StoredDocument) -> Result<T>;

/// A lazy, typed sequence of query results.
///
/// Cursors implement `Stream` and can be used with async iteration. A cursor
/// from a tailing query never ends on its own; drop it to stop.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut cursor = template
///     .find_by_query::<Airline>()
///     .matching(Query::new(where_field("country").eq("France")))
///     .stream()
///     .await?;
/// while let Some(airline) = cursor.next().await {
///     println!("{:?}", airline?);
/// }
/// ```
pub struct Cursor<T> {
    inner: DocumentStream,
    decode: Decode<T>,
}

impl<T> Cursor<T> {
    pub(crate) fn new(inner: DocumentStream, decode: Decode<T>) -> Self {
        Self { inner, decode }
    }

    /// A cursor that yields nothing.
    pub fn empty(decode: Decode<T>) -> Self {
        Self::new(stream::empty().boxed(), decode)
    }

    /// Get the next item, or `None` once the cursor is exhausted.
    pub async fn try_next(&mut self) -> Result<Option<T>> {
        match self.inner.next().await {
            Some(stored) => (self.decode)(stored?).map(Some),
            None => Ok(None),
        }
    }

    /// Collect all remaining items into a vector.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut results = Vec::new();
        while let Some(item) = self.try_next().await? {
            results.push(item);
        }
        Ok(results)
    }
}

impl<T> Stream for Cursor<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(stored)) => Poll::Ready(Some(stored.and_then(this.decode))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("item", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::decode_as;
    use crate::error::StoreError;
    use bson::{doc, Document};

    fn stored(id: &str, n: i32) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            cas: 1,
            content: doc! { "id": id, "n": n },
            expiry: None,
        }
    }

    #[tokio::test]
    async fn test_cursor_collect() {
        let inner = stream::iter(vec![Ok(stored("a", 1)), Ok(stored("b", 2))]).boxed();
        let cursor: Cursor<Document> = Cursor::new(inner, decode_as);

        let docs = cursor.collect().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get_i32("n").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cursor_empty() {
        let mut cursor: Cursor<Document> = Cursor::empty(decode_as);
        assert!(cursor.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_forwards_errors() {
        let inner = stream::iter(vec![Ok(stored("a", 1)), Err(StoreError::Timeout)]).boxed();
        let mut cursor: Cursor<Document> = Cursor::new(inner, decode_as);

        assert!(cursor.try_next().await.unwrap().is_some());
        assert!(cursor.try_next().await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_cursor_as_stream() {
        let inner = stream::iter(vec![Ok(stored("a", 1)), Ok(stored("b", 2))]).boxed();
        let cursor: Cursor<Document> = Cursor::new(inner, decode_as);

        let ids: Vec<String> = cursor
            .map(|doc| doc.unwrap().get_str("id").unwrap().to_string())
            .collect()
            .await;
        assert_eq!(ids, vec!["a", "b"]);
    }
}
