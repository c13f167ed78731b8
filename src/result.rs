//! Per-item result envelopes for bulk operations.

use crate::error::{ItemFailure, Result, StoreError};

/// Result of removing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveResult {
    /// Identifier of the removed document.
    pub id: String,
    /// CAS after the removal.
    pub cas: u64,
}

/// Outcome for one input of a bulk operation.
#[derive(Debug)]
pub struct ItemOutcome<T> {
    /// Position of the item in the input.
    pub index: usize,
    /// Identifier of the item.
    pub id: String,
    /// Value on success, or the item's failure.
    pub result: Result<T>,
}

impl<T> ItemOutcome<T> {
    /// Whether the item succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The value, if the item succeeded.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The failure, if the item failed.
    pub fn error(&self) -> Option<&StoreError> {
        self.result.as_ref().err()
    }
}

/// Outcomes of a bulk operation, one per input, in input order.
///
/// # Example
///
/// ```ignore
/// let outcome = template.find_by_id::<Airline>().all(["a", "missing", "b"]).await?;
/// assert_eq!(outcome.len(), 3);
/// for item in outcome.failures() {
///     println!("{} failed: {:?}", item.id, item.error());
/// }
/// ```
#[derive(Debug)]
pub struct BatchOutcome<T> {
    items: Vec<ItemOutcome<T>>,
}

impl<T> BatchOutcome<T> {
    pub(crate) fn new(items: Vec<ItemOutcome<T>>) -> Self {
        Self { items }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch had no inputs.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Outcome at an input position.
    pub fn get(&self, index: usize) -> Option<&ItemOutcome<T>> {
        self.items.get(index)
    }

    /// All outcomes in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, ItemOutcome<T>> {
        self.items.iter()
    }

    /// Whether every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(ItemOutcome::is_ok)
    }

    /// Successful values in input order.
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter_map(ItemOutcome::value)
    }

    /// Failed items in input order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome<T>> {
        self.items.iter().filter(|item| !item.is_ok())
    }

    /// Number of failed items.
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// All values, or `PartialBatchFailure` listing every failed item.
    pub fn into_result(self) -> Result<Vec<T>> {
        let mut values = Vec::with_capacity(self.items.len());
        let mut failures = Vec::new();
        for item in self.items {
            match item.result {
                Ok(value) => values.push(value),
                Err(error) => failures.push(ItemFailure {
                    index: item.index,
                    id: item.id,
                    error,
                }),
            }
        }
        if failures.is_empty() {
            Ok(values)
        } else {
            Err(StoreError::PartialBatchFailure { failures })
        }
    }

    /// Transform every successful value.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchOutcome<U> {
        BatchOutcome {
            items: self
                .items
                .into_iter()
                .map(|item| ItemOutcome {
                    index: item.index,
                    id: item.id,
                    result: item.result.map(&mut f),
                })
                .collect(),
        }
    }
}

impl<T> IntoIterator for BatchOutcome<T> {
    type Item = ItemOutcome<T>;
    type IntoIter = std::vec::IntoIter<ItemOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a BatchOutcome<T> {
    type Item = &'a ItemOutcome<T>;
    type IntoIter = std::slice::Iter<'a, ItemOutcome<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed() -> BatchOutcome<i32> {
        BatchOutcome::new(vec![
            ItemOutcome {
                index: 0,
                id: "a".to_string(),
                result: Ok(1),
            },
            ItemOutcome {
                index: 1,
                id: "missing".to_string(),
                result: Err(StoreError::not_found("missing")),
            },
            ItemOutcome {
                index: 2,
                id: "b".to_string(),
                result: Ok(3),
            },
        ])
    }

    #[test]
    fn test_batch_accessors() {
        let batch = mixed();
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_complete());
        assert_eq!(batch.successes().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(batch.failure_count(), 1);
        assert_eq!(batch.get(1).unwrap().id, "missing");
        assert!(batch.get(1).unwrap().error().unwrap().is_not_found());
    }

    #[test]
    fn test_into_result_partial_failure() {
        let err = mixed().into_result().unwrap_err();
        match err {
            StoreError::PartialBatchFailure { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
                assert_eq!(failures[0].id, "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_into_result_complete() {
        let batch = BatchOutcome::new(vec![ItemOutcome {
            index: 0,
            id: "a".to_string(),
            result: Ok("x"),
        }]);
        assert!(batch.is_complete());
        assert_eq!(batch.into_result().unwrap(), vec!["x"]);
    }

    #[test]
    fn test_map_keeps_positions() {
        let mapped = mixed().map(|n| n * 10);
        let ids: Vec<_> = mapped.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "missing", "b"]);
        assert_eq!(mapped.successes().copied().collect::<Vec<_>>(), vec![10, 30]);
    }
}
