//! Ordered fan-out used by every bulk terminal operation.

use futures::{stream, Future, StreamExt, TryStreamExt};

use crate::error::Result;
use crate::result::{BatchOutcome, ItemOutcome};

/// Run `op` for every input with at most `concurrency` calls in flight.
///
/// Outcomes keep input order. Item failures are recorded in the envelope;
/// a fatal failure aborts the batch and is returned as the call's error.
pub(crate) async fn run_ordered<I, T, F, Fut>(
    inputs: Vec<(String, I)>,
    concurrency: usize,
    op: F,
) -> Result<BatchOutcome<T>>
where
    F: Fn(String, I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let items = stream::iter(inputs.into_iter().enumerate())
        .map(|(index, (id, input))| {
            let call = op(id.clone(), input);
            async move { (index, id, call.await) }
        })
        .buffered(concurrency.max(1))
        .map(|(index, id, result)| match result {
            Err(error) if error.is_fatal() => {
                tracing::warn!(index, id = %id, error = %error, "aborting bulk operation");
                Err(error)
            }
            result => {
                if let Err(error) = &result {
                    tracing::warn!(index, id = %id, error = %error, "bulk item failed");
                }
                Ok(ItemOutcome { index, id, result })
            }
        })
        .try_collect::<Vec<_>>()
        .await?;

    Ok(BatchOutcome::new(items))
}

/// Like [`run_ordered`], but any failure fails the whole call.
pub(crate) async fn try_ordered<I, T, F, Fut>(
    inputs: Vec<(String, I)>,
    concurrency: usize,
    op: F,
) -> Result<Vec<(String, T)>>
where
    F: Fn(String, I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(inputs)
        .map(|(id, input)| {
            let call = op(id.clone(), input);
            async move { call.await.map(|value| (id, value)) }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}
