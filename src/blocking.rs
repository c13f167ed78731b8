//! Synchronous adapter over the async operations.

use std::future::IntoFuture;

use futures::{Stream, TryStreamExt};
use tokio::runtime::{Builder, Runtime};

use crate::error::{Result, StoreError};

/// Runs async operations to completion on the calling thread.
///
/// Must not be used from inside an async context; tokio refuses to block
/// a runtime worker.
///
/// # Example
///
/// ```ignore
/// let blocking = Blocking::new()?;
/// let airline = blocking.wait(template.find_by_id::<Airline>().one("airline_10"))?;
/// ```
#[derive(Debug)]
pub struct Blocking {
    runtime: Runtime,
}

impl Blocking {
    /// Create an adapter backed by its own current-thread runtime.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| StoreError::Internal(format!("failed to start runtime: {e}")))?;
        Ok(Self { runtime })
    }

    /// Block until the future completes.
    pub fn wait<F: IntoFuture>(&self, future: F) -> F::Output {
        self.runtime.block_on(future.into_future())
    }

    /// Block until the stream ends, gathering every item.
    pub fn collect<S, T>(&self, stream: S) -> Result<Vec<T>>
    where
        S: Stream<Item = Result<T>>,
    {
        self.runtime.block_on(stream.try_collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_wait() {
        let blocking = Blocking::new().unwrap();
        let value = blocking.wait(async { 40 + 2 });
        assert_eq!(value, 42);
    }

    #[test]
    fn test_collect() {
        let blocking = Blocking::new().unwrap();
        let items = blocking
            .collect(stream::iter(vec![Ok(1), Ok(2), Ok(3)]))
            .unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_collect_error() {
        let blocking = Blocking::new().unwrap();
        let err = blocking
            .collect(stream::iter(vec![Ok(1), Err(StoreError::Timeout)]))
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
