//! Bounded-concurrency batch fetching.
//!
//! One [`BatchFetcher::fetch_all`] call fans a list of independent remote
//! operations out over a fixed number of in-flight requests and joins them
//! all before returning. Failures are absorbed per item: a failed or
//! timed-out operation yields that output type's defined empty value, so
//! the result vector always lines up with the input, slot for slot.

use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

use crate::api::ApiError;

/// Executes batches of independent remote calls with a parallelism cap
/// and a per-request timeout.
#[derive(Debug, Clone)]
pub struct BatchFetcher {
    max_in_flight: usize,
    request_timeout: Duration,
}

impl BatchFetcher {
    /// Create a fetcher.
    ///
    /// # Arguments
    ///
    /// * `max_in_flight` - Maximum concurrent requests (floored at 1)
    /// * `request_timeout` - Deadline applied to each request individually
    pub fn new(max_in_flight: usize, request_timeout: Duration) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            request_timeout,
        }
    }

    /// Run `op` over every item concurrently and collect the outputs in
    /// input order.
    ///
    /// All operations are issued through a window of `max_in_flight`
    /// concurrent requests; the call returns only once every one of them
    /// has completed or failed. A per-item error or timeout is logged and
    /// replaced with `O::default()`; it never aborts the batch.
    pub async fn fetch_all<I, O, F, Fut>(&self, items: Vec<I>, op: F) -> Vec<O>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<O, ApiError>>,
        O: Default,
    {
        let deadline = self.request_timeout;
        let total = items.len();

        let requests = items.into_iter().enumerate().map(|(index, item)| {
            let request = op(item);
            async move {
                match tokio::time::timeout(deadline, request).await {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        log::warn!("batch item {}/{} failed: {}", index + 1, total, e);
                        O::default()
                    }
                    Err(_) => {
                        log::warn!(
                            "batch item {}/{} failed: {}",
                            index + 1,
                            total,
                            ApiError::Timeout(deadline)
                        );
                        O::default()
                    }
                }
            }
        });

        // `buffered` (not `buffer_unordered`) keeps outputs aligned with inputs.
        stream::iter(requests)
            .buffered(self.max_in_flight)
            .collect()
            .await
    }

    /// Run `op` over fixed-size chunks of `items`, concatenating the chunk
    /// outputs in input order.
    ///
    /// Used for bulk lookups where the remote API caps how many ids fit in
    /// one call. A failed chunk contributes nothing to the output (its
    /// failure is logged by [`fetch_all`](Self::fetch_all)).
    pub async fn fetch_chunked<I, O, F, Fut>(
        &self,
        items: Vec<I>,
        chunk_size: usize,
        op: F,
    ) -> Vec<O>
    where
        I: Clone,
        F: Fn(Vec<I>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<O>, ApiError>>,
    {
        let chunks: Vec<Vec<I>> = items
            .chunks(chunk_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();

        let outputs: Vec<Vec<O>> = self.fetch_all(chunks, op).await;
        outputs.into_iter().flatten().collect()
    }
}
