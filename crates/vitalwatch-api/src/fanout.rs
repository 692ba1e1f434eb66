//! Concurrent request helpers with all-settle semantics.

use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;

use crate::client::ApiResponse;
use crate::error::Error;

/// Default cap on in-flight per-entity requests.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// The outcome of one request in a fan-out.
#[derive(Debug)]
pub struct Settled {
    pub path: String,
    pub result: Result<ApiResponse, Error>,
}

impl Settled {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `fetch` once per id with at most `batch_size` futures in flight.
///
/// Every id settles independently; results come back in input order,
/// paired with the id that produced them. A `batch_size` of zero is
/// treated as one.
pub async fn fetch_batched<I, T, E, F, Fut>(
    ids: I,
    batch_size: usize,
    fetch: F,
) -> Vec<(String, Result<T, E>)>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(ids)
        .map(|id| {
            let fut = fetch(id.clone());
            async move { (id, fut.await) }
        })
        .buffered(batch_size.max(1))
        .collect()
        .await
}
