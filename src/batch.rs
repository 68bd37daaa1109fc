use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};

/// Runs `op` over `items` with at most `limit` operations in flight.
///
/// Output `i` belongs to input `i` whatever the completion order. When the
/// outer `deadline` expires, finished outputs are kept and everything still
/// running is dropped and reported as `None`.
pub async fn fan_out<I, T, F, Fut>(
    items: Vec<I>,
    limit: usize,
    deadline: Duration,
    op: F,
) -> Vec<Option<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let mut results: Vec<Option<T>> = (0..items.len()).map(|_| None).collect();
    let total = results.len();

    let semaphore = &semaphore;
    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let task = op(item);
            async move {
                let output = match semaphore.acquire().await {
                    Ok(_permit) => task.await,
                    Err(_) => None,
                };
                (index, output)
            }
        })
        .collect();

    let deadline = Instant::now() + deadline;
    let mut completed = 0;
    loop {
        match timeout_at(deadline, pending.next()).await {
            Ok(Some((index, output))) => {
                results[index] = output;
                completed += 1;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(completed, total, "batch deadline expired, dropping unfinished work");
                break;
            }
        }
    }
    results
}
