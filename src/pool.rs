//! Bounded fan-out / indexed fan-in.
//!
//! Every item gets its own task carrying its position. A semaphore bounds
//! how many run at once and each task gets its own deadline, started once its
//! permit is held. Outcomes come back in input order whatever order the tasks
//! finish in.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::classifier::PageFailure;

#[derive(Debug)]
pub struct IndexedOutcome<R> {
    pub index: usize,
    pub result: Result<R, PageFailure>,
    /// Time spent after the permit was acquired.
    pub elapsed: Duration,
}

pub async fn run_indexed<I, R, F, Fut>(
    items: Vec<I>,
    pool_size: usize,
    deadline: Duration,
    work: F,
) -> Vec<IndexedOutcome<R>>
where
    I: Send + 'static,
    R: Send + 'static,
    F: Fn(I) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<R, PageFailure>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(pool_size.max(1)));

    let handles = items
        .into_iter()
        .map(|item| {
            let semaphore = semaphore.clone();
            let work = work.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (Err(PageFailure::Aborted(e.to_string())), Duration::ZERO),
                };
                let started = Instant::now();
                let result = match timeout(deadline, work(item)).await {
                    Ok(result) => result,
                    Err(_) => Err(PageFailure::Deadline(deadline)),
                };
                (result, started.elapsed())
            })
        })
        .collect::<Vec<_>>();

    join_all(handles)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, joined)| match joined {
            Ok((result, elapsed)) => IndexedOutcome {
                index,
                result,
                elapsed,
            },
            Err(e) => {
                tracing::warn!("task {index} did not complete: {e}");
                IndexedOutcome {
                    index,
                    result: Err(PageFailure::Aborted(e.to_string())),
                    elapsed: Duration::ZERO,
                }
            }
        })
        .collect()
}
