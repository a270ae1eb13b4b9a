use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use super::types::InstallationResult;

/// Run the members of one level and wait until every one is terminal.
///
/// Parallel groups dispatch all members at once, bounded by
/// `max_concurrency`; a failing member never cancels its siblings. Serial
/// groups run one member at a time in the given order.
///
/// # Arguments
///
/// * `members` - Components of this level that are allowed to run
/// * `parallel` - The group's `can_install_parallel` flag
/// * `max_concurrency` - Maximum number of concurrent installs
/// * `install` - Async function driving one component to a terminal status
pub async fn run_group<F, Fut>(
    members: &[String],
    parallel: bool,
    max_concurrency: usize,
    install: F,
) -> Vec<InstallationResult>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = InstallationResult>,
{
    if !parallel || members.len() <= 1 || max_concurrency <= 1 {
        let mut results = Vec::with_capacity(members.len());
        for name in members {
            results.push(install(name.clone()).await);
        }
        return results;
    }

    let sem = Arc::new(Semaphore::new(max_concurrency));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for name in members {
        let sem = sem.clone();
        let fut = install(name.clone());

        futs.push(async move {
            // The semaphore is never closed, so a failed acquire only means
            // running without a permit.
            let _permit = sem.acquire_owned().await.ok();
            fut.await
        });
    }

    let mut results = Vec::with_capacity(members.len());
    while let Some(result) = futs.next().await {
        results.push(result);
    }
    results
}
