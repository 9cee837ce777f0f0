use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::fetch::Fetcher;

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTarget {
    pub company_id: String,
    pub company_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Fetched(String),
    Failed(String),
    /// The fetch hit the hard timeout and was abandoned.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub target: CrawlTarget,
    pub outcome: CrawlOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    pub concurrency: usize,
    /// Pause each slot holds after its fetch before the next company may use it.
    pub delay: Duration,
    pub timeout: Duration,
}

impl CrawlOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            concurrency: settings.crawl_concurrency.max(1),
            delay: settings.crawl_delay(),
            timeout: settings.fetch_timeout(),
        }
    }
}

/// Fetch every target with bounded concurrency. Results come back in target order.
pub async fn crawl(fetcher: Arc<dyn Fetcher>, targets: Vec<CrawlTarget>, options: CrawlOptions) -> Vec<CrawlResult> {
    let total = targets.len();
    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let (tx, mut rx) = mpsc::channel::<(usize, CrawlResult)>(options.concurrency * 2);

    for (i, target) in targets.into_iter().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let outcome = match tokio::time::timeout(options.timeout, fetcher.fetch(&target.url)).await {
                Ok(Ok(html)) => CrawlOutcome::Fetched(html),
                Ok(Err(e)) => {
                    warn!("Crawl of {} failed: {}", target.company_name, e);
                    CrawlOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    warn!("Crawl of {} timed out after {:?}, skipping", target.company_name, options.timeout);
                    CrawlOutcome::Skipped
                }
            };
            debug!("Crawled {} ({})", target.url, i);
            let _ = tx.send((i, CrawlResult { target, outcome })).await;
            tokio::time::sleep(options.delay).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, r)| r).collect()
}
