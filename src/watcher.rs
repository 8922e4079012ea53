use crate::config::Config;
use crate::error::Result;
use crate::fetch::{build_strategies, Fetcher, RetryPolicy};
use crate::proxy::{HttpProxySource, ProxyPool};
use crate::scraper::{Extractor, ItemRecord};
use crate::store::{LastGoodProxyStore, SeenStore};
use crate::{log_error, log_info, log_warn};
use tokio::sync::Mutex;
use url::Url;

/// State touched by a fetch cycle. Held behind one lock so cycles never
/// overlap.
struct Cycle {
    fetcher: Fetcher,
    seen: SeenStore,
}

pub struct Watcher {
    cycle: Mutex<Cycle>,
    extractor: Extractor,
    target: Url,
    item_limit: usize,
}

impl Watcher {
    pub fn new(
        fetcher: Fetcher,
        extractor: Extractor,
        seen: SeenStore,
        target: Url,
        item_limit: usize,
    ) -> Self {
        Self {
            cycle: Mutex::new(Cycle { fetcher, seen }),
            extractor,
            target,
            item_limit,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let target = config.listing_url()?;
        let extractor = Extractor::new(&config.scrape, config.base()?)?;

        let source = HttpProxySource::new(
            config.proxy.source_urls.clone(),
            config.fetch.request_timeout(),
            config.proxy.https_only,
        );
        let fetcher = Fetcher::new(
            build_strategies(config)?,
            ProxyPool::new(LastGoodProxyStore::open(&config.proxy.cache_file)),
            Box::new(source),
            RetryPolicy::from_config(&config.fetch),
        );

        Ok(Self::new(
            fetcher,
            extractor,
            SeenStore::open(&config.store.seen_file),
            target,
            config.item_limit,
        ))
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Items on the listing that were never returned before. Marks and
    /// persists them before returning. Returns nothing when the page could
    /// not be fetched, and skips outright if another cycle is running.
    #[tracing::instrument(name = "poll", skip_all)]
    pub async fn poll(&self) -> Vec<ItemRecord> {
        let Ok(mut cycle) = self.cycle.try_lock() else {
            log_info!("[watcher] Previous cycle still running, skipping this trigger");
            return Vec::new();
        };

        let Some(body) = cycle.fetcher.fetch(&self.target).await else {
            log_warn!("[watcher] No episodes scraped, possibly blocked or site down");
            return Vec::new();
        };

        let candidates = self.extractor.extract(&body, self.item_limit);
        let fresh = cycle.seen.filter_new(candidates);
        if fresh.is_empty() {
            log_info!("[watcher] No new episodes");
            return fresh;
        }

        cycle.seen.mark(&fresh);
        if let Err(e) = cycle.seen.persist() {
            log_error!("[watcher] Could not persist seen set, keeping it in memory: {}", e);
        }
        log_info!(
            "[watcher] {} new episodes ({} seen in total)",
            fresh.len(),
            cycle.seen.len()
        );
        fresh
    }

    /// The newest `limit` items regardless of whether they were seen. Waits
    /// for any running cycle and leaves the seen set untouched.
    #[tracing::instrument(name = "latest", skip(self))]
    pub async fn latest(&self, limit: usize) -> Vec<ItemRecord> {
        let mut cycle = self.cycle.lock().await;
        match cycle.fetcher.fetch(&self.target).await {
            Some(body) => self.extractor.extract(&body, limit),
            None => {
                log_warn!("[watcher] Could not fetch episodes right now");
                Vec::new()
            }
        }
    }

    pub async fn seen_count(&self) -> usize {
        self.cycle.lock().await.seen.len()
    }
}
