use super::{ProxyCandidate, ProxySource};
use crate::store::LastGoodProxyStore;
use crate::{log_debug, log_info, log_warn};
use rand::Rng;

/// Working set of egress proxies for the current cycle plus the persisted
/// last-known-good proxy, which is always offered first.
pub struct ProxyPool {
    pool: Vec<ProxyCandidate>,
    last_good: Option<ProxyCandidate>,
    last_good_offered: bool,
    refreshed_this_cycle: bool,
    cache: LastGoodProxyStore,
}

impl ProxyPool {
    pub fn new(cache: LastGoodProxyStore) -> Self {
        let last_good = cache.load().map(|address| ProxyCandidate::new(address, true));
        if let Some(proxy) = &last_good {
            log_info!("[proxy] Restored last known good proxy {}", proxy);
        }

        Self {
            pool: Vec::new(),
            last_good,
            last_good_offered: false,
            refreshed_this_cycle: false,
            cache,
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn last_good(&self) -> Option<&ProxyCandidate> {
        self.last_good.as_ref()
    }

    /// Resets per-cycle bookkeeping: the last-known-good proxy becomes
    /// eligible again and the pool may be refreshed once more.
    pub fn begin_cycle(&mut self) {
        self.last_good_offered = false;
        self.refreshed_this_cycle = false;
    }

    /// Replaces the pool with a fresh listing. Source failures leave the pool
    /// empty; they are logged and never propagated.
    pub async fn refresh(&mut self, source: &dyn ProxySource) -> usize {
        self.refreshed_this_cycle = true;
        match source.fetch_candidates().await {
            Ok(candidates) => {
                let last_good = self.last_good.as_ref().map(|p| p.address.clone());
                self.pool = candidates
                    .into_iter()
                    .filter(|c| Some(&c.address) != last_good.as_ref())
                    .collect();
                log_info!("[proxy] Refreshed pool with {} candidates", self.pool.len());
            }
            Err(e) => {
                self.pool.clear();
                log_warn!("[proxy] Pool refresh failed, continuing without proxies: {}", e);
            }
        }
        self.pool.len()
    }

    /// Last-known-good first (once per cycle), then a uniformly random pick
    /// that is removed from the pool.
    pub fn pick_next(&mut self) -> Option<ProxyCandidate> {
        if !self.last_good_offered {
            self.last_good_offered = true;
            if let Some(proxy) = &self.last_good {
                return Some(proxy.clone());
            }
        }

        if self.pool.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.pool.len());
        Some(self.pool.swap_remove(index))
    }

    /// `pick_next`, refreshing from `source` the first time the pool runs dry
    /// in a cycle. With `require_https`, candidates that cannot tunnel TLS
    /// are discarded for the rest of the cycle.
    pub async fn next_candidate(
        &mut self,
        source: &dyn ProxySource,
        require_https: bool,
    ) -> Option<ProxyCandidate> {
        loop {
            let proxy = match self.pick_next() {
                Some(proxy) => proxy,
                None if self.refreshed_this_cycle => return None,
                None => {
                    self.refresh(source).await;
                    continue;
                }
            };
            if require_https && !proxy.https {
                log_debug!("[proxy] Skipping {}: no https support", proxy);
                continue;
            }
            return Some(proxy);
        }
    }

    pub fn record_success(&mut self, proxy: &ProxyCandidate) {
        if self.last_good.as_ref() != Some(proxy) {
            log_info!("[proxy] Promoting {} to last known good", proxy);
        }
        self.last_good = Some(proxy.clone());
        if let Err(e) = self.cache.save(Some(&proxy.address)) {
            log_warn!("[proxy] Could not persist last known good proxy: {}", e);
        }
    }

    /// Drops a proxy that failed. Picked candidates are already out of the
    /// pool, so this only matters when the failure was the cached proxy.
    pub fn record_failure(&mut self, proxy: &ProxyCandidate) {
        self.pool.retain(|c| c.address != proxy.address);
        if self.last_good.as_ref().is_some_and(|p| p.address == proxy.address) {
            log_warn!("[proxy] Last known good proxy {} failed, forgetting it", proxy);
            self.last_good = None;
            if let Err(e) = self.cache.save(None) {
                log_warn!("[proxy] Could not clear last known good proxy: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProxyError, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticSource {
        addresses: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(addresses: Vec<&'static str>) -> Self {
            Self {
                addresses,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProxySource for StaticSource {
        async fn fetch_candidates(&self) -> Result<Vec<ProxyCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .addresses
                .iter()
                .map(|a| ProxyCandidate::new(*a, true))
                .collect())
        }
    }

    struct MixedSource;

    #[async_trait]
    impl ProxySource for MixedSource {
        async fn fetch_candidates(&self) -> Result<Vec<ProxyCandidate>> {
            Ok(vec![
                ProxyCandidate::new("1.1.1.1:80", false),
                ProxyCandidate::new("2.2.2.2:80", true),
                ProxyCandidate::new("3.3.3.3:80", false),
            ])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ProxySource for FailingSource {
        async fn fetch_candidates(&self) -> Result<Vec<ProxyCandidate>> {
            Err(ProxyError::SourceUnavailable("offline".into()).into())
        }
    }

    #[tokio::test]
    async fn picks_each_candidate_once_per_cycle() {
        let source = StaticSource::new(vec!["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]);
        let mut pool = ProxyPool::new(LastGoodProxyStore::in_memory());
        pool.refresh(&source).await;

        let mut picked = HashSet::new();
        while let Some(proxy) = pool.pick_next() {
            assert!(picked.insert(proxy.address));
        }
        assert_eq!(picked.len(), 3);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn exhausted_pool_refreshes_once_per_cycle() {
        let source = StaticSource::new(vec!["1.1.1.1:80"]);
        let mut pool = ProxyPool::new(LastGoodProxyStore::in_memory());

        assert!(pool.next_candidate(&source, false).await.is_some());
        assert!(pool.next_candidate(&source, false).await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        pool.begin_cycle();
        assert!(pool.next_candidate(&source, false).await.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_degrades_to_empty() {
        let mut pool = ProxyPool::new(LastGoodProxyStore::in_memory());
        assert_eq!(pool.refresh(&FailingSource).await, 0);
        assert!(pool.pick_next().is_none());
    }

    #[tokio::test]
    async fn successful_proxy_is_offered_first_next_cycle() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("proxy.json");
        let source = StaticSource::new(vec!["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]);

        let mut pool = ProxyPool::new(LastGoodProxyStore::open(&cache_path));
        let winner = pool.next_candidate(&source, false).await.unwrap();
        pool.record_success(&winner);

        pool.begin_cycle();
        pool.refresh(&source).await;
        assert_eq!(pool.pick_next(), Some(winner.clone()));
        assert!(pool.pool.iter().all(|c| c.address != winner.address));

        // Survives a restart through the cache file.
        let mut restarted = ProxyPool::new(LastGoodProxyStore::open(&cache_path));
        restarted.refresh(&source).await;
        assert_eq!(restarted.pick_next(), Some(winner));
    }

    #[tokio::test]
    async fn failing_cached_proxy_is_forgotten() {
        let dir = TempDir::new().unwrap();
        let cache = LastGoodProxyStore::open(dir.path().join("proxy.json"));
        cache.save(Some("9.9.9.9:8080")).unwrap();

        let mut pool = ProxyPool::new(cache);
        let cached = pool.pick_next().unwrap();
        assert_eq!(cached.address, "9.9.9.9:8080");

        pool.record_failure(&cached);
        assert!(pool.last_good().is_none());

        pool.begin_cycle();
        assert!(pool.pick_next().is_none());
    }

    #[tokio::test]
    async fn https_targets_only_get_tls_capable_proxies() {
        let mut pool = ProxyPool::new(LastGoodProxyStore::in_memory());

        let picked = pool.next_candidate(&MixedSource, true).await.unwrap();
        assert_eq!(picked.address, "2.2.2.2:80");
        assert!(pool.next_candidate(&MixedSource, true).await.is_none());

        pool.begin_cycle();
        let mut plain = Vec::new();
        while let Some(proxy) = pool.next_candidate(&MixedSource, false).await {
            plain.push(proxy.address);
        }
        assert_eq!(plain.len(), 3);
    }
}
