use super::{Attempt, CycleStats, FailureReason, FetchOutcome, Transport};
use crate::config::FetchConfig;
use crate::proxy::{ProxyPool, ProxySource};
use crate::{log_error, log_info, log_warn};
use rand::Rng;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            backoff_min: Duration::from_millis(config.backoff_min_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms.max(config.backoff_min_ms)),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn backoff(&self) -> Duration {
        if self.backoff_max <= self.backoff_min {
            return self.backoff_min;
        }
        rand::thread_rng().gen_range(self.backoff_min..=self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Escalates through the strategies in order, one full pass per round, with
/// jittered backoff between rounds. Owns the proxy pool and its refreshes.
pub struct Fetcher {
    strategies: Vec<Box<dyn Transport>>,
    pool: ProxyPool,
    proxy_source: Box<dyn ProxySource>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        strategies: Vec<Box<dyn Transport>>,
        pool: ProxyPool,
        proxy_source: Box<dyn ProxySource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            strategies,
            pool,
            proxy_source,
            policy,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    #[cfg(test)]
    pub(crate) fn pool_mut(&mut self) -> &mut ProxyPool {
        &mut self.pool
    }

    /// Body of the first successful attempt, or `None` once every round has
    /// failed. Never errors: exhaustion means "nothing this cycle".
    pub async fn fetch(&mut self, target: &Url) -> Option<String> {
        let (body, stats) = self.fetch_with_stats(target).await;
        stats.report();
        body
    }

    pub async fn fetch_with_stats(&mut self, target: &Url) -> (Option<String>, CycleStats) {
        let mut stats = CycleStats::new();
        self.pool.begin_cycle();

        for round in 1..=self.policy.max_retries {
            stats.rounds = round;
            log_info!(
                "[fetch] Round {}/{} for {}",
                round,
                self.policy.max_retries,
                target
            );

            if let Some(body) = self.run_round(target, &mut stats).await {
                return (Some(body), stats);
            }

            if round < self.policy.max_retries {
                let delay = self.policy.backoff();
                log_info!("[fetch] All strategies failed, backing off {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        log_error!(
            "[fetch] Giving up on {} after {} rounds; no content this cycle",
            target,
            self.policy.max_retries
        );
        (None, stats)
    }

    async fn run_round(&mut self, target: &Url, stats: &mut CycleStats) -> Option<String> {
        for strategy in &self.strategies {
            let proxy = if strategy.needs_proxy() {
                match self
                    .pool
                    .next_candidate(self.proxy_source.as_ref(), target.scheme() == "https")
                    .await
                {
                    Some(proxy) => Some(proxy),
                    None => {
                        log_warn!("[fetch] [{}] skipped: proxy pool exhausted", strategy.name());
                        stats.record(&Attempt {
                            strategy: strategy.name().to_string(),
                            target_url: target.clone(),
                            proxy: None,
                            outcome: FetchOutcome::Failure(FailureReason::NoProxy),
                        });
                        continue;
                    }
                }
            } else {
                None
            };

            let outcome = strategy
                .attempt(target, self.policy.request_timeout, proxy.as_ref())
                .await;
            let attempt = Attempt {
                strategy: strategy.name().to_string(),
                target_url: target.clone(),
                proxy,
                outcome,
            };
            stats.record(&attempt);

            match attempt.outcome {
                FetchOutcome::Success(body) => {
                    log_info!(
                        "[fetch] [{}] succeeded ({} bytes)",
                        attempt.strategy,
                        body.len()
                    );
                    if let Some(proxy) = &attempt.proxy {
                        self.pool.record_success(proxy);
                    }
                    return Some(body);
                }
                FetchOutcome::Failure(_) => {
                    log_warn!("[fetch] {}", attempt);
                    if let Some(proxy) = &attempt.proxy {
                        self.pool.record_failure(proxy);
                    }
                }
            }
        }
        None
    }
}
