use super::{Attempt, FailureReason, FetchOutcome};
use crate::{log_info, log_warn};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct StrategyStats {
    pub attempts: usize,
    pub successes: usize,
    pub failures: usize,
    pub status_codes: BTreeMap<u16, usize>,
    pub failure_reasons: Vec<String>,
}

impl StrategyStats {
    fn record(&mut self, outcome: &FetchOutcome) {
        self.attempts += 1;
        match outcome {
            FetchOutcome::Success(_) => self.successes += 1,
            FetchOutcome::Failure(reason) => {
                self.failures += 1;
                if let FailureReason::Status(code) = reason {
                    *self.status_codes.entry(*code).or_default() += 1;
                }
                self.failure_reasons.push(reason.to_string());
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub rounds: u32,
    pub per_strategy: BTreeMap<String, StrategyStats>,
    pub proxies_used: Vec<String>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: &Attempt) {
        self.per_strategy
            .entry(attempt.strategy.clone())
            .or_default()
            .record(&attempt.outcome);
        if let Some(proxy) = &attempt.proxy {
            self.proxies_used.push(proxy.address.clone());
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.per_strategy.values().map(|s| s.attempts).sum()
    }

    pub fn succeeded(&self) -> bool {
        self.per_strategy.values().any(|s| s.successes > 0)
    }

    pub fn report(&self) {
        log_info!(
            "[fetch] Cycle summary: {} rounds, {} attempts, {}",
            self.rounds,
            self.total_attempts(),
            if self.succeeded() { "succeeded" } else { "failed" }
        );
        for (name, stats) in &self.per_strategy {
            log_info!(
                "[fetch]   {}: {} attempts, {} ok, {} failed",
                name,
                stats.attempts,
                stats.successes,
                stats.failures
            );
            for (code, count) in &stats.status_codes {
                log_info!("[fetch]     HTTP {}: {}", code, count);
            }
            if stats.successes == 0 {
                if let Some(last) = stats.failure_reasons.last() {
                    log_warn!("[fetch]     last failure: {}", last);
                }
            }
        }
        if !self.proxies_used.is_empty() {
            log_info!("[fetch]   proxies tried: {}", self.proxies_used.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn attempt(strategy: &str, outcome: FetchOutcome) -> Attempt {
        Attempt {
            strategy: strategy.to_string(),
            target_url: Url::parse("https://site.example/").unwrap(),
            proxy: None,
            outcome,
        }
    }

    #[test]
    fn tallies_outcomes_per_strategy() {
        let mut stats = CycleStats::new();
        stats.record(&attempt("direct", FetchOutcome::Failure(FailureReason::Status(403))));
        stats.record(&attempt("direct", FetchOutcome::Failure(FailureReason::Status(403))));
        stats.record(&attempt("relay", FetchOutcome::Success("<html>".into())));

        assert_eq!(stats.total_attempts(), 3);
        assert!(stats.succeeded());
        let direct = &stats.per_strategy["direct"];
        assert_eq!(direct.failures, 2);
        assert_eq!(direct.status_codes.get(&403), Some(&2));
    }
}
