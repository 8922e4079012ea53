//! Page acquisition: single-attempt transports and the retrying orchestrator
//! that escalates through them.

mod orchestrator;
mod stats;
pub mod strategy;
pub mod user_agent;

pub use orchestrator::{Fetcher, RetryPolicy};
pub use stats::CycleStats;
pub use strategy::{build_strategies, ChallengeStrategy, DirectStrategy, ProxyStrategy, RelayStrategy};

use crate::proxy::ProxyCandidate;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("bot challenge not solved")]
    Challenge,

    #[error("empty body")]
    EmptyBody,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("client build failed: {0}")]
    Build(String),

    #[error("no proxy available")]
    NoProxy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    Failure(FailureReason),
}

/// One try of one strategy. Folded into [`CycleStats`], never stored.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub strategy: String,
    pub target_url: Url,
    pub proxy: Option<ProxyCandidate>,
    pub outcome: FetchOutcome,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.strategy, self.target_url)?;
        if let Some(proxy) = &self.proxy {
            write!(f, " via {}", proxy)?;
        }
        match &self.outcome {
            FetchOutcome::Success(body) => write!(f, " -> ok ({} bytes)", body.len()),
            FetchOutcome::Failure(reason) => write!(f, " -> {}", reason),
        }
    }
}

/// A single way of fetching a page. Implementations enforce `timeout`,
/// treat anything but a usable 2xx body as failure and never panic or
/// return errors past this boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    fn needs_proxy(&self) -> bool {
        false
    }

    async fn attempt(
        &self,
        target: &Url,
        timeout: Duration,
        proxy: Option<&ProxyCandidate>,
    ) -> FetchOutcome;
}
