use super::{user_agent, FailureReason, FetchOutcome, Transport};
use crate::client::{Client, ClientBuilder};
use crate::config::{Config, StrategyKind};
use crate::error::{AppError, ClientError, ConfigError, Result};
use crate::log_debug;
use crate::proxy::ProxyCandidate;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,ar;q=0.8";

/// Substrings of the interstitial pages bot-protection layers serve in place
/// of the real content. Cloudflare also injects `challenge-platform` scripts
/// into genuine pages, so that alone is not a marker.
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf_chl_opt",
    "<title>just a moment...</title>",
    "<title>attention required! | cloudflare</title>",
    "<title>ddos-guard</title>",
];

pub fn looks_like_challenge(body: &str) -> bool {
    let lowered = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn browser_headers(builder: ClientBuilder, user_agent: &str) -> Result<ClientBuilder> {
    builder
        .user_agent(user_agent)?
        .header("accept", ACCEPT)?
        .header("accept-language", ACCEPT_LANGUAGE)
}

fn failure_from(err: AppError) -> FailureReason {
    match err {
        AppError::Client(ClientError::Timeout) => FailureReason::Timeout,
        AppError::Client(ClientError::ResponseError {
            status_code,
            message,
        }) => {
            if matches!(status_code, 403 | 429 | 503) && looks_like_challenge(&message) {
                FailureReason::Challenge
            } else {
                FailureReason::Status(status_code)
            }
        }
        AppError::Client(ClientError::BuildError(message)) => FailureReason::Build(message),
        other => FailureReason::Transport(other.to_string()),
    }
}

async fn fetch_with(client: Result<Client>, target: &Url, timeout: Duration) -> FetchOutcome {
    let client = match client {
        Ok(client) => client,
        Err(e) => return FetchOutcome::Failure(failure_from(e)),
    };

    let response = match client.get(target, timeout).await {
        Ok(response) => response,
        Err(e) => return FetchOutcome::Failure(failure_from(e)),
    };
    log_debug!(
        "[fetch] {} answered HTTP {} ({} bytes)",
        target,
        response.status,
        response.content.len()
    );

    if response.content.trim().is_empty() {
        FetchOutcome::Failure(FailureReason::EmptyBody)
    } else if looks_like_challenge(&response.content) {
        FetchOutcome::Failure(FailureReason::Challenge)
    } else {
        FetchOutcome::Success(response.content)
    }
}

pub struct ChallengeStrategy {
    client: Client,
}

impl ChallengeStrategy {
    pub fn new() -> Result<Self> {
        let builder = Client::builder().chrome_impersonation(true);
        let client = browser_headers(builder, user_agent::CHROME)?.build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ChallengeStrategy {
    fn name(&self) -> &str {
        "challenge"
    }

    async fn attempt(
        &self,
        target: &Url,
        timeout: Duration,
        _proxy: Option<&ProxyCandidate>,
    ) -> FetchOutcome {
        fetch_with(Ok(self.client.clone()), target, timeout).await
    }
}

#[derive(Default)]
pub struct DirectStrategy;

impl DirectStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for DirectStrategy {
    fn name(&self) -> &str {
        "direct"
    }

    async fn attempt(
        &self,
        target: &Url,
        timeout: Duration,
        _proxy: Option<&ProxyCandidate>,
    ) -> FetchOutcome {
        let client = browser_headers(Client::builder(), user_agent::random())
            .and_then(ClientBuilder::build);
        fetch_with(client, target, timeout).await
    }
}

pub struct RelayStrategy {
    template: String,
}

impl RelayStrategy {
    /// `template` must contain `{url}`, replaced by the percent-encoded
    /// target.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{url}") {
            return Err(ConfigError::InvalidValue(format!(
                "relay template lacks {{url}}: {}",
                template
            ))
            .into());
        }
        Ok(Self { template })
    }

    pub fn relay_url(&self, target: &Url) -> Result<Url> {
        let raw = self
            .template
            .replace("{url}", &urlencoding::encode(target.as_str()));
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)).into())
    }
}

#[async_trait]
impl Transport for RelayStrategy {
    fn name(&self) -> &str {
        "relay"
    }

    async fn attempt(
        &self,
        target: &Url,
        timeout: Duration,
        _proxy: Option<&ProxyCandidate>,
    ) -> FetchOutcome {
        let relay_url = match self.relay_url(target) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::Failure(failure_from(e)),
        };
        let client = browser_headers(Client::builder(), user_agent::random())
            .and_then(ClientBuilder::build);
        fetch_with(client, &relay_url, timeout).await
    }
}

#[derive(Default)]
pub struct ProxyStrategy;

impl ProxyStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ProxyStrategy {
    fn name(&self) -> &str {
        "proxy"
    }

    fn needs_proxy(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        target: &Url,
        timeout: Duration,
        proxy: Option<&ProxyCandidate>,
    ) -> FetchOutcome {
        let Some(proxy) = proxy else {
            return FetchOutcome::Failure(FailureReason::NoProxy);
        };
        let builder = Client::builder()
            .proxy(proxy.url())
            .chrome_impersonation(true);
        let client = browser_headers(builder, user_agent::CHROME).and_then(ClientBuilder::build);
        fetch_with(client, target, timeout).await
    }
}

pub fn build_strategies(config: &Config) -> Result<Vec<Box<dyn Transport>>> {
    config
        .fetch
        .strategies
        .iter()
        .map(|kind| -> Result<Box<dyn Transport>> {
            let strategy: Box<dyn Transport> = match kind {
                StrategyKind::Challenge => Box::new(ChallengeStrategy::new()?),
                StrategyKind::Direct => Box::new(DirectStrategy::new()),
                StrategyKind::Relay => Box::new(RelayStrategy::new(&config.fetch.relay_template)?),
                StrategyKind::Proxy => Box::new(ProxyStrategy::new()),
            };
            Ok(strategy)
        })
        .collect()
}
