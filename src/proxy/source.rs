use super::ProxyCandidate;
use crate::client::Client;
use crate::error::{ProxyError, Result};
use crate::fetch::user_agent;
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static ADDRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?([A-Za-z0-9][A-Za-z0-9.\-]*):(\d{1,5})$")
        .expect("address pattern is a valid regex")
});

#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<ProxyCandidate>>;
}

/// Queries every configured listing concurrently and merges what parses.
pub struct HttpProxySource {
    urls: Vec<String>,
    timeout: Duration,
    https_only: bool,
}

impl HttpProxySource {
    pub fn new(urls: Vec<String>, timeout: Duration, https_only: bool) -> Self {
        Self {
            urls,
            timeout,
            https_only,
        }
    }

    async fn fetch_listing(&self, raw_url: &str) -> Result<Vec<ProxyCandidate>> {
        let url = Url::parse(raw_url)
            .map_err(|e| ProxyError::SourceUnavailable(format!("{}: {}", raw_url, e)))?;
        let client = Client::builder()
            .user_agent(user_agent::random())?
            .build()?;
        let response = client
            .get(&url, self.timeout)
            .await
            .map_err(|e| ProxyError::SourceUnavailable(format!("{}: {}", raw_url, e)))?;
        Ok(parse_listing(&response.content))
    }
}

#[async_trait]
impl ProxySource for HttpProxySource {
    async fn fetch_candidates(&self) -> Result<Vec<ProxyCandidate>> {
        let results = join_all(self.urls.iter().map(|url| self.fetch_listing(url))).await;

        let mut listings = Vec::new();
        let mut errors = Vec::new();
        for (url, result) in self.urls.iter().zip(results) {
            match result {
                Ok(found) => {
                    log_debug!("[proxy] {} listed {} candidates", url, found.len());
                    listings.push(found);
                }
                Err(e) => {
                    log_warn!("[proxy] Listing {} failed: {}", url, e);
                    errors.push(e.to_string());
                }
            }
        }

        let candidates = merge_listings(listings, self.https_only);
        if candidates.is_empty() {
            if errors.len() == self.urls.len() && !errors.is_empty() {
                return Err(ProxyError::SourceUnavailable(errors.join("; ")).into());
            }
            return Err(ProxyError::EmptyListing.into());
        }

        Ok(candidates)
    }
}

/// Concatenates listings in order, keeping the first occurrence of each
/// address and, with `https_only`, only TLS-capable rows.
pub fn merge_listings(
    listings: impl IntoIterator<Item = Vec<ProxyCandidate>>,
    https_only: bool,
) -> Vec<ProxyCandidate> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .flatten()
        .filter(|candidate| !https_only || candidate.https)
        .filter(|candidate| seen.insert(candidate.address.clone()))
        .collect()
}

/// Parses either an HTML table (free-proxy-list layout: IP, Port, ...,
/// Https) or a newline-delimited `host:port` list. Unparseable rows are
/// skipped. Plain lists carry no https flag and are assumed capable.
pub fn parse_listing(body: &str) -> Vec<ProxyCandidate> {
    if body.contains("<table") {
        parse_table(body)
    } else {
        parse_lines(body)
    }
}

fn parse_lines(body: &str) -> Vec<ProxyCandidate> {
    body.lines()
        .filter_map(|line| {
            let caps = ADDRESS_LINE.captures(line.trim())?;
            let port = valid_port(&caps[2])?;
            Some(ProxyCandidate::new(format!("{}:{}", &caps[1], port), true))
        })
        .collect()
}

fn parse_table(body: &str) -> Vec<ProxyCandidate> {
    let document = Html::parse_document(body);
    let (Ok(row_selector), Ok(cell_selector), Ok(header_selector)) = (
        Selector::parse("table tr"),
        Selector::parse("td"),
        Selector::parse("th"),
    ) else {
        return Vec::new();
    };

    let mut https_column = None;
    let mut candidates = Vec::new();

    for row in document.select(&row_selector) {
        let headers: Vec<String> = row
            .select(&header_selector)
            .map(|th| th.text().collect::<String>().trim().to_lowercase())
            .collect();
        if !headers.is_empty() {
            if let Some(index) = headers.iter().position(|h| h == "https") {
                https_column = Some(index);
            }
            continue;
        }

        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        if cells.len() < 2 {
            continue;
        }

        let Some(caps) = ADDRESS_LINE.captures(&format!("{}:{}", cells[0], cells[1])) else {
            continue;
        };
        let Some(port) = valid_port(&caps[2]) else {
            continue;
        };
        let https = https_column
            .and_then(|index| cells.get(index))
            .is_some_and(|value| value.eq_ignore_ascii_case("yes"));

        candidates.push(ProxyCandidate::new(format!("{}:{}", &caps[1], port), https));
    }

    candidates
}

fn valid_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|port| *port > 0)
}
