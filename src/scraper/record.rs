use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub title: String,
    pub episode_label: String,
    pub detail_url: Url,
    pub thumbnail_url: Option<Url>,
}

impl ItemRecord {
    pub fn identity_key(&self) -> String {
        canonical_key(&self.detail_url)
    }

    /// `"<title> - <episode>"`, the headline notifiers show.
    pub fn headline(&self) -> String {
        format!("{} - {}", self.title, self.episode_label)
    }
}

/// Drops the fragment and any trailing slash so `/episode/x`, `/episode/x/`
/// and `/episode/x/#comments` share one key. Scheme and host are already
/// normalized by URL parsing; the query is kept.
pub fn canonical_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    let trimmed = url.path().trim_end_matches('/').to_string();
    if trimmed.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&trimmed);
    }
    url.to_string()
}
