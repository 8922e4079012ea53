//! Polls an anime listing page for newly published episodes.
//!
//! The page is fetched through a chain of transports (browser
//! impersonation, plain client, public relay, rotating proxies) with
//! jittered retries, episode cards are extracted with fallback selectors,
//! and a persisted seen-set makes sure each episode is returned once.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod notify;
pub mod proxy;
pub mod scraper;
pub mod store;
pub mod utils;
pub mod watcher;

pub use crate::config::Config;
pub use crate::error::{AppError, Result};
pub use crate::scraper::ItemRecord;
pub use crate::watcher::Watcher;
