use crate::error::Result;
use crate::log_info;
use crate::scraper::ItemRecord;
use async_trait::async_trait;

/// Receives each batch of new items. Chat frontends implement this; the
/// crate ships only a logging implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, records: &[ItemRecord]) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, records: &[ItemRecord]) -> Result<()> {
        for record in records {
            log_info!(
                title = %record.title,
                episode = %record.episode_label,
                url = %record.detail_url,
                thumbnail = record.thumbnail_url.as_ref().map(|u| u.as_str()).unwrap_or("-"),
                "[notify] New episode: {}",
                record.headline()
            );
        }
        Ok(())
    }
}
