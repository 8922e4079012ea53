use anyhow::Context;
use episode_watch::config::{Config, CONFIG_PATH_ENV};
use episode_watch::logging::{init_logging, LoggerConfig};
use episode_watch::notify::{LogNotifier, Notifier};
use episode_watch::{log_error, log_info, Watcher};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

enum Mode {
    Watch,
    Once,
    Latest,
}

fn parse_mode() -> anyhow::Result<Mode> {
    match std::env::args().nth(1).as_deref() {
        None | Some("watch") => Ok(Mode::Watch),
        Some("once") => Ok(Mode::Once),
        Some("latest") => Ok(Mode::Latest),
        Some(other) => anyhow::bail!("unknown mode {:?}, expected watch, once or latest", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_mode()?;

    // An explicitly named config file must exist; the default one may not.
    let config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        Err(_) => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("loading configuration from {}", DEFAULT_CONFIG_PATH))?,
    };

    let _guard = init_logging(LoggerConfig::from_config(&config.logging)?)
        .context("initializing logging")?;

    let watcher = Watcher::from_config(&config).context("building watcher")?;
    log_info!("[main] Watching {}", watcher.target());
    let notifier = LogNotifier;

    match mode {
        Mode::Once => {
            let fresh = watcher.poll().await;
            notify(&notifier, &fresh).await;
        }
        Mode::Latest => {
            let latest = watcher.latest(config.latest_limit).await;
            if latest.is_empty() {
                log_error!("[main] Could not fetch episodes right now");
            }
            notify(&notifier, &latest).await;
        }
        Mode::Watch => run_schedule(&watcher, &notifier, config.poll_interval_secs).await,
    }

    Ok(())
}

/// Polls on a fixed interval until Ctrl-C. Ticks that fire while a cycle is
/// still running are dropped rather than queued.
async fn run_schedule(watcher: &Watcher, notifier: &dyn Notifier, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    log_info!("[main] Checking for new episodes every {}s", interval_secs);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fresh = watcher.poll().await;
                notify(notifier, &fresh).await;
            }
            _ = tokio::signal::ctrl_c() => {
                log_info!("[main] Shutting down");
                break;
            }
        }
    }
}

async fn notify(notifier: &dyn Notifier, records: &[episode_watch::ItemRecord]) {
    if records.is_empty() {
        return;
    }
    if let Err(e) = notifier.notify(records).await {
        log_error!("[main] Notifier failed: {}", e);
    }
}
