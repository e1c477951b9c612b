use std::sync::Arc;

use seedwatch::config::Config;
use seedwatch::jobs::{CacheExpiryJob, DiscoverJob, ReconcileJob};
use seedwatch::notify::{Notifier, TelegramNotifier};
use seedwatch::scheduler::CronScheduler;
use seedwatch::source::{DelugeClient, TorrentSource};
use seedwatch::store::{LibSqlStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=...");
        eprintln!("  export DELUGE_PASSWORD=...");
        std::process::exit(1);
    });

    eprintln!("🌱 seedwatch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path);
    eprintln!("   Deluge: {}", config.deluge.url);
    eprintln!("   Label: {}\n", config.managed_label);

    let store: Arc<dyn Store> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
                std::process::exit(1);
            }),
    );

    let deluge = Arc::new(DelugeClient::connect(&config.deluge).await?);
    deluge.ensure_label(&config.managed_label).await?;
    let source: Arc<dyn TorrentSource> = deluge;

    let notifier: Arc<dyn Notifier> =
        Arc::new(TelegramNotifier::new(config.telegram.bot_token.clone()));

    let mut scheduler = CronScheduler::new(config.tick);
    scheduler.register(Arc::new(ReconcileJob::new(
        config.reconcile_interval,
        Arc::clone(&store),
        Arc::clone(&source),
        notifier,
        config.miss_threshold,
    )))?;
    scheduler.register(Arc::new(DiscoverJob::new(
        config.discover_interval,
        Arc::clone(&store),
        source,
        config.managed_label.clone(),
    )))?;
    scheduler.register(Arc::new(CacheExpiryJob::new(
        config.cache_expiry_interval,
        store,
    )))?;

    let handle = scheduler.spawn();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    handle.stop();
    handle.join().await;

    Ok(())
}
