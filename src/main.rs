//! Storefront Cache demo
//!
//! Serves a user's order list through the cache-aside reader against a
//! simulated remote store that fails now and then.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_cache::keys::{scoped_key, tags};
use storefront_cache::{
    CacheAside, CacheConfig, CacheEngine, FetchError, FetchOptions, RetryConfig,
};

/// Rounds between simulated order updates that invalidate cached listings.
const INVALIDATE_EVERY: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: u64,
    user_id: u64,
    status: String,
    total_cents: u64,
}

#[derive(Debug, Serialize)]
struct OrderFilters {
    status: Option<&'static str>,
    limit: u32,
}

/// Stand-in for the remote relational store. Every third query fails.
struct RemoteOrders {
    queries: AtomicU64,
}

impl RemoteOrders {
    fn new() -> Self {
        Self {
            queries: AtomicU64::new(0),
        }
    }

    async fn list_orders(&self, user_id: u64, limit: u32) -> anyhow::Result<Vec<Order>> {
        let query = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(40)).await;
        if query % 3 == 0 {
            bail!("remote store timed out on query {query}");
        }

        Ok((1..=u64::from(limit))
            .map(|n| Order {
                id: user_id * 1000 + n,
                user_id,
                status: if n % 2 == 0 { "shipped" } else { "paid" }.to_string(),
                total_cents: 1999 * n,
            })
            .collect())
    }
}

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache and retry configuration from environment variables
/// 3. Start the cache engine and its expiry sweep
/// 4. Serve periodic order-list reads until SIGINT/SIGTERM
/// 5. Shut the engine down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Storefront Cache demo");

    let config = CacheConfig::from_env();
    let retry = RetryConfig::from_env();
    info!(
        max_entries = config.max_entries,
        default_ttl_secs = config.default_ttl.as_secs(),
        policy = %config.eviction_policy,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        max_attempts = retry.max_attempts,
        "Configuration loaded"
    );

    let engine: CacheEngine<Vec<Order>> = CacheEngine::start(config)
        .await
        .context("cache engine refused to start")?;
    let reader = CacheAside::new(engine.clone(), retry);
    let remote = RemoteOrders::new();

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut round: u64 = 0;

    // Cancelled on SIGINT/SIGTERM; also aborts any retry backoff in flight
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        round += 1;

        if round % INVALIDATE_EVERY == 0 {
            let removed = engine.invalidate_by_tag(tags::ORDERS).await;
            info!(removed, "order data changed, invalidated cached listings");
        }

        for user_id in 1..=3u64 {
            let filters = OrderFilters {
                status: None,
                limit: 3,
            };
            let key = scoped_key(tags::ORDERS, user_id, &filters)?;
            let options = FetchOptions::new()
                .ttl(Duration::from_secs(30))
                .tag(tags::ORDERS)
                .cancel_on(shutdown.clone());

            match reader
                .get_or_fetch(&key, &options, || remote.list_orders(user_id, filters.limit))
                .await
            {
                Ok(orders) => info!(user_id, orders = orders.len(), "served order list"),
                Err(FetchError::Cancelled { .. }) => break,
                Err(err) => warn!(user_id, error = %err, "order list unavailable, please retry"),
            }
        }

        let stats = engine.stats().await;
        let fetches = reader.metrics().summary();
        info!(
            entries = stats.stats.total_entries,
            hit_rate = stats.hit_rate,
            evictions = stats.stats.evictions,
            avg_fetch_ms = fetches.average_elapsed.as_millis() as u64,
            avg_cache_hit_ratio = fetches.average_cache_hit_ratio,
            "cache stats"
        );
    }

    engine.shutdown().await;
    info!("Demo shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
