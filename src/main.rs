//! Tiered Cache - demo walkthrough
//!
//! Builds a small write-through cache over an in-memory backing store and
//! exercises reads, writes, removal and eviction, printing each result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::policy::{FixedDurationRefresh, SinceCreation, WriteThrough};
use tiered_cache::{BackingStore, Cache, CacheConfig, Deadline, InMemoryStore, Scheduler, SchedulerConfig};

const KEY1: &str = "key1";
const KEY2: &str = "key2";
const KEY3: &str = "key3";

/// Runs the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Start the scheduler with configuration from environment variables
/// 3. Build a capacity-2 cache over a store seeded with `key1`
/// 4. Walk through read-through, update, removal and eviction
/// 5. Print the statistics and shut the scheduler down
fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scheduler_config = SchedulerConfig::from_env();
    info!(
        "Scheduler configuration loaded: workers={}, shutdown_grace={}ms",
        scheduler_config.worker_threads,
        scheduler_config.shutdown_grace.as_millis()
    );
    let scheduler = Arc::new(Scheduler::new(scheduler_config)?);

    let config = CacheConfig::<String, String>::builder()
        .max_capacity(2)
        .expiration(Arc::new(SinceCreation::new(Duration::from_secs(1))))
        .write_policy(Arc::new(WriteThrough))
        .refresh(Arc::new(FixedDurationRefresh::new(Duration::from_secs(2))))
        .async_load(false)
        .build()?;

    let store = Arc::new(InMemoryStore::with_entries([(
        KEY1.to_string(),
        "value0".to_string(),
    )]));
    let backing: Arc<dyn BackingStore<String, String>> = store.clone();
    let cache = Cache::new(config, backing, Arc::clone(&scheduler))?;

    let key1 = KEY1.to_string();
    let key2 = KEY2.to_string();

    println!("Basic get {}: {:?}", KEY1, cache.get(&key1)?);

    cache.put(key1.clone(), "value1".to_string())?;
    println!("Add and retrieve {}: {:?}", KEY1, cache.get(&key1)?);

    println!("Retrieve non-existent {}: {:?}", KEY2, cache.get(&key2)?);

    cache.put(key1.clone(), "value2".to_string())?;
    println!("Update and retrieve {}: {:?}", KEY1, cache.get(&key1)?);

    // Remove from both tiers, otherwise the next read fills it back
    cache.remove(&key1);
    store.remove(&key1, Deadline::none())?;
    println!("Remove and retrieve {}: {:?}", KEY1, cache.get(&key1)?);

    cache.put(key1, "value1".to_string())?;
    cache.put(key2, "value2".to_string())?;
    cache.put(KEY3.to_string(), "value3".to_string())?;
    println!("Cache size after eviction: {}", cache.size());

    let stats = serde_json::to_string_pretty(&cache.stats()).context("serializing cache stats")?;
    println!("Stats: {}", stats);

    drop(cache);
    scheduler.shutdown();
    info!("Demo complete");
    Ok(())
}
