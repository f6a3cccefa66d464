//! Walkthrough: start a dispatcher, submit a sync and an async job, wait
//! for the sync result, then stop.
//!
//! Run with `RUST_LOG=debug cargo run --example submit` to see the
//! scheduling decisions.

use std::sync::Arc;

use jobpool::{AsyncJob, Config, Dispatcher, Job, Level, SyncJob};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::default();
    println!("{config}");

    let dispatcher = Dispatcher::new(config);
    dispatcher.start().await;

    let sum = Arc::new(SyncJob::new("sum", Level::App, || {
        (1..=100u64).sum::<u64>()
    }));
    dispatcher.join(sum.clone()).await?;

    let background = Arc::new(AsyncJob::new("background", Level::Low, || {
        println!("background job ran");
    }));
    dispatcher.join(background).await?;

    let out = sum.wait_result().await?;
    println!(
        "sum job produced {}",
        out.downcast_ref::<u64>().expect("u64 result")
    );

    if let Some(discarded) = dispatcher.stop().await {
        println!("stopped; {discarded} pending job(s) discarded");
    }
    Ok(())
}
