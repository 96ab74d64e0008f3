use super::ui;
use crate::core::RateSource;
use crate::store::PersistentStore;
use crate::sync::{self, RefreshReport, RefreshScheduler, RefreshWorker};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn render_report(report: &RefreshReport) -> String {
    let mut output = format!(
        "{} {}",
        ui::style_text("Refreshed:", ui::StyleType::TotalLabel),
        ui::style_text(&report.refreshed.len().to_string(), ui::StyleType::TotalValue)
    );
    if !report.refreshed.is_empty() {
        let bases: Vec<_> = report
            .refreshed
            .iter()
            .map(|s| s.base_currency())
            .collect();
        output.push_str(&format!(" ({})", bases.join(", ")));
    }
    for failure in &report.failed {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!(
                    "Kept cached rates for {}: {}",
                    failure.base_currency, failure.reason
                ),
                ui::StyleType::Error
            )
        ));
    }
    output
}

/// Runs a single refresh cycle over everything in the store.
pub async fn run_once(store: Arc<PersistentStore>, source: Arc<dyn RateSource>) -> Result<()> {
    let worker = RefreshWorker::spawn(source);
    let pb = ui::new_spinner("Refreshing cached rates...");
    let report = sync::run_refresh_cycle(&store, &worker).await;
    pb.finish_and_clear();

    let report = report.context("Refresh failed")?;
    println!("{}", render_report(&report));
    Ok(())
}

/// Keeps the cache fresh on `interval` until Ctrl-C.
pub async fn watch(
    store: Arc<PersistentStore>,
    source: Arc<dyn RateSource>,
    interval: Duration,
) -> Result<()> {
    let scheduler = RefreshScheduler::with_interval(interval)?;
    let worker = Arc::new(RefreshWorker::spawn(source));
    let refresh_loop = sync::spawn_refresh_loop(scheduler.subscribe(), store, worker);

    scheduler.start_polling(true);
    println!(
        "Refreshing every {} minutes, press Ctrl-C to stop",
        interval.as_secs() / 60
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Stopping refresh loop");

    scheduler.shutdown();
    refresh_loop.await.context("Refresh loop panicked")?;
    Ok(())
}
