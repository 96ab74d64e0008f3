//! Cache-first access to exchange rates and currency metadata.
//!
//! Snapshot and directory lookups check the local store first and only go to
//! the network on a miss; a fetched value is persisted before it is returned.
//! Time series and conversions always go to the network. Network errors are
//! passed through untouched so the caller can tell the user it is offline.

use crate::core::dates::{self, DateWindow};
use crate::core::error::{FxError, Result};
use crate::core::rates::{
    CurrencyDirectory, ExchangeSnapshot, RateSource, TimeSeries, normalize_code,
};
use crate::store::PersistentStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

/// Quote currency for historical trends.
pub const TREND_QUOTE_CURRENCY: &str = "USD";

pub struct RateRepository {
    store: Arc<PersistentStore>,
    source: Arc<dyn RateSource>,
}

impl RateRepository {
    pub fn new(store: Arc<PersistentStore>, source: Arc<dyn RateSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<PersistentStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn RateSource> {
        &self.source
    }

    /// Rates for `base_currency`, from the store when present.
    pub async fn get_rate(&self, base_currency: &str) -> Result<ExchangeSnapshot> {
        let base = normalize_code(base_currency)?;
        if let Some(snapshot) = self.store.get_snapshot(&base).await? {
            debug!(%base, "Serving rates from store");
            return Ok(snapshot);
        }

        debug!(%base, "Fetching rates from provider");
        let snapshot = self.source.fetch_all(&base).await?;
        self.store.upsert_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Daily rates of `base_currency` against USD over the last `days_back`
    /// days, excluding today.
    pub async fn get_time_series(&self, base_currency: &str, days_back: u32) -> Result<TimeSeries> {
        self.get_time_series_until(base_currency, days_back, dates::today())
            .await
    }

    pub async fn get_time_series_until(
        &self,
        base_currency: &str,
        days_back: u32,
        today: NaiveDate,
    ) -> Result<TimeSeries> {
        let base = normalize_code(base_currency)?;
        let window = DateWindow::trailing(today, days_back)?;
        self.source
            .fetch_time_series(&base, TREND_QUOTE_CURRENCY, &window)
            .await
    }

    pub async fn calculate_conversion(&self, from: &str, to: &str, amount: f64) -> Result<f64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(FxError::MalformedInput(format!(
                "Amount must be a non-negative number, got {amount}"
            )));
        }
        let from = normalize_code(from)?;
        let to = normalize_code(to)?;
        self.source.convert(&from, &to, amount).await
    }

    /// Currency names, from the store when present.
    pub async fn get_currency_directory(&self) -> Result<CurrencyDirectory> {
        if let Some(directory) = self.store.get_directory().await? {
            debug!("Serving currency directory from store");
            return Ok(directory);
        }
        self.refresh_currency_directory().await
    }

    /// Re-fetches the directory and replaces the stored one.
    pub async fn refresh_currency_directory(&self) -> Result<CurrencyDirectory> {
        debug!("Fetching currency directory from provider");
        let directory = self.source.fetch_currencies().await?;
        self.store.set_directory(&directory).await?;
        Ok(directory)
    }
}
