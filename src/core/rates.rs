//! Exchange rate types and the rate source abstraction

use super::dates::DateWindow;
use super::error::{FxError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Trims and upper-cases a currency code.
pub fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FxError::MalformedInput(format!(
            "Invalid currency code: '{code}'"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// One base currency's known rates at last refresh.
///
/// The base currency never appears in its own `rates` map; the self-rate is
/// implicitly 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSnapshot")]
pub struct ExchangeSnapshot {
    base_currency: String,
    rates: BTreeMap<String, f64>,
}

/// Decoded form of a snapshot before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    base_currency: String,
    #[serde(default)]
    rates: BTreeMap<String, f64>,
}

impl TryFrom<RawSnapshot> for ExchangeSnapshot {
    type Error = FxError;

    fn try_from(raw: RawSnapshot) -> Result<Self> {
        Self::new(&raw.base_currency, raw.rates)
    }
}

impl ExchangeSnapshot {
    pub fn new<I, S>(base_currency: &str, rates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let base_currency = normalize_code(base_currency)?;
        let mut kept = BTreeMap::new();
        for (code, rate) in rates {
            let code = match normalize_code(code.as_ref()) {
                Ok(code) => code,
                Err(_) => {
                    debug!(base = %base_currency, code = code.as_ref(), "Skipping invalid code");
                    continue;
                }
            };
            if code == base_currency {
                continue;
            }
            if !rate.is_finite() || rate <= 0.0 {
                debug!(base = %base_currency, %code, rate, "Skipping unusable rate");
                continue;
            }
            kept.insert(code, rate);
        }

        Ok(Self {
            base_currency,
            rates: kept,
        })
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn rates(&self) -> &BTreeMap<String, f64> {
        &self.rates
    }

    /// Rate from the base currency to `code`; 1.0 for the base itself.
    pub fn rate(&self, code: &str) -> Option<f64> {
        let code = code.trim().to_ascii_uppercase();
        if code == self.base_currency {
            return Some(1.0);
        }
        self.rates.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// A code and its display name, as listed in dropdowns and tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyEntry {
    pub code: String,
    pub name: String,
}

/// Currency code to human-readable name. Stored and replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyDirectory(BTreeMap<String, String>);

impl CurrencyDirectory {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(code, name)| (code.into().trim().to_ascii_uppercase(), name.into()))
                .collect(),
        )
    }

    pub fn name(&self, code: &str) -> Option<&str> {
        self.0
            .get(&code.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn entries(&self) -> Vec<CurrencyEntry> {
        self.0
            .iter()
            .map(|(code, name)| CurrencyEntry {
                code: code.clone(),
                name: name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Daily rates for one currency pair over a contiguous range. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries(BTreeMap<NaiveDate, f64>);

impl TimeSeries {
    pub fn new(points: BTreeMap<NaiveDate, f64>) -> Self {
        Self(points)
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.0.get(date).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn min(&self) -> Option<f64> {
        self.0.values().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.0.values().copied().reduce(f64::max)
    }

    /// Percentage change between the first and last point.
    pub fn change_pct(&self) -> Option<f64> {
        let first = *self.0.values().next()?;
        let last = *self.0.values().next_back()?;
        if first > 0.0 {
            Some(((last - first) / first) * 100.0)
        } else {
            None
        }
    }
}

/// The remote rate-data provider, as seen by the repository and the refresh
/// worker.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// All rates anchored on `base`.
    async fn fetch_all(&self, base: &str) -> Result<ExchangeSnapshot>;

    async fn fetch_time_series(
        &self,
        base: &str,
        quote: &str,
        window: &DateWindow,
    ) -> Result<TimeSeries>;

    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64>;

    async fn fetch_currencies(&self) -> Result<CurrencyDirectory>;
}
