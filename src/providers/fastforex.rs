use crate::core::config::ProviderConfig;
use crate::core::dates::{DateWindow, format_date, parse_date};
use crate::core::error::{FxError, Result};
use crate::core::rates::{
    CurrencyDirectory, ExchangeSnapshot, RateSource, TimeSeries, normalize_code,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct FetchAllResponse {
    base: String,
    results: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    results: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    result: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct CurrenciesResponse {
    currencies: HashMap<String, String>,
}

/// Rate source backed by the fastFOREX HTTP API.
pub struct FastForexProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl FastForexProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder().user_agent("fxsync/0.1").build()?;
        Ok(Self::with_client(base_url, api_key, client))
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent("fxsync/0.1");
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(
            &config.base_url,
            &config.api_key(),
            builder.build()?,
        ))
    }

    fn with_client(base_url: &str, api_key: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
        let query = params
            .iter()
            .copied()
            .chain(std::iter::once(("api_key", self.api_key.as_str())));
        Url::parse_with_params(&format!("{}/{}", self.base_url, endpoint), query).map_err(|e| {
            FxError::NetworkFailure(format!("Invalid provider URL {}: {e}", self.base_url))
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint_url(endpoint, params)?;
        debug!("Requesting {} with {:?}", endpoint, params);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                FxError::NetworkFailure(format!(
                    "Request error for {endpoint}: {}",
                    e.without_url()
                ))
            })?;

        if !response.status().is_success() {
            return Err(FxError::NetworkFailure(format!(
                "HTTP error: {} for {endpoint}",
                response.status()
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            FxError::NetworkFailure(format!("Failed to parse JSON response for {endpoint}: {e}"))
        })
    }
}

#[async_trait]
impl RateSource for FastForexProvider {
    #[instrument(name = "FetchAllRates", skip(self), fields(base = %base))]
    async fn fetch_all(&self, base: &str) -> Result<ExchangeSnapshot> {
        let base = normalize_code(base)?;
        let data: FetchAllResponse = self
            .get_json("fetch-all", &[("from", base.as_str())])
            .await?;

        if !data.base.eq_ignore_ascii_case(&base) {
            return Err(FxError::NetworkFailure(format!(
                "Requested rates for {base} but provider answered for {}",
                data.base
            )));
        }

        ExchangeSnapshot::new(&base, data.results)
    }

    #[instrument(name = "FetchTimeSeries", skip(self, window), fields(base = %base, quote = %quote))]
    async fn fetch_time_series(
        &self,
        base: &str,
        quote: &str,
        window: &DateWindow,
    ) -> Result<TimeSeries> {
        let base = normalize_code(base)?;
        let quote = normalize_code(quote)?;
        let start = format_date(window.start);
        let end = format_date(window.end);

        let mut data: TimeSeriesResponse = self
            .get_json(
                "time-series",
                &[
                    ("from", base.as_str()),
                    ("to", quote.as_str()),
                    ("start", start.as_str()),
                    ("end", end.as_str()),
                ],
            )
            .await?;

        let points = data.results.remove(&quote).ok_or_else(|| {
            FxError::NetworkFailure(format!("No time series for {base}/{quote}"))
        })?;

        let mut series = BTreeMap::new();
        for (date, rate) in points {
            let date = parse_date(&date).map_err(|e| {
                FxError::NetworkFailure(format!("Unexpected date in time series: {e}"))
            })?;
            series.insert(date, rate);
        }
        Ok(TimeSeries::new(series))
    }

    #[instrument(name = "Convert", skip(self), fields(from = %from, to = %to))]
    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64> {
        let from = normalize_code(from)?;
        let to = normalize_code(to)?;
        let amount = amount.to_string();

        let data: ConvertResponse = self
            .get_json(
                "convert",
                &[
                    ("from", from.as_str()),
                    ("to", to.as_str()),
                    ("amount", amount.as_str()),
                ],
            )
            .await?;

        data.result
            .get(&to)
            .copied()
            .ok_or_else(|| FxError::NetworkFailure(format!("No conversion result for {to}")))
    }

    #[instrument(name = "FetchCurrencies", skip(self))]
    async fn fetch_currencies(&self) -> Result<CurrencyDirectory> {
        let data: CurrenciesResponse = self.get_json("currencies", &[]).await?;
        Ok(CurrencyDirectory::new(data.currencies))
    }
}
