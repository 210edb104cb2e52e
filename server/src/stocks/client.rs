//! Alpaca market-data client.
//!
//! Quotes and bars come from the data API, account and asset metadata from
//! the trading API. Upstream error statuses are surfaced as
//! [`MarketDataError::Upstream`] so handlers can pass them through.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::AlpacaConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}")]
    Upstream { status: u16, body: String },
}

/// Bar width accepted by the bars endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    FourHour,
    #[default]
    OneDay,
    OneWeek,
    OneMonth,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMin => "1Min",
            Self::FiveMin => "5Min",
            Self::FifteenMin => "15Min",
            Self::ThirtyMin => "30Min",
            Self::OneHour => "1Hour",
            Self::FourHour => "4Hour",
            Self::OneDay => "1Day",
            Self::OneWeek => "1Week",
            Self::OneMonth => "1Month",
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1Min" => Ok(Self::OneMin),
            "5Min" => Ok(Self::FiveMin),
            "15Min" => Ok(Self::FifteenMin),
            "30Min" => Ok(Self::ThirtyMin),
            "1Hour" => Ok(Self::OneHour),
            "4Hour" => Ok(Self::FourHour),
            "1Day" => Ok(Self::OneDay),
            "1Week" => Ok(Self::OneWeek),
            "1Month" => Ok(Self::OneMonth),
            other => Err(format!("unknown timeframe {other}")),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a multi-symbol bars request.
#[derive(Debug, Clone, PartialEq)]
pub struct BarsRequest {
    /// Comma-separated, upper-cased symbols.
    pub symbols: String,
    pub timeframe: Timeframe,
    pub limit: u32,
    pub start: Option<String>,
    pub end: Option<String>,
    pub adjustment: Option<String>,
    pub feed: Option<String>,
}

/// Asset metadata from the trading API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub tradable: bool,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Brokerage account info, used as a connectivity check.
    async fn account(&self) -> Result<Value, MarketDataError>;

    /// The `quote` object of the latest quote for one symbol.
    async fn latest_quote(&self, symbol: &str) -> Result<Value, MarketDataError>;

    /// Raw bars response: `{ "bars": { SYMBOL: [...] }, ... }`.
    async fn bars(&self, request: &BarsRequest) -> Result<Value, MarketDataError>;

    async fn asset(&self, symbol: &str) -> Result<Asset, MarketDataError>;
}

/// [`MarketData`] over the Alpaca REST APIs.
#[derive(Clone)]
pub struct AlpacaClient {
    http_client: Client,
    data_url: String,
    trading_url: String,
}

impl AlpacaClient {
    pub fn new(config: &AlpacaConfig) -> Result<Self, MarketDataError> {
        let mut headers = header::HeaderMap::new();

        if let Some(key_id) = &config.key_id {
            headers.insert(
                "APCA-API-KEY-ID",
                key_id
                    .parse()
                    .map_err(|_| MarketDataError::Config("Invalid API key id".to_string()))?,
            );
        }
        if let Some(secret) = &config.secret_key {
            let mut value: header::HeaderValue = secret
                .parse()
                .map_err(|_| MarketDataError::Config("Invalid API secret".to_string()))?;
            value.set_sensitive(true);
            headers.insert("APCA-API-SECRET-KEY", value);
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| MarketDataError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            data_url: config.data_url.trim_end_matches('/').to_string(),
            trading_url: config.trading_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, MarketDataError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketData for AlpacaClient {
    async fn account(&self) -> Result<Value, MarketDataError> {
        let url = format!("{}/account", self.trading_url);
        self.send_json(self.http_client.get(url)).await
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Value, MarketDataError> {
        let url = format!("{}/stocks/{}/quotes/latest", self.data_url, symbol);
        let mut body = self.send_json(self.http_client.get(url)).await?;
        Ok(body
            .get_mut("quote")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn bars(&self, request: &BarsRequest) -> Result<Value, MarketDataError> {
        let url = format!("{}/stocks/bars", self.data_url);
        let mut query: Vec<(&str, String)> = vec![
            ("symbols", request.symbols.clone()),
            ("timeframe", request.timeframe.to_string()),
            ("limit", request.limit.to_string()),
        ];
        let optional = [
            ("start", &request.start),
            ("end", &request.end),
            ("adjustment", &request.adjustment),
            ("feed", &request.feed),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                query.push((key, value.clone()));
            }
        }

        tracing::debug!(symbols = %request.symbols, timeframe = %request.timeframe, "Fetching bars");
        self.send_json(self.http_client.get(url).query(&query)).await
    }

    async fn asset(&self, symbol: &str) -> Result<Asset, MarketDataError> {
        let url = format!("{}/assets/{}", self.trading_url, symbol);
        let body = self.send_json(self.http_client.get(url)).await?;
        serde_json::from_value(body).map_err(|e| MarketDataError::Upstream {
            status: 502,
            body: format!("unexpected asset payload: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("1Day".parse::<Timeframe>().unwrap(), Timeframe::OneDay);
        assert_eq!("5Min".parse::<Timeframe>().unwrap(), Timeframe::FiveMin);
        assert!("1day".parse::<Timeframe>().is_err());
        assert!("".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_roundtrips_through_display() {
        for tf in [Timeframe::OneMin, Timeframe::OneHour, Timeframe::OneMonth] {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn test_client_rejects_bad_header_values() {
        let config = AlpacaConfig {
            key_id: Some("bad\nkey".to_string()),
            ..AlpacaConfig::default()
        };
        assert!(matches!(
            AlpacaClient::new(&config),
            Err(MarketDataError::Config(_))
        ));
    }
}
