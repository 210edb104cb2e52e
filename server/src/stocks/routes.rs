use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::stocks::client::{Asset, BarsRequest, MarketDataError, Timeframe};

/// Tickers served by the popular endpoint.
pub const POPULAR_SYMBOLS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "NVDA", "AMD", "INTC", "NFLX",
];

const DEFAULT_BARS_LIMIT: u32 = 30;
/// Largest page the bars upstream serves.
const MAX_BARS_LIMIT: u32 = 10_000;

#[derive(Debug, Serialize)]
pub struct QuoteEntry {
    pub symbol: String,
    pub quote: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BarsQuery {
    pub symbols: Option<String>,
    pub timeframe: Option<String>,
    pub limit: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub adjustment: Option<String>,
    pub feed: Option<String>,
}

/// Symbols go into upstream URL paths, so only ticker characters are allowed.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// An absent or empty `limit` means the default; anything else must be an
/// integer in `1..=MAX_BARS_LIMIT`.
pub fn parse_limit(raw: Option<&str>) -> Result<u32, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_BARS_LIMIT),
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|limit| (1..=MAX_BARS_LIMIT).contains(limit))
            .ok_or(ApiError::BadRequest("Invalid limit")),
    }
}

/// Daily bars with no explicit start look back twice `limit` calendar days,
/// which covers `limit` trading days across weekends and holidays.
/// Returns `None` for other timeframes or when the date would be out of range.
pub fn default_start(timeframe: Timeframe, limit: u32, now: DateTime<Utc>) -> Option<String> {
    if timeframe != Timeframe::OneDay {
        return None;
    }
    let lookback = Duration::try_days(i64::from(limit) * 2)?;
    now.checked_sub_signed(lookback)
        .map(|start| start.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// GET /api/stocks/debug - Account info as a connectivity check.
pub async fn debug_account(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    match state.market.account().await {
        Ok(account) => Ok(Json(json!({ "status": "ok", "account": account }))),
        Err(e) => {
            tracing::error!(error = %e, "Debug error");
            Err(ApiError::Failed {
                code: "failed",
                message: e.to_string(),
            })
        }
    }
}

/// GET /api/stocks/popular - Latest quotes for a fixed list of tickers.
/// Symbols whose quote cannot be fetched are left out.
pub async fn popular(State(state): State<AppState>) -> Json<Vec<QuoteEntry>> {
    let market = state.market.clone();
    let lookups = POPULAR_SYMBOLS.into_iter().map(|symbol| {
        let market = market.clone();
        async move {
            match market.latest_quote(symbol).await {
                Ok(quote) => Some(QuoteEntry {
                    symbol: symbol.to_string(),
                    quote,
                    name: None,
                }),
                Err(e) => {
                    tracing::debug!(symbol = %symbol, error = %e, "Popular quote unavailable");
                    None
                }
            }
        }
    });

    Json(join_all(lookups).await.into_iter().flatten().collect())
}

/// GET /api/stocks/search?q= - Exact symbol lookup.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<QuoteEntry>>> {
    let symbol = query.q.unwrap_or_default().trim().to_uppercase();
    if !is_valid_symbol(&symbol) {
        return Ok(Json(Vec::new()));
    }

    let quote = match state.market.latest_quote(&symbol).await {
        Ok(quote) => quote,
        Err(MarketDataError::Upstream { status, .. }) => {
            tracing::debug!(symbol = %symbol, status, "No quote for search");
            return Ok(Json(Vec::new()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Search error");
            return Err(ApiError::Failed {
                code: "search-failed",
                message: e.to_string(),
            });
        }
    };

    let name = match state.market.asset(&symbol).await {
        Ok(asset) => Some(asset.name),
        Err(e) => {
            tracing::debug!(symbol = %symbol, error = %e, "Asset lookup failed");
            None
        }
    };

    Ok(Json(vec![QuoteEntry {
        symbol,
        quote,
        name,
    }]))
}

/// GET /api/stocks/bars?symbols=AAPL,MSFT&timeframe=1Day&limit=30
pub async fn bars(
    State(state): State<AppState>,
    Query(query): Query<BarsQuery>,
) -> ApiResult<Json<Value>> {
    let symbols = query.symbols.unwrap_or_default().trim().to_uppercase();
    if symbols.is_empty() {
        return Ok(Json(json!({ "bars": {} })));
    }

    let timeframe = match query.timeframe.as_deref() {
        None | Some("") => Timeframe::default(),
        Some(raw) => raw
            .parse::<Timeframe>()
            .map_err(|_| ApiError::BadRequest("Invalid timeframe"))?,
    };
    let limit = parse_limit(query.limit.as_deref())?;
    let start = query
        .start
        .filter(|start| !start.is_empty())
        .or_else(|| default_start(timeframe, limit, Utc::now()));

    let request = BarsRequest {
        symbols,
        timeframe,
        limit,
        start,
        end: query.end.filter(|v| !v.is_empty()),
        adjustment: query.adjustment.filter(|v| !v.is_empty()),
        feed: query.feed.filter(|v| !v.is_empty()),
    };

    match state.market.bars(&request).await {
        Ok(body) => Ok(Json(body)),
        Err(MarketDataError::Upstream { status, body }) => Err(ApiError::Upstream {
            code: "bars-upstream",
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        }),
        Err(e) => {
            tracing::error!(error = %e, "Bars error");
            Err(ApiError::Failed {
                code: "bars-failed",
                message: e.to_string(),
            })
        }
    }
}

/// GET /api/stocks/asset/{symbol} - Company metadata for one ticker.
pub async fn asset(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Asset>> {
    let symbol = symbol.to_uppercase();
    if !is_valid_symbol(&symbol) {
        return Err(ApiError::BadRequest("Invalid symbol"));
    }

    match state.market.asset(&symbol).await {
        Ok(asset) => Ok(Json(asset)),
        Err(MarketDataError::Upstream { status, body }) => Err(ApiError::Upstream {
            code: "asset-upstream",
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        }),
        Err(e) => {
            tracing::error!(error = %e, "Asset error");
            Err(ApiError::Failed {
                code: "asset-failed",
                message: e.to_string(),
            })
        }
    }
}
