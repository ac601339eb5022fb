use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use time::Duration;

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::{
    CapabilitySet, HealthState, HealthStatus, HistoryRequest, MetadataRequest, PriceSource,
    ProviderId, SourceError,
};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::{Bar, InstrumentMeta, Lookback, PriceSeries, Symbol, UtcDateTime, ValidationError};

const DAILY_TIMEOUT_MS: u64 = 20_000;

/// Alpha Vantage fallback adapter.
///
/// Serves daily history through `TIME_SERIES_DAILY`. The free tier has a very
/// small request budget, so this source scores below Yahoo and is only picked
/// up by the router when Yahoo is failing. Metadata is not supported.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    health_state: HealthState,
    rate_available: bool,
    score: u16,
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
}

impl Default for AlphaVantageAdapter {
    fn default() -> Self {
        Self {
            health_state: HealthState::Healthy,
            rate_available: true,
            score: 40,
            http_client: Arc::new(NoopHttpClient),
            api_key: None,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            use_real_api: false,
        }
    }
}

impl AlphaVantageAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            api_key: Some(api_key.into()),
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_health(health_state: HealthState, rate_available: bool) -> Self {
        Self {
            health_state,
            rate_available,
            ..Self::default()
        }
    }

    async fn fetch_body(&self, endpoint: &str) -> Result<String, SourceError> {
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "alphavantage circuit breaker is open; skipping upstream call",
            ));
        }

        let request = HttpRequest::get(endpoint).with_timeout_ms(DAILY_TIMEOUT_MS);

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            if error.retryable() {
                SourceError::unavailable(format!(
                    "alphavantage transport error: {}",
                    error.message()
                ))
            } else {
                SourceError::internal(format!(
                    "alphavantage transport error: {}",
                    error.message()
                ))
            }
        })?;

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(SourceError::unavailable(format!(
                "alphavantage upstream returned status {}",
                response.status
            )));
        }

        self.circuit_breaker.record_success();
        Ok(response.body)
    }
}

impl PriceSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, false)
    }

    fn history<'a>(
        &'a self,
        req: HistoryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PriceSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_history(&req).await
            } else {
                self.fetch_fake_history(&req).await
            }
        })
    }

    fn metadata<'a>(
        &'a self,
        _req: MetadataRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InstrumentMeta, SourceError>> + Send + 'a>> {
        Box::pin(async move { Err(SourceError::unsupported_call("metadata")) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.health_state;
            let mut rate_available = self.rate_available;

            match self.circuit_breaker.state() {
                CircuitState::Closed => {}
                CircuitState::HalfOpen => {
                    if state == HealthState::Healthy {
                        state = HealthState::Degraded;
                    }
                }
                CircuitState::Open => {
                    state = HealthState::Unhealthy;
                    rate_available = false;
                }
            }

            HealthStatus::new(state, rate_available, self.score)
        })
    }
}

impl AlphaVantageAdapter {
    async fn fetch_real_history(&self, req: &HistoryRequest) -> Result<PriceSeries, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::invalid_request("alphavantage API key is not configured"))?;

        let outputsize = match req.lookback {
            Lookback::OneMonth => "compact",
            Lookback::SixMonths | Lookback::OneYear => "full",
        };

        let endpoint = format!(
            "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol={}&outputsize={}&apikey={}",
            urlencoding::encode(req.symbol.as_str()),
            outputsize,
            urlencoding::encode(api_key),
        );

        let body = self.fetch_body(&endpoint).await?;
        parse_daily_response(&body, &req.symbol, req.lookback)
    }

    async fn fetch_fake_history(&self, req: &HistoryRequest) -> Result<PriceSeries, SourceError> {
        self.fetch_body("https://www.alphavantage.co/query").await?;

        let limit = req.lookback.max_bars();
        let seed = symbol_seed(&req.symbol);
        let now = UtcDateTime::now().into_inner();
        let mut bars = Vec::with_capacity(limit);

        for index in 0..limit {
            let offset = Duration::days((limit - index - 1) as i64);
            let ts = UtcDateTime::from_offset_datetime(now - offset).map_err(validation_to_error)?;
            let base = 45.0 + ((seed + index as u64 * 3) % 500) as f64 / 10.0;

            let bar = Bar::new(
                ts,
                base,
                base + 0.95,
                base - 0.70,
                base + 0.15,
                Some(12_000 + (index as u64) * 17),
            )
            .map_err(validation_to_error)?;
            bars.push(bar);
        }

        PriceSeries::new(req.symbol.clone(), bars).map_err(validation_to_error)
    }
}

fn parse_daily_response(
    body: &str,
    symbol: &Symbol,
    lookback: Lookback,
) -> Result<PriceSeries, SourceError> {
    let daily: AlphaVantageDailyResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse alphavantage daily: {}", e)))?;

    if let Some(note) = daily.note {
        return Err(SourceError::rate_limited(format!(
            "alphavantage throttle note: {}",
            note
        )));
    }
    if let Some(message) = daily.error_message {
        return Err(SourceError::unavailable(format!(
            "alphavantage API error: {}",
            message
        )));
    }

    let series = daily
        .time_series
        .ok_or_else(|| SourceError::unavailable("no daily series in alphavantage response"))?;

    // Keys are calendar dates; a BTreeMap walk already yields ascending order.
    let mut bars = Vec::new();
    for (date, row) in &series {
        let ts = UtcDateTime::parse(&format!("{date}T00:00:00Z")).map_err(|_| {
            SourceError::internal(format!("alphavantage returned unparsable date '{date}'"))
        })?;

        let bar = Bar::new(
            ts,
            parse_field("open", &row.open)?,
            parse_field("high", &row.high)?,
            parse_field("low", &row.low)?,
            parse_field("close", &row.close)?,
            row.volume.as_deref().and_then(|v| v.parse::<u64>().ok()),
        )
        .map_err(|e| SourceError::internal(format!("alphavantage bar invalid: {}", e)))?;
        bars.push(bar);
    }

    let keep_from = bars.len().saturating_sub(lookback.max_bars());
    let bars = bars.split_off(keep_from);

    PriceSeries::new(symbol.clone(), bars)
        .map_err(|e| SourceError::internal(format!("alphavantage series not normalizable: {}", e)))
}

fn parse_field(field: &'static str, value: &str) -> Result<f64, SourceError> {
    value
        .parse::<f64>()
        .map_err(|_| SourceError::internal(format!("alphavantage field '{field}' is not numeric")))
}

#[derive(Debug, Clone, Deserialize)]
struct AlphaVantageDailyResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    time_series: Option<BTreeMap<String, AlphaVantageDailyRow>>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AlphaVantageDailyRow {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume", default)]
    volume: Option<String>,
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(byte as u64)
    })
}

fn validation_to_error(error: ValidationError) -> SourceError {
    SourceError::internal(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct CannedHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        fn with_body(body: &str) -> Self {
            Self {
                response: Ok(HttpResponse::ok_json(body)),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[tokio::test]
    async fn metadata_is_unsupported() {
        let adapter = AlphaVantageAdapter::default();
        let error = adapter
            .metadata(MetadataRequest::new(symbol("MC.PA")))
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::UnsupportedCall);
    }

    #[tokio::test]
    async fn parses_daily_payload_in_ascending_order() {
        let body = r#"{
            "Time Series (Daily)": {
                "2024-01-03": {
                    "1. open": "102.0", "2. high": "103.0", "3. low": "101.0",
                    "4. close": "102.5", "5. volume": "12000"
                },
                "2024-01-02": {
                    "1. open": "100.0", "2. high": "101.5", "3. low": "99.5",
                    "4. close": "101.0", "5. volume": "11000"
                }
            }
        }"#;

        let client = Arc::new(CannedHttpClient::with_body(body));
        let adapter = AlphaVantageAdapter::with_http_client(client, "demo");

        let series = adapter
            .history(HistoryRequest::new(symbol("IBM"), Lookback::OneMonth))
            .await
            .expect("history should parse");

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, 101.0);
        assert_eq!(series.last_close(), Some(102.5));
    }

    #[tokio::test]
    async fn throttle_note_maps_to_rate_limited() {
        let body = r#"{ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 25 requests per day." }"#;

        let client = Arc::new(CannedHttpClient::with_body(body));
        let adapter = AlphaVantageAdapter::with_http_client(client, "demo");

        let error = adapter
            .history(HistoryRequest::new(symbol("IBM"), Lookback::OneMonth))
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn fake_history_fills_requested_lookback() {
        let adapter = AlphaVantageAdapter::default();

        let series = adapter
            .history(HistoryRequest::new(symbol("IBM"), Lookback::SixMonths))
            .await
            .expect("history");
        assert_eq!(series.len(), Lookback::SixMonths.max_bars());
    }
}
