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

const CHART_TIMEOUT_MS: u64 = 20_000;

/// Yahoo Finance adapter supporting both real API calls and mock mode.
///
/// The chart endpoint serves daily OHLCV history; quoteSummary serves the
/// metadata fields. Anonymous access works for both, so no API key is read.
#[derive(Clone)]
pub struct YahooAdapter {
    health_state: HealthState,
    rate_available: bool,
    score: u16,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            health_state: HealthState::Healthy,
            rate_available: true,
            score: 82,
            http_client: Arc::new(NoopHttpClient),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            use_real_api: false,
        }
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
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
                "yahoo circuit breaker is open; skipping upstream call",
            ));
        }

        let request = HttpRequest::get(endpoint)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(CHART_TIMEOUT_MS);

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            if error.retryable() {
                SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
            } else {
                SourceError::internal(format!("yahoo transport error: {}", error.message()))
            }
        })?;

        if response.status == 429 {
            self.circuit_breaker.record_failure();
            return Err(SourceError::rate_limited("yahoo returned status 429"));
        }

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(SourceError::unavailable(format!(
                "yahoo upstream returned status {}",
                response.status
            )));
        }

        self.circuit_breaker.record_success();
        Ok(response.body)
    }
}

impl PriceSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
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
        req: MetadataRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InstrumentMeta, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_metadata(&req).await
            } else {
                self.fetch_fake_metadata(&req).await
            }
        })
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

// Real API implementation methods
impl YahooAdapter {
    async fn fetch_real_history(&self, req: &HistoryRequest) -> Result<PriceSeries, SourceError> {
        let endpoint = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?range={}&interval=1d",
            urlencoding::encode(req.symbol.as_str()),
            req.lookback.as_str(),
        );

        let body = self.fetch_body(&endpoint).await?;
        parse_chart_response(&body, &req.symbol, req.lookback)
    }

    async fn fetch_real_metadata(&self, req: &MetadataRequest) -> Result<InstrumentMeta, SourceError> {
        let modules = "summaryDetail,financialData,price";
        let endpoint = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}?modules={}",
            urlencoding::encode(req.symbol.as_str()),
            modules,
        );

        let body = self.fetch_body(&endpoint).await?;
        parse_summary_response(&body)
    }
}

// Fake data methods (for tests and keyless mock mode)
impl YahooAdapter {
    async fn fetch_fake_history(&self, req: &HistoryRequest) -> Result<PriceSeries, SourceError> {
        self.fetch_body("https://query1.finance.yahoo.com/v8/finance/chart")
            .await?;

        let limit = req.lookback.max_bars();
        let seed = symbol_seed(&req.symbol);
        let now = UtcDateTime::now().into_inner();
        let mut bars = Vec::with_capacity(limit);

        for index in 0..limit {
            let offset = Duration::days((limit - index - 1) as i64);
            let ts = UtcDateTime::from_offset_datetime(now - offset).map_err(validation_to_error)?;
            let base = 60.0 + ((seed + index as u64) % 400) as f64 / 10.0;

            let bar = Bar::new(
                ts,
                base,
                base + 1.10,
                base - 0.90,
                base + 0.25,
                Some(30_000 + (index as u64) * 40),
            )
            .map_err(validation_to_error)?;
            bars.push(bar);
        }

        PriceSeries::new(req.symbol.clone(), bars).map_err(validation_to_error)
    }

    async fn fetch_fake_metadata(&self, req: &MetadataRequest) -> Result<InstrumentMeta, SourceError> {
        self.fetch_body("https://query1.finance.yahoo.com/v10/finance/quoteSummary")
            .await?;

        let seed = symbol_seed(&req.symbol);
        InstrumentMeta::new(
            Some("EUR"),
            Some(12.0 + (seed % 180) as f64 / 10.0),
            Some(0.8 + (seed % 40) as f64 / 10.0),
            Some(String::from("hold")),
        )
        .map_err(validation_to_error)
    }
}

fn parse_chart_response(
    body: &str,
    symbol: &Symbol,
    lookback: Lookback,
) -> Result<PriceSeries, SourceError> {
    let chart_response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {}", e)))?;

    if let Some(error) = &chart_response.chart.error {
        if !error.is_empty() {
            return Err(SourceError::unavailable(format!(
                "yahoo chart API error: {}",
                error
            )));
        }
    }

    let result = chart_response
        .chart
        .result
        .first()
        .ok_or_else(|| SourceError::unavailable("no chart data in yahoo response"))?;

    let timestamps = result
        .timestamp
        .as_ref()
        .ok_or_else(|| SourceError::unavailable("no timestamp data in yahoo response"))?;
    let quote = result
        .indicators
        .quote
        .first()
        .ok_or_else(|| SourceError::unavailable("no quote data in yahoo response"))?;

    let mut bars = Vec::new();
    let mut last_ts = None;
    for (i, &ts_value) in timestamps.iter().enumerate().take(lookback.max_bars()) {
        let ts = UtcDateTime::from_unix_timestamp(ts_value)
            .map_err(|e| SourceError::internal(format!("invalid timestamp: {}", e)))?;

        // Intraday sessions can repeat a day boundary; keep the first occurrence.
        if last_ts == Some(ts) {
            continue;
        }

        if let (Some(Some(open)), Some(Some(high)), Some(Some(low)), Some(Some(close))) = (
            quote.open.get(i),
            quote.high.get(i),
            quote.low.get(i),
            quote.close.get(i),
        ) {
            let volume = quote.volume.get(i).copied().flatten().map(|v| v as u64);

            if let Ok(bar) = Bar::new(ts, *open, *high, *low, *close, volume) {
                bars.push(bar);
                last_ts = Some(ts);
            }
        }
    }

    PriceSeries::new(symbol.clone(), bars)
        .map_err(|e| SourceError::internal(format!("yahoo series not normalizable: {}", e)))
}

fn parse_summary_response(body: &str) -> Result<InstrumentMeta, SourceError> {
    let summary: YahooQuoteSummaryResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo summary: {}", e)))?;

    if let Some(error) = &summary.quote_summary.error {
        if !error.is_empty() {
            return Err(SourceError::unavailable(format!(
                "yahoo summary API error: {}",
                error
            )));
        }
    }

    let result = summary
        .quote_summary
        .result
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::unavailable("no summary data in yahoo response"))?;

    let currency = result
        .price
        .as_ref()
        .and_then(|p| p.currency.clone());

    let pe_ratio = result
        .summary_detail
        .as_ref()
        .and_then(|sd| sd.trailing_pe.as_ref().and_then(YahooRawValue::to_option))
        .or_else(|| {
            result
                .summary_detail
                .as_ref()
                .and_then(|sd| sd.forward_pe.as_ref().and_then(YahooRawValue::to_option))
        });

    // Yahoo reports yield as a fraction; callers expect percent.
    let dividend_yield = result
        .summary_detail
        .as_ref()
        .and_then(|sd| sd.dividend_yield.as_ref().and_then(YahooRawValue::to_option))
        .map(|fraction| fraction * 100.0);

    let recommendation_key = result
        .financial_data
        .as_ref()
        .and_then(|fd| fd.recommendation_key.clone());

    InstrumentMeta::new(
        currency.as_deref(),
        pe_ratio,
        dividend_yield,
        recommendation_key,
    )
    .map_err(|e| SourceError::internal(format!("yahoo metadata not normalizable: {}", e)))
}

// Yahoo Finance API response structures
#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    result: Vec<YahooChartResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: YahooQuoteSummaryData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryData {
    result: Vec<YahooQuoteSummaryResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryResult {
    #[serde(rename = "price", default)]
    price: Option<YahooPriceData>,
    #[serde(rename = "summaryDetail", default)]
    summary_detail: Option<YahooSummaryDetailData>,
    #[serde(rename = "financialData", default)]
    financial_data: Option<YahooFinancialData>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooPriceData {
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooSummaryDetailData {
    #[serde(rename = "trailingPE", default)]
    trailing_pe: Option<YahooRawValue>,
    #[serde(rename = "forwardPE", default)]
    forward_pe: Option<YahooRawValue>,
    #[serde(rename = "dividendYield", default)]
    dividend_yield: Option<YahooRawValue>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooFinancialData {
    #[serde(rename = "recommendationKey", default)]
    recommendation_key: Option<String>,
}

/// Yahoo wraps numeric values in an object carrying `raw` plus display text.
#[derive(Debug, Clone, Deserialize)]
struct YahooRawValue {
    #[serde(default)]
    raw: Option<f64>,
}

impl YahooRawValue {
    fn to_option(&self) -> Option<f64> {
        self.raw.filter(|v| v.is_finite())
    }
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
    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn with_body(body: &str) -> Self {
            Self {
                response: Ok(HttpResponse::ok_json(body)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failure() -> Self {
            Self {
                response: Err(HttpError::new("upstream timeout")),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
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
    async fn fake_history_fills_requested_lookback() {
        let adapter = YahooAdapter::default();
        let request = HistoryRequest::new(symbol("MC.PA"), Lookback::OneYear);

        let series = adapter.history(request).await.expect("history");
        assert_eq!(series.len(), Lookback::OneYear.max_bars());
        assert!(series.last_close().expect("close") > 0.0);
    }

    #[tokio::test]
    async fn fake_history_is_deterministic_per_symbol() {
        let adapter = YahooAdapter::default();

        let first = adapter
            .history(HistoryRequest::new(symbol("SAN.PA"), Lookback::OneMonth))
            .await
            .expect("history");
        let second = adapter
            .history(HistoryRequest::new(symbol("SAN.PA"), Lookback::OneMonth))
            .await
            .expect("history");

        assert_eq!(
            first.closes().collect::<Vec<_>>(),
            second.closes().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn circuit_breaker_opens_after_repeated_transport_failures() {
        let client = Arc::new(RecordingHttpClient::failure());
        let adapter = YahooAdapter::with_http_client(client);
        let request = HistoryRequest::new(symbol("MSFT"), Lookback::OneMonth);

        for _ in 0..3 {
            let error = adapter
                .history(request.clone())
                .await
                .expect_err("call should fail");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }

        let health = adapter.health().await;
        assert_eq!(health.state, HealthState::Unhealthy);
        assert!(!health.rate_available);

        let error = adapter
            .history(request)
            .await
            .expect_err("breaker should block request");
        assert!(error.message().contains("circuit breaker is open"));
    }

    #[tokio::test]
    async fn parses_real_chart_payload() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704067200, 1704153600, 1704240000],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, 101.0, 102.0],
                            "high": [101.5, 102.5, 103.5],
                            "low": [99.0, 100.0, 101.0],
                            "close": [101.0, 102.0, 103.0],
                            "volume": [10000, 11000, null]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let client = Arc::new(RecordingHttpClient::with_body(body));
        let adapter = YahooAdapter::with_http_client(client.clone());

        let series = adapter
            .history(HistoryRequest::new(symbol("MC.PA"), Lookback::OneMonth))
            .await
            .expect("history should parse");

        assert_eq!(series.len(), 3);
        assert_eq!(series.last_close(), Some(103.0));
        assert!(series.bars()[2].volume.is_none());

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.contains("/v8/finance/chart/MC.PA"));
        assert!(requests[0].url.contains("range=1mo"));
    }

    #[tokio::test]
    async fn chart_rows_with_null_prices_are_skipped() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704067200, 1704153600],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, null],
                            "high": [101.5, null],
                            "low": [99.0, null],
                            "close": [101.0, null],
                            "volume": [10000, null]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let client = Arc::new(RecordingHttpClient::with_body(body));
        let adapter = YahooAdapter::with_http_client(client);

        let series = adapter
            .history(HistoryRequest::new(symbol("OR.PA"), Lookback::OneMonth))
            .await
            .expect("history should parse");
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn parses_real_summary_payload() {
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "price": { "currency": "EUR" },
                    "summaryDetail": {
                        "trailingPE": { "raw": 24.5 },
                        "dividendYield": { "raw": 0.013 }
                    },
                    "financialData": { "recommendationKey": "buy" }
                }],
                "error": null
            }
        }"#;

        let client = Arc::new(RecordingHttpClient::with_body(body));
        let adapter = YahooAdapter::with_http_client(client);

        let meta = adapter
            .metadata(MetadataRequest::new(symbol("MC.PA")))
            .await
            .expect("metadata should parse");

        assert_eq!(meta.currency.as_deref(), Some("EUR"));
        assert_eq!(meta.pe_ratio, Some(24.5));
        assert!((meta.dividend_yield.expect("yield") - 1.3).abs() < 1e-9);
        assert_eq!(meta.recommendation_key.as_deref(), Some("buy"));
    }

    #[tokio::test]
    async fn rate_limit_status_maps_to_rate_limited_kind() {
        let client = Arc::new(RecordingHttpClient {
            response: Ok(HttpResponse {
                status: 429,
                body: String::new(),
            }),
            requests: Mutex::new(Vec::new()),
        });
        let adapter = YahooAdapter::with_http_client(client);

        let error = adapter
            .history(HistoryRequest::new(symbol("AI.PA"), Lookback::OneMonth))
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    }
}
