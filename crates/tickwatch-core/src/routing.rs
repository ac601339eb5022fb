use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::adapters::{AlphaVantageAdapter, YahooAdapter};
use crate::data_source::{
    HealthState, HistoryRequest, MetadataRequest, PriceSource, ProviderId, SourceError,
};
use crate::http_client::ReqwestHttpClient;
use crate::{InstrumentMeta, PriceSeries};

/// Source selection strategy for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Order candidates by health and score, falling back on failure.
    Auto,
    /// Use exactly one provider and never fall back.
    Strict(ProviderId),
}

impl SourceStrategy {
    fn is_strict(&self) -> bool {
        matches!(self, Self::Strict(_))
    }
}

/// Successful routed call.
#[derive(Debug, Clone)]
pub struct RouteSuccess<T> {
    pub data: T,
    pub selected_source: ProviderId,
    pub source_chain: Vec<ProviderId>,
}

/// Failed routed call after exhausting candidates.
#[derive(Debug, Clone)]
pub struct RouteFailure {
    pub source_chain: Vec<ProviderId>,
    pub errors: Vec<(ProviderId, SourceError)>,
}

impl RouteFailure {
    /// The most meaningful upstream error: the last one recorded.
    pub fn last_error(&self) -> Option<&SourceError> {
        self.errors.last().map(|(_, error)| error)
    }
}

pub type RouteResult<T> = Result<RouteSuccess<T>, RouteFailure>;

type InvokeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Adapter registry and fallback routing engine.
///
/// Mirrors what operators do by hand when a quote API starts failing: try the
/// best free source first, then walk down the list.
pub struct SourceRouter {
    adapters: HashMap<ProviderId, Arc<dyn PriceSource>>,
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(YahooAdapter::default()),
            Arc::new(AlphaVantageAdapter::default()),
        ])
    }
}

impl SourceRouter {
    pub fn new(adapters: Vec<Arc<dyn PriceSource>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self { adapters }
    }

    pub async fn route_history(
        &self,
        req: &HistoryRequest,
        strategy: SourceStrategy,
    ) -> RouteResult<PriceSeries> {
        let req = req.clone();
        self.route_call(strategy, Capability::History, move |source| {
            source.history(req.clone())
        })
        .await
    }

    pub async fn route_metadata(
        &self,
        req: &MetadataRequest,
        strategy: SourceStrategy,
    ) -> RouteResult<InstrumentMeta> {
        let req = req.clone();
        self.route_call(strategy, Capability::Metadata, move |source| {
            source.metadata(req.clone())
        })
        .await
    }

    async fn route_call<T, F>(
        &self,
        strategy: SourceStrategy,
        capability: Capability,
        mut invoke: F,
    ) -> RouteResult<T>
    where
        F: for<'a> FnMut(&'a dyn PriceSource) -> InvokeFuture<'a, T>,
    {
        let planned_chain = self.plan_sources(capability, &strategy).await;
        let mut source_chain = Vec::with_capacity(planned_chain.len());
        let mut errors = Vec::new();

        for provider in planned_chain {
            source_chain.push(provider);
            let Some(adapter) = self.adapters.get(&provider) else {
                errors.push((
                    provider,
                    SourceError::invalid_request(format!(
                        "source adapter '{provider}' is not registered"
                    )),
                ));
                if strategy.is_strict() {
                    break;
                }
                continue;
            };

            if !capability.supported_by(adapter.as_ref()) {
                errors.push((provider, SourceError::unsupported_call(capability.as_str())));
                if strategy.is_strict() {
                    break;
                }
                continue;
            }

            let health = adapter.health().await;
            if health.state == HealthState::Unhealthy {
                errors.push((
                    provider,
                    SourceError::unavailable("source health check reported unhealthy"),
                ));
                if strategy.is_strict() {
                    break;
                }
                continue;
            }

            match invoke(adapter.as_ref()).await {
                Ok(data) => {
                    if !errors.is_empty() {
                        tracing::debug!(
                            selected = %provider,
                            failed_attempts = errors.len(),
                            "source fallback succeeded"
                        );
                    }
                    return Ok(RouteSuccess {
                        data,
                        selected_source: provider,
                        source_chain,
                    });
                }
                Err(error) => {
                    errors.push((provider, error));
                    if strategy.is_strict() {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            errors.push((
                ProviderId::Yahoo,
                SourceError::unavailable(format!(
                    "no source candidates available for call '{}'",
                    capability.as_str()
                )),
            ));
        }

        Err(RouteFailure {
            source_chain,
            errors,
        })
    }

    async fn plan_sources(
        &self,
        capability: Capability,
        strategy: &SourceStrategy,
    ) -> Vec<ProviderId> {
        match strategy {
            SourceStrategy::Auto => self.auto_chain(capability).await,
            SourceStrategy::Strict(provider) => vec![*provider],
        }
    }

    async fn auto_chain(&self, capability: Capability) -> Vec<ProviderId> {
        let mut scored = Vec::with_capacity(self.adapters.len());
        for (provider, source) in &self.adapters {
            if !capability.supported_by(source.as_ref()) {
                continue;
            }

            let health = source.health().await;
            let health_score = match health.state {
                HealthState::Healthy => 250,
                HealthState::Degraded => 100,
                HealthState::Unhealthy => 0,
            };
            let rate_score = if health.rate_available { 150 } else { 0 };
            let total_score = health_score + rate_score + i32::from(health.score);

            scored.push((*provider, total_score));
        }

        scored.sort_by(|left, right| {
            right
                .1
                .cmp(&left.1)
                .then_with(|| left.0.as_str().cmp(right.0.as_str()))
        });

        scored.into_iter().map(|(provider, _)| provider).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    History,
    Metadata,
}

impl Capability {
    fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Metadata => "metadata",
        }
    }

    fn supported_by(self, source: &dyn PriceSource) -> bool {
        let capabilities = source.capabilities();
        match self {
            Self::History => capabilities.history,
            Self::Metadata => capabilities.metadata,
        }
    }
}

/// Builder for creating a [`SourceRouter`] with real HTTP clients.
///
/// Reads API keys from environment variables:
///
/// | Provider | Primary Env Var | Fallback Env Var |
/// |----------|-----------------|------------------|
/// | Yahoo | (no key required) | - |
/// | Alpha Vantage | `TICKWATCH_ALPHAVANTAGE_API_KEY` | `ALPHAVANTAGE_API_KEY` |
#[derive(Debug, Default)]
pub struct SourceRouterBuilder {
    use_mock: bool,
    alphavantage_api_key: Option<String>,
}

impl SourceRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock mode: all adapters serve deterministic data with no network I/O.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    /// Configure adapters to use real HTTP clients, reading keys from the
    /// environment. A provider without a key stays in mock mode.
    pub fn with_real_clients(mut self) -> Self {
        self.use_mock = false;
        self.alphavantage_api_key = env::var("TICKWATCH_ALPHAVANTAGE_API_KEY")
            .or_else(|_| env::var("ALPHAVANTAGE_API_KEY"))
            .ok();
        self
    }

    pub fn with_alphavantage_key(mut self, key: impl Into<String>) -> Self {
        self.alphavantage_api_key = Some(key.into());
        self
    }

    pub fn build(self) -> SourceRouter {
        if self.use_mock {
            return SourceRouter::default();
        }

        let mut adapters: Vec<Arc<dyn PriceSource>> = Vec::new();

        let http_client = Arc::new(ReqwestHttpClient::new());
        adapters.push(Arc::new(YahooAdapter::with_http_client(http_client.clone())));

        if let Some(key) = self.alphavantage_api_key {
            adapters.push(Arc::new(AlphaVantageAdapter::with_http_client(
                http_client,
                key,
            )));
        } else {
            adapters.push(Arc::new(AlphaVantageAdapter::default()));
        }

        SourceRouter::new(adapters)
    }
}
