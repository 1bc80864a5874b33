//! HTTP clients for the webhook/ticker manager and the P/L history store.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use tickmon_core::{InstrumentToken, PlSnapshot, StrategyType, Subscription};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for subscribe/unsubscribe calls.
#[derive(Debug, Serialize)]
struct TokensRequest<'a> {
    tokens: &'a [InstrumentToken],
}

/// Response body of the subscription list endpoint.
#[derive(Debug, Deserialize)]
struct SubscriptionsResponse {
    #[serde(default)]
    data: Vec<Subscription>,
}

/// Response body of the webhook status endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    ticker_connected: bool,
}

/// Response body of the P/L history read endpoint.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<PlRecord>,
}

/// A saved P/L snapshot as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlRecord {
    #[serde(flatten)]
    pub snapshot: PlSnapshot,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Query parameters for the P/L history read endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<StrategyType>,
}

/// Webhook/ticker connection management surface.
#[async_trait]
pub trait TickerApi: Send + Sync {
    /// Subscribe a set of tokens. An empty set establishes the ticker
    /// connection without adding instruments.
    async fn subscribe_tokens(&self, tokens: &[InstrumentToken]) -> ApiResult<()>;

    /// Unsubscribe a set of tokens.
    async fn unsubscribe_tokens(&self, tokens: &[InstrumentToken]) -> ApiResult<()>;

    /// Tear down the ticker connection.
    async fn disconnect(&self) -> ApiResult<()>;

    /// Fetch the current subscription list with latest tick data.
    async fn fetch_subscriptions(&self) -> ApiResult<Vec<Subscription>>;

    /// Fetch the ticker connection flag.
    async fn fetch_status(&self) -> ApiResult<bool>;
}

/// Strategy P/L snapshot persistence surface.
#[async_trait]
pub trait PlHistoryApi: Send + Sync {
    /// Persist one snapshot. Append-only; the saved record is not retained
    /// locally.
    async fn save_snapshot(&self, snapshot: &PlSnapshot) -> ApiResult<()>;

    /// Read saved snapshots for a strategy.
    async fn fetch_history(&self, strategy_id: i64, query: &HistoryQuery)
        -> ApiResult<Vec<PlRecord>>;
}

/// HTTP client for both dashboard collaborator surfaces.
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a new client against a base URL
    /// (e.g., `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-2xx response to `ApiError::Http` with the body attached.
    async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl TickerApi for DashboardClient {
    async fn subscribe_tokens(&self, tokens: &[InstrumentToken]) -> ApiResult<()> {
        debug!(count = tokens.len(), "Subscribing tokens");

        let response = self
            .client
            .post(self.url("/api/zerodha-ws/subscribe"))
            .json(&TokensRequest { tokens })
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn unsubscribe_tokens(&self, tokens: &[InstrumentToken]) -> ApiResult<()> {
        debug!(count = tokens.len(), "Unsubscribing tokens");

        let response = self
            .client
            .post(self.url("/api/zerodha-ws/unsubscribe"))
            .json(&TokensRequest { tokens })
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn disconnect(&self) -> ApiResult<()> {
        info!("Disconnecting ticker");

        let response = self
            .client
            .post(self.url("/api/zerodha-ws/disconnect"))
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch_subscriptions(&self) -> ApiResult<Vec<Subscription>> {
        let response = self
            .client
            .get(self.url("/api/zerodha-ws/subscriptions"))
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let body: SubscriptionsResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("subscriptions: {e}")))?;

        Ok(body.data)
    }

    async fn fetch_status(&self) -> ApiResult<bool> {
        let response = self
            .client
            .get(self.url("/api/zerodha-ws/status"))
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("status: {e}")))?;

        Ok(body.ticker_connected)
    }
}

#[async_trait]
impl PlHistoryApi for DashboardClient {
    async fn save_snapshot(&self, snapshot: &PlSnapshot) -> ApiResult<()> {
        debug!(
            strategy_id = snapshot.strategy_id,
            strategy_type = %snapshot.strategy_type,
            total_pl = %snapshot.total_pl,
            "Saving P/L snapshot"
        );

        let response = self
            .client
            .post(self.url("/api/strategy-pl-history/"))
            .json(snapshot)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch_history(
        &self,
        strategy_id: i64,
        query: &HistoryQuery,
    ) -> ApiResult<Vec<PlRecord>> {
        let response = self
            .client
            .get(self.url(&format!("/api/strategy-pl-history/{strategy_id}")))
            .query(query)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("history: {e}")))?;

        Ok(body.data)
    }
}
