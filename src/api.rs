use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    metrics::{API_FAILURES, API_REQUESTS, API_REQUEST_DURATION},
    notify::{Notifier, BACKEND_UNREACHABLE},
    schema::{ChatTurnRequest, ChatTurnResponse, ClassifyRequest, ClassifyResponse, MetricsFilter, MetricsResponse},
    stream::ChatStream,
};

/// Backend operations the panels depend on.
///
/// Every failure has already been logged and reported to the user by the
/// time an `Err` reaches the caller.
#[async_trait]
pub trait InsightsApi: Send + Sync {
    async fn send_chat(&self, request: &ChatTurnRequest) -> ApiResult<ChatTurnResponse>;

    async fn stream_chat(&self, request: &ChatTurnRequest) -> ApiResult<ChatStream>;

    async fn fetch_metrics(&self, filter: &MetricsFilter) -> ApiResult<MetricsResponse>;

    async fn classify(&self, request: &ClassifyRequest) -> ApiResult<ClassifyResponse>;

    async fn list_categories(&self) -> ApiResult<Vec<String>>;
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    pub fn new(cfg: &Config, notifier: Arc<dyn Notifier>) -> ApiResult<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let client = Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: cfg.api_url.clone(),
            timeout,
            notifier,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log, count and notify once, then hand the error back.
    fn fail(&self, operation: &'static str, err: ApiError) -> ApiError {
        error!(operation, error = %err, "Backend request failed");
        API_FAILURES.with_label_values(&[operation]).inc();
        self.notifier.error(BACKEND_UNREACHABLE);
        err
    }

    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> ApiResult<Response> {
        API_REQUESTS.with_label_values(&[operation]).inc();
        let started = Instant::now();

        let sent = request.send().await;
        let elapsed = started.elapsed();
        API_REQUEST_DURATION
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());

        let res = sent.map_err(|err| self.fail(operation, err.into()))?;
        let status = res.status();
        debug!(operation, status = %status, elapsed_ms = elapsed.as_millis() as u64, "Backend responded");

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(self.fail(operation, ApiError::Status { status, body }));
        }

        Ok(res)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, operation: &'static str, request: RequestBuilder) -> ApiResult<T> {
        let res = self.execute(operation, request.timeout(self.timeout)).await?;
        let body = res.bytes().await.map_err(|err| self.fail(operation, err.into()))?;
        serde_json::from_slice(&body).map_err(|err| self.fail(operation, err.into()))
    }
}

#[async_trait]
impl InsightsApi for ApiClient {
    async fn send_chat(&self, request: &ChatTurnRequest) -> ApiResult<ChatTurnResponse> {
        let req = self.client.post(self.url("/chat/")).json(request);
        let reply: ChatTurnResponse = self.fetch_json("send_chat", req).await?;

        info!(len = reply.response.len(), has_context = reply.context.is_some(), "Got chat reply");
        Ok(reply)
    }

    async fn stream_chat(&self, request: &ChatTurnRequest) -> ApiResult<ChatStream> {
        let req = self
            .client
            .post(self.url("/chat/"))
            .header(ACCEPT, "text/event-stream")
            .json(request);
        let res = self.execute("stream_chat", req).await?;

        info!("Opened chat stream");
        Ok(ChatStream::from_response(res, self.notifier.clone()))
    }

    async fn fetch_metrics(&self, filter: &MetricsFilter) -> ApiResult<MetricsResponse> {
        let req = self
            .client
            .get(self.url("/messages/metrics"))
            .query(&filter.query_pairs());
        let metrics: MetricsResponse = self.fetch_json("fetch_metrics", req).await?;

        info!(
            total = metrics.total_messages,
            users = metrics.unique_users,
            days = metrics.daily_counts.len(),
            alerts = metrics.spike_alerts.len(),
            "Got metrics"
        );
        Ok(metrics)
    }

    async fn classify(&self, request: &ClassifyRequest) -> ApiResult<ClassifyResponse> {
        let req = self.client.post(self.url("/messages/classify")).json(request);
        let result: ClassifyResponse = self.fetch_json("classify", req).await?;

        info!(category = %result.category, confidence = ?result.confidence, "Classified message");
        Ok(result)
    }

    async fn list_categories(&self) -> ApiResult<Vec<String>> {
        let req = self.client.get(self.url("/categories"));
        let categories: Vec<String> = self.fetch_json("list_categories", req).await?;

        info!(count = categories.len(), "Got categories");
        Ok(categories)
    }
}
