//! HTTP client implementation.
//!
//! Provides the request/response client for the riskdash REST API.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::config::ClientConfig;
use super::error::ClientError;
use super::query::{Query, RequestOptions};
use crate::types::{
    Exposure, PnlContributor, PnlPoint, PnlSummary, Position, Report, SummaryRequest,
    SummaryResponse, VarParams, VarResult,
};

/// FastAPI error body.
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: Value,
}

/// Contributors list response.
#[derive(Debug, Deserialize)]
struct ContributorsResponse {
    contributors: Vec<PnlContributor>,
}

/// HTTP client for the riskdash REST API.
///
/// Cloning is cheap; clones share the connection pool and the token.
/// Failures are returned to the caller as-is: there is no retry here.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    base: Url,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        // A trailing slash makes `Url::join` append instead of replacing the
        // last segment.
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Transport)?;

        let token = Arc::new(RwLock::new(config.token.clone()));

        Ok(Self {
            config,
            base,
            http,
            token,
        })
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replaces the bearer token.
    ///
    /// Takes effect on the next request; requests already in flight keep the
    /// token they were built with.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Returns the current bearer token.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Resolves a relative path against the base URL and appends the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined to the base URL.
    pub fn url(&self, path: &str, query: &Query) -> Result<Url, ClientError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidRequest(format!("{}: {}", path, e)))?;

        let pairs = query.pairs();
        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in pairs {
                serializer.append_pair(key, &value);
            }
        }

        Ok(url)
    }

    /// Sends a request and returns the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] on a non-2xx status, a transport error
    /// when the server cannot be reached, and [`ClientError::Parse`] when a
    /// successful response does not contain JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, ClientError> {
        if ![Method::GET, Method::POST, Method::PUT, Method::DELETE].contains(&method) {
            return Err(ClientError::InvalidRequest(format!(
                "unsupported method {}",
                method
            )));
        }

        let url = self.url(path, &options.query)?;
        let sends_body = method == Method::POST || method == Method::PUT;
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, url);

        if let Some(token) = self.token.read().await.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
            builder = builder.header(AUTHORIZATION, value);
        }

        if sends_body {
            if let Some(body) = options.body {
                let bytes =
                    serde_json::to_vec(&body).map_err(|e| ClientError::Parse(e.to_string()))?;
                builder = builder
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(bytes);
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Sends a request and deserializes the body into `T`.
    async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let value = self.request(method, path, options).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Makes a GET request to the given path.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: Query) -> Result<T, ClientError> {
        self.request_as(Method::GET, path, RequestOptions::new().with_query(query))
            .await
    }

    /// Gets the current positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn positions(&self) -> Result<Vec<Position>, ClientError> {
        self.get("/positions", Query::new()).await
    }

    /// Gets the portfolio P&L summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn pnl_summary(&self) -> Result<PnlSummary, ClientError> {
        self.get("/pnl/summary", Query::new()).await
    }

    /// Gets the P&L time series for the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn pnl_timeseries(&self, days: u32) -> Result<Vec<PnlPoint>, ClientError> {
        self.get("/pnl/timeseries", Query::new().param("days", days))
            .await
    }

    /// Gets the top P&L contributors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn pnl_contributors(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<PnlContributor>, ClientError> {
        let response: ContributorsResponse = self
            .get("/pnl/contributors", Query::new().param("limit", limit))
            .await?;
        Ok(response.contributors)
    }

    /// Gets the portfolio Value at Risk.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn risk_var(&self, params: &VarParams) -> Result<VarResult, ClientError> {
        self.get("/risk/var", params.to_query()).await
    }

    /// Gets the exposure analysis.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn risk_exposure(&self) -> Result<Exposure, ClientError> {
        self.get("/risk/exposure", Query::new()).await
    }

    /// Requests an AI-generated risk summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn llm_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<SummaryResponse, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::Parse(e.to_string()))?;
        self.request_as(
            Method::POST,
            "/llm/summary",
            RequestOptions::new().with_body(body),
        )
        .await
    }

    /// Lists generated reports, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn reports(&self, limit: Option<u32>) -> Result<Vec<Report>, ClientError> {
        self.get("/reports", Query::new().param("limit", limit))
            .await
    }

    /// Gets a single report.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the report does not exist.
    pub async fn report(&self, id: i64) -> Result<Report, ClientError> {
        self.get(&format!("/reports/{}", id), Query::new()).await
    }
}

/// Extracts a readable message from an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<ErrorDetail>(body) {
        return match error.detail {
            Value::String(s) => s,
            other => other.to_string(),
        };
    }

    if !body.trim().is_empty() {
        return body.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, RecordedRequest};
    use crate::types::VarMethod;
    use serde_json::json;

    #[test]
    fn test_client_new() {
        let client = ApiClient::new(ClientConfig::new("https://api.example.com/api"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_invalid_config() {
        let client = ApiClient::new(ClientConfig::new(""));
        assert!(client.is_err());
    }

    #[test]
    fn test_url_joins_relative_path() {
        let client = ApiClient::with_base_url("http://localhost:8000/api").expect("client");
        let url = client
            .url("/risk/var", &VarParams::default().to_query())
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/risk/var?method=historical&alpha=0.99&lookback=250"
        );
    }

    #[test]
    fn test_url_omits_absent_params() {
        let client = ApiClient::with_base_url("http://localhost:8000/api/").expect("client");
        let url = client
            .url("reports", &Query::new().param("limit", None::<u32>))
            .expect("url");
        assert_eq!(url.as_str(), "http://localhost:8000/api/reports");
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"detail": "Report not found"}"#),
            "Report not found"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_token() {
        let backend = MockBackend::start().await;
        backend.respond_json("/api/pnl/summary", 200, json!({
            "unrealized_pnl": 1.0, "realized_pnl": 2.0,
            "total_pnl": 3.0, "portfolio_value": 100.0
        }));

        let client = ApiClient::new(ClientConfig::new(backend.api_url()).with_token("t0k3n"))
            .expect("client");
        let summary = client.pnl_summary().await.expect("summary");
        assert_eq!(summary.total_pnl, 3.0);

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer t0k3n"));
        assert!(requests[0].content_type.is_none());
    }

    #[tokio::test]
    async fn test_set_token_applies_to_next_request() {
        let backend = MockBackend::start().await;
        backend.respond_json("/api/positions", 200, json!([]));

        let client = ApiClient::with_base_url(backend.api_url()).expect("client");
        client.positions().await.expect("positions");
        client.set_token(Some("fresh".to_string())).await;
        client.positions().await.expect("positions");

        let auth: Vec<Option<String>> = backend
            .requests()
            .into_iter()
            .map(|r: RecordedRequest| r.authorization)
            .collect();
        assert_eq!(auth, vec![None, Some("Bearer fresh".to_string())]);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let backend = MockBackend::start().await;
        backend.respond_json("/api/llm/summary", 200, json!({
            "summary": "Risk is moderate.",
            "account_id": "demo",
            "generated_at": "2024-01-01T00:00:00",
            "report_id": 12
        }));

        let client = ApiClient::with_base_url(backend.api_url()).expect("client");
        let request = SummaryRequest {
            alpha: 0.95,
            lookback_days: 100,
            save_report: false,
        };
        let response = client.llm_summary(&request).await.expect("summary");
        assert_eq!(response.report_id, Some(12));

        let recorded = backend.requests();
        assert_eq!(recorded[0].method, "POST");
        assert_eq!(recorded[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(
            recorded[0].body,
            Some(json!({"alpha": 0.95, "lookback_days": 100, "save_report": false}))
        );
    }

    #[tokio::test]
    async fn test_get_never_sends_body() {
        let backend = MockBackend::start().await;
        backend.respond_json("/api/positions", 200, json!([]));

        let client = ApiClient::with_base_url(backend.api_url()).expect("client");
        client
            .request(
                Method::GET,
                "/positions",
                RequestOptions::new().with_body(json!({"ignored": true})),
            )
            .await
            .expect("request");

        assert_eq!(backend.requests()[0].body, None);
    }

    #[tokio::test]
    async fn test_var_query_and_http_error() {
        let backend = MockBackend::start().await;
        backend.respond_json(
            "/api/risk/var",
            500,
            json!({"detail": "VaR calculation failed"}),
        );

        let client = ApiClient::with_base_url(backend.api_url()).expect("client");
        let params = VarParams {
            method: VarMethod::Historical,
            alpha: 0.99,
            lookback: 250,
        };
        let err = client.risk_var(&params).await.expect_err("http error");

        match err {
            ClientError::Http { status, ref message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "VaR calculation failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_transport());

        let recorded = backend.requests();
        assert_eq!(
            recorded[0].query.as_deref(),
            Some("method=historical&alpha=0.99&lookback=250")
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_failure() {
        let backend = MockBackend::start().await;
        backend.respond_json(
            "/api/positions",
            401,
            json!({"detail": "Could not validate credentials"}),
        );

        let client = ApiClient::with_base_url(backend.api_url()).expect("client");
        let err = client.positions().await.expect_err("unauthorized");
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let backend = MockBackend::start().await;
        backend.respond_raw("/api/pnl/summary", 200, "not json");

        let client = ApiClient::with_base_url(backend.api_url()).expect("client");
        let err = client.pnl_summary().await.expect_err("parse error");
        assert!(matches!(err, ClientError::Parse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let addr = crate::testing::unused_addr().await;
        let client = ApiClient::with_base_url(format!("http://{}/api", addr)).expect("client");

        let err = client.positions().await.expect_err("refused");
        assert!(err.is_transport());
        assert!(err.is_retryable());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let client = ApiClient::with_base_url("http://localhost:8000/api").expect("client");
        let err = client
            .request(Method::PATCH, "/positions", RequestOptions::new())
            .await
            .expect_err("unsupported");
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
