use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client_types::{ChatCompletionRequest, ChatCompletionResponse};
use super::types::ChatClient;
use super::DiagnosisError;
use crate::config::ApiConfig;

/// HTTP verbs the API client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
        }
    }
}

/// Generic JSON-over-HTTP executor bound to one base URL.
///
/// The underlying blocking client is built on first use so that the
/// struct itself can be created (and dropped) from async code.
pub struct ApiClient {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    client: OnceLock<reqwest::blocking::Client>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout_secs,
            client: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join base URL and endpoint with exactly one `/`.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn http(&self) -> Result<&reqwest::blocking::Client, DiagnosisError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| DiagnosisError::HttpClient(e.to_string()))?;
        Ok(self.client.get_or_init(|| built))
    }

    /// Send a request and decode the JSON response into `R`.
    ///
    /// Every failure (connect, timeout, non-2xx, decode) comes back as an
    /// `Err`; nothing panics past this boundary.
    pub fn send<B, R>(
        &self,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&B>,
    ) -> Result<R, DiagnosisError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url_for(endpoint);
        let mut request = self.http()?.request(method.as_reqwest(), &url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                DiagnosisError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                DiagnosisError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                DiagnosisError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DiagnosisError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| DiagnosisError::ResponseParsing(e.to_string()))
    }
}

/// Chat-completion client for the hosted model.
pub struct ChatCompletionClient {
    api: ApiClient,
    endpoint: String,
}

impl ChatCompletionClient {
    pub fn new(api: ApiClient, endpoint: &str) -> Self {
        Self {
            api,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        let api = ApiClient::new(
            &config.base_url,
            Some(config.api_key.clone()),
            config.timeout_secs,
        );
        Self::new(api, &config.endpoint)
    }

    pub fn endpoint_url(&self) -> String {
        self.api.url_for(&self.endpoint)
    }
}

impl ChatClient for ChatCompletionClient {
    fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, DiagnosisError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Chat completion request"
        );
        let response: ChatCompletionResponse =
            self.api
                .send(&self.endpoint, HttpMethod::Post, Some(request))?;
        if let Some(usage) = &response.usage {
            tracing::debug!(total_tokens = usage.total_tokens, "Chat completion done");
        }
        Ok(response)
    }
}

/// Mock chat client for testing: replays scripted replies in order and
/// records every request it receives.
pub struct MockChatClient {
    replies: Mutex<VecDeque<Result<ChatCompletionResponse, DiagnosisError>>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    delay: Option<Duration>,
}

impl MockChatClient {
    /// One successful reply per string, consumed in order.
    pub fn with_contents(contents: &[&str]) -> Self {
        Self {
            replies: Mutex::new(
                contents
                    .iter()
                    .map(|c| Ok(ChatCompletionResponse::from_content(c)))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue a failure after the replies already scripted.
    pub fn then_error(self, error: DiagnosisError) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
        self
    }

    /// Sleep before answering (simulates a slow network).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ChatClient for MockChatClient {
    fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, DiagnosisError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(DiagnosisError::HttpClient("No scripted reply".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SendMessage;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new("m", vec![SendMessage::user("hi")])
    }

    #[test]
    fn mock_replays_in_order_then_errors() {
        let client = MockChatClient::with_contents(&["one", "two"]);
        assert_eq!(client.complete(&request()).unwrap().first_content().unwrap(), "one");
        assert_eq!(client.complete(&request()).unwrap().first_content().unwrap(), "two");
        assert!(client.complete(&request()).is_err());
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn mock_scripted_error() {
        let client = MockChatClient::with_contents(&[])
            .then_error(DiagnosisError::ApiError { status: 503, body: "busy".into() });
        match client.complete(&request()) {
            Err(DiagnosisError::ApiError { status, .. }) => assert_eq!(status, 503),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mock_records_requests() {
        let client = MockChatClient::with_contents(&["ok"]);
        client.complete(&request()).unwrap();
        let seen = client.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages[0].content, "hi");
    }

    #[test]
    fn api_client_trims_trailing_slash() {
        let client = ApiClient::new("https://ark.cn-beijing.volces.com/", None, 60);
        assert_eq!(client.base_url(), "https://ark.cn-beijing.volces.com");
    }

    #[test]
    fn url_join_has_single_slash() {
        let client = ApiClient::new("http://localhost:8080/", None, 60);
        assert_eq!(
            client.url_for("/api/v3/chat/completions"),
            "http://localhost:8080/api/v3/chat/completions"
        );
        assert_eq!(client.url_for("v1/models"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn empty_api_key_is_dropped() {
        let client = ApiClient::new("http://localhost:8080", Some(String::new()), 60);
        assert!(client.api_key.is_none());
    }

    #[test]
    fn unreachable_host_is_transport_error() {
        // Port 9 (discard) on loopback is closed on test machines.
        let client = ApiClient::new("http://127.0.0.1:9", None, 2);
        let result: Result<serde_json::Value, _> =
            client.send::<(), _>("/ping", HttpMethod::Get, None);
        let err = result.unwrap_err();
        assert_eq!(err.category(), super::super::ErrorCategory::Transport);
    }

    #[test]
    fn chat_client_from_config_builds_endpoint() {
        let config = ApiConfig {
            base_url: "http://localhost:8080".into(),
            endpoint: "/api/v3/chat/completions".into(),
            api_key: "k".into(),
            model: "m".into(),
            timeout_secs: 5,
            daily_release_limit: 5,
        };
        let client = ChatCompletionClient::from_config(&config);
        assert_eq!(
            client.endpoint_url(),
            "http://localhost:8080/api/v3/chat/completions"
        );
    }
}
