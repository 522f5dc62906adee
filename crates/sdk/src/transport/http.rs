//! HTTP transport layer shared by the GitHub and registry clients.

use crate::config::USER_AGENT;
use crate::error::{SdkError, SdkResult};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP transport for making API requests.
///
/// Requests are sent exactly once; failures are surfaced to the caller as-is.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new HTTP transport sending `default_headers` with every request.
    pub fn new(mut default_headers: header::HeaderMap, timeout: Option<Duration>) -> SdkResult<Self> {
        default_headers
            .entry(header::USER_AGENT)
            .or_insert(header::HeaderValue::from_static(USER_AGENT));

        let mut builder = Client::builder().default_headers(default_headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Start a GET request.
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request and return the response whatever its status.
    pub async fn send(&self, request: RequestBuilder) -> SdkResult<Response> {
        Ok(request.send().await?)
    }

    /// Send a request and turn non-success statuses into errors.
    pub async fn execute(&self, request: RequestBuilder) -> SdkResult<Response> {
        let response = self.send(request).await?;
        Self::check(response).await
    }

    /// Turn a non-success response into an error.
    pub async fn check(response: Response) -> SdkResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "Request failed");
        Err(SdkError::from_response(status, &headers, &body))
    }

    /// Execute a GET request and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> SdkResult<T> {
        debug!(url = %url, "GET request");

        let response = self.execute(self.get(url)).await?;
        let body = response.json().await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
    use serde::{Deserialize, Serialize};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
        value: i32,
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn test_get_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "success".to_string(),
                value: 42,
            }))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HeaderMap::new(), None).unwrap();

        let result: TestResponse = transport.get_json(url(&server, "/api/test")).await.unwrap();
        assert_eq!(result.message, "success");
        assert_eq!(result.value, 42);
    }

    #[tokio::test]
    async fn test_user_agent_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/agent"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "hello".to_string(),
                value: 1,
            }))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HeaderMap::new(), None).unwrap();

        let result: TestResponse = transport.get_json(url(&server, "/api/agent")).await.unwrap();
        assert_eq!(result.message, "hello");
    }

    #[tokio::test]
    async fn test_default_headers_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/protected"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(TestResponse {
                message: "authorized".to_string(),
                value: 100,
            }))
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer ghp_test"));
        let transport = HttpTransport::new(headers, None).unwrap();

        let result: TestResponse = transport
            .get_json(url(&server, "/api/protected"))
            .await
            .unwrap();
        assert_eq!(result.message, "authorized");
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HeaderMap::new(), None).unwrap();

        let result: SdkResult<TestResponse> = transport.get_json(url(&server, "/api/flaky")).await;
        match result {
            Err(SdkError::Api { status, .. }) => assert_eq!(status, 503),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_returns_error_statuses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(HeaderMap::new(), None).unwrap();

        let response = transport.send(transport.get(url(&server, "/v2/"))).await.unwrap();
        assert_eq!(response.status().as_u16(), 401);
    }
}
