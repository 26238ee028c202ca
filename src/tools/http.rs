//! Shared HTTP plumbing for the search tools.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use super::{ToolError, ToolErrorKind};

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

/// Build the client used by a tool.
pub(super) fn client(user_agent: &str, timeout: Duration) -> Client {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

/// Send `request` and decode a JSON body, classifying every failure.
pub(super) async fn send_json(request: RequestBuilder) -> Result<Value, ToolError> {
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ToolError::upstream_http(format!("failed to read body: {}", e.without_url()))
    })?;

    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| ToolError::malformed(format!("malformed upstream response: {}", e)))
}

/// Classify a send failure. The URL is stripped: query strings carry API keys.
fn transport_error(e: reqwest::Error) -> ToolError {
    if e.is_timeout() {
        ToolError::new(ToolErrorKind::UpstreamTimeout, "upstream timeout")
    } else {
        ToolError::upstream_http(format!("request failed: {}", e.without_url()))
    }
}

fn status_error(status: StatusCode, body: &str) -> ToolError {
    let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    let kind = if status == StatusCode::TOO_MANY_REQUESTS {
        ToolErrorKind::RateLimited
    } else {
        ToolErrorKind::UpstreamHttp
    };
    ToolError::new(kind, format!("upstream HTTP error ({}): {}", status, excerpt))
        .with_status(status.as_u16())
}

/// String field of a JSON object, `None` for missing or non-string values.
pub(super) fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.kind, ToolErrorKind::RateLimited);

        let err = status_error(StatusCode::BAD_GATEWAY, &"x".repeat(1000));
        assert_eq!(err.kind, ToolErrorKind::UpstreamHttp);
        assert!(err.message.starts_with("upstream HTTP error (502 Bad Gateway)"));
        assert!(err.message.len() < 400);
        assert_eq!(err.status, Some(502));
        assert!(!err.is_auth_rejection());

        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_auth_rejection());
        assert!(status_error(StatusCode::FORBIDDEN, "").is_auth_rejection());
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_query_string() {
        // nothing listens on port 9 of the loopback interface
        let request = Client::builder()
            .no_proxy()
            .build()
            .unwrap()
            .get("http://127.0.0.1:9/search.json?q=focus&api_key=secret-key-123")
            .timeout(Duration::from_secs(5));
        let err = send_json(request).await.unwrap_err();

        assert!(!err.message.contains("api_key"), "{}", err.message);
        assert!(!err.message.contains("secret-key-123"), "{}", err.message);
        assert!(err.status.is_none());
    }
}
