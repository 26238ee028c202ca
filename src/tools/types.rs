//! Tool call/response types shared by every tool and the registry.

use serde::Serialize;
use serde_json::{Map, Value};

/// String-keyed argument map handed to a tool.
pub type ToolArgs = Map<String, Value>;

/// Machine-checkable classification of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// API key or client credentials not configured
    MissingCredentials,
    /// Call, or one of its sources, exceeded its deadline
    UpstreamTimeout,
    /// Upstream answered with a non-success HTTP status
    UpstreamHttp,
    /// Upstream answered 429
    RateLimited,
    /// Upstream body did not match the expected schema
    MalformedResponse,
    /// Arguments missing or of the wrong type
    InvalidArguments,
    /// No tool registered under the requested name
    UnknownTool,
    /// Tool exists but is outside the calling agent's capability set
    NotPermitted,
    /// Tool panicked or failed in an unexpected way
    Internal,
}

impl ToolErrorKind {
    /// Transient kinds are eligible for bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamTimeout | Self::RateLimited)
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MissingCredentials => "missing credentials",
            Self::UpstreamTimeout => "upstream timeout",
            Self::UpstreamHttp => "upstream HTTP error",
            Self::RateLimited => "rate limited",
            Self::MalformedResponse => "malformed upstream response",
            Self::InvalidArguments => "invalid arguments",
            Self::UnknownTool => "unknown tool",
            Self::NotPermitted => "tool not permitted",
            Self::Internal => "internal tool error",
        };
        f.write_str(text)
    }
}

/// Failure raised inside a tool implementation.
///
/// Never crosses the registry boundary: `ToolRegistry::invoke` turns it into
/// a [`ToolPayload::Error`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    /// HTTP status of the upstream response, when there was one
    pub status: Option<u16>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Upstream refused the caller's credentials (401 or 403).
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }

    pub fn missing_credentials(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::MissingCredentials, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::MalformedResponse, message)
    }

    pub fn upstream_http(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::UpstreamHttp, message)
    }
}

/// Normalized result of a tool call: either the tool's success body or an
/// explicit error body. Never empty.
///
/// Serializes as the success body itself, or as
/// `{"error": "<message>", "kind": "<kind>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Success(Value),
    Error {
        #[serde(rename = "error")]
        message: String,
        kind: ToolErrorKind,
    },
}

impl ToolPayload {
    pub fn error(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            Self::Success(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("unserializable tool payload: {}", e), "kind": "internal" })
        })
    }

    /// Text handed back to the model as the tool message.
    pub fn to_message(&self) -> String {
        self.to_value().to_string()
    }
}

impl From<ToolError> for ToolPayload {
    fn from(e: ToolError) -> Self {
        Self::error(e.kind, e.message)
    }
}

/// One executed tool call, as kept in an execution record.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: ToolArgs,
    pub payload: ToolPayload,
}

/// Read a required, non-empty string argument.
pub fn required_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    match args.get(key).and_then(Value::as_str).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ToolError::invalid_arguments(format!(
            "missing '{}' argument",
            key
        ))),
    }
}

/// Read an optional string argument.
pub fn optional_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read an optional count, accepting numbers or numeric strings, clamped to `1..=max`.
pub fn count_arg(args: &ToolArgs, key: &str, default: u64, max: u64) -> u64 {
    let raw = match args.get(key) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    raw.unwrap_or(default).clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn error_payload_shape() {
        let payload = ToolPayload::error(ToolErrorKind::UpstreamTimeout, "upstream timeout");
        assert_eq!(
            payload.to_value(),
            json!({"error": "upstream timeout", "kind": "upstream_timeout"})
        );
    }

    #[test]
    fn success_payload_is_the_body() {
        let body = json!({"results": [{"title": "a"}]});
        assert_eq!(ToolPayload::Success(body.clone()).to_value(), body);
    }

    #[test]
    fn argument_helpers() {
        let a = args(json!({"query": "  focus  ", "limit": "7", "blank": " "}));
        assert_eq!(required_str(&a, "query").unwrap(), "focus");
        assert!(required_str(&a, "blank").is_err());
        assert!(optional_str(&a, "blank").is_none());
        assert_eq!(count_arg(&a, "limit", 5, 10), 7);
        assert_eq!(count_arg(&a, "missing", 5, 10), 5);
        assert_eq!(count_arg(&args(json!({"limit": 500})), "limit", 5, 10), 10);
        assert_eq!(count_arg(&args(json!({"limit": 0})), "limit", 5, 10), 1);
    }

    #[test]
    fn transient_kinds() {
        assert!(ToolErrorKind::UpstreamTimeout.is_transient());
        assert!(ToolErrorKind::RateLimited.is_transient());
        assert!(!ToolErrorKind::MissingCredentials.is_transient());
        assert!(!ToolErrorKind::MalformedResponse.is_transient());
    }
}
