//! Web search through SerpAPI's Google engine.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::http::{self, str_field};
use super::{count_arg, required_str, Tool, ToolArgs, ToolError};
use crate::config::ToolsConfig;

const SERPAPI_URL: &str = "https://serpapi.com/search";

/// Search the web for relevant links.
pub struct WebSearch {
    api_key: Option<String>,
    client: Client,
}

impl WebSearch {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            api_key: config.serpapi_key.clone(),
            client: http::client("crewline/0.1", config.timeout),
        }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current articles and guides on a topic. Returns a list of {title, url, snippet}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5, max: 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::missing_credentials("SERPAPI_KEY missing"))?;
        let query = required_str(args, "query")?;
        let num_results = count_arg(args, "num_results", 5, 10);

        let num = num_results.to_string();
        let url = Url::parse_with_params(
            SERPAPI_URL,
            &[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("api_key", api_key),
            ],
        )
        .map_err(|e| ToolError::invalid_arguments(format!("cannot build search URL: {}", e)))?;

        tracing::debug!("web_search: query='{}' num={}", query, num_results);
        let body = http::send_json(self.client.get(url)).await?;
        let results = parse_organic_results(&body, num_results as usize)?;

        Ok(json!({ "query": query, "results": results }))
    }
}

/// Extract `{title, url, snippet}` items from a SerpAPI body.
fn parse_organic_results(body: &Value, limit: usize) -> Result<Vec<Value>, ToolError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        // SerpAPI reports an empty result page as an error string
        if error.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(ToolError::upstream_http(format!("SerpAPI error: {}", error)));
    }

    let organic = match body.get("organic_results") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ToolError::malformed("organic_results is not a list")),
    };

    Ok(organic
        .iter()
        .take(limit)
        .map(|item| {
            json!({
                "title": str_field(item, "title"),
                "url": str_field(item, "link"),
                "snippet": str_field(item, "snippet"),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolErrorKind;

    #[test]
    fn parses_organic_results() {
        let body = json!({
            "organic_results": [
                {"title": "Deep work", "link": "https://a.example", "snippet": "Focus blocks"},
                {"title": "Pomodoro", "link": "https://b.example"},
                {"title": "Third", "link": "https://c.example", "snippet": "cut"}
            ]
        });
        let results = parse_organic_results(&body, 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["url"], "https://a.example");
        assert_eq!(results[1]["snippet"], Value::Null);
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let body = json!({"error": "Google hasn't returned any results for this query."});
        assert!(parse_organic_results(&body, 5).unwrap().is_empty());
        assert!(parse_organic_results(&json!({}), 5).unwrap().is_empty());
    }

    #[test]
    fn api_errors_and_bad_shapes() {
        let err = parse_organic_results(&json!({"error": "Invalid API key."}), 5).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::UpstreamHttp);

        let err = parse_organic_results(&json!({"organic_results": "nope"}), 5).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let tool = WebSearch::new(&ToolsConfig::default());
        let args = json!({"query": "focus"}).as_object().cloned().unwrap();
        let err = tool.call(&args).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::MissingCredentials);
        assert_eq!(err.message, "SERPAPI_KEY missing");
    }
}
