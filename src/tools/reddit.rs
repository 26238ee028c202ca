//! Reddit search over several subreddits, one fan-out source per subreddit.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::fanout;
use super::http::{self, str_field};
use super::{count_arg, optional_str, required_str, Tool, ToolArgs, ToolError, ToolErrorKind};
use crate::config::{RedditCredentials, ToolsConfig};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const DEFAULT_SUBREDDITS: &str = "ADHD+Productivity";

/// Search Reddit for lived-experience discussions.
pub struct RedditSearch {
    credentials: RedditCredentials,
    client: Client,
    /// Bound on the token exchange and on each subreddit search
    stage_timeout: Duration,
}

impl RedditSearch {
    pub fn new(config: &ToolsConfig) -> Self {
        let stage_timeout = fanout::stage_deadline(config.timeout);
        Self {
            credentials: config.reddit.clone(),
            client: http::client(&config.reddit.user_agent, stage_timeout),
            stage_timeout,
        }
    }

    /// Application-only OAuth token (client credentials grant).
    async fn access_token(&self, client_id: &str, client_secret: &str) -> Result<String, ToolError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .finish();

        let body = http::send_json(
            self.client
                .post(TOKEN_URL)
                .basic_auth(client_id, Some(client_secret))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(form),
        )
        .await
        .map_err(token_error)?;

        str_field(&body, "access_token")
            .ok_or_else(|| ToolError::malformed("Reddit token response has no access_token"))
    }

    async fn search_subreddit(
        &self,
        token: &str,
        subreddit: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<Value>, ToolError> {
        let url = search_url(subreddit, query, limit)?;
        let body = http::send_json(self.client.get(url).bearer_auth(token)).await?;
        parse_listing(&body, subreddit)
    }
}

#[async_trait]
impl Tool for RedditSearch {
    fn name(&self) -> &str {
        "reddit_search"
    }

    fn description(&self) -> &str {
        "Search Reddit posts for practical, lived-experience discussions. Returns a list of {subreddit, title, url, score, num_comments} plus per-subreddit status."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "subreddits": {
                    "type": "string",
                    "description": "Subreddits separated by '+' or ',' (default: ADHD+Productivity)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Posts per subreddit (default: 5, max: 25)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let (client_id, client_secret) = self
            .credentials
            .pair()
            .ok_or_else(|| ToolError::missing_credentials("Reddit credentials missing"))?;
        let query = required_str(args, "query")?;
        let limit = count_arg(args, "limit", 5, 25);
        let subreddits = parse_subreddits(optional_str(args, "subreddits").unwrap_or(DEFAULT_SUBREDDITS));
        if subreddits.is_empty() {
            return Err(ToolError::invalid_arguments("no subreddits given"));
        }

        let token = self.access_token(client_id, client_secret).await?;
        tracing::debug!(
            "reddit_search: query='{}' subreddits={:?} limit={}",
            query,
            subreddits,
            limit
        );

        fanout::gather(query, &subreddits, self.stage_timeout, |subreddit| {
            let token = token.as_str();
            async move { self.search_subreddit(token, &subreddit, query, limit).await }
        })
        .await
    }
}

/// Only a 401/403 from the token endpoint means the credentials are wrong;
/// outages and rate limits keep their own kind.
fn token_error(e: ToolError) -> ToolError {
    if e.is_auth_rejection() {
        ToolError::missing_credentials(format!("Reddit rejected the credentials: {}", e.message))
    } else {
        e
    }
}

/// Split `"ADHD+Productivity, adhdwomen"` into subreddit names.
fn parse_subreddits(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(|c: char| c == '+' || c == ',') {
        let name = name.trim().trim_start_matches("r/");
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

fn search_url(subreddit: &str, query: &str, limit: u64) -> Result<Url, ToolError> {
    let mut url = Url::parse(API_BASE)
        .map_err(|e| ToolError::new(ToolErrorKind::Internal, e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ToolError::new(ToolErrorKind::Internal, "base URL cannot take a path"))?
        .extend(["r", subreddit, "search"]);
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("restrict_sr", "1")
        .append_pair("sort", "relevance")
        .append_pair("t", "year")
        .append_pair("limit", &limit.to_string());
    Ok(url)
}

/// Extract posts from a Reddit listing.
fn parse_listing(body: &Value, subreddit: &str) -> Result<Vec<Value>, ToolError> {
    let children = body
        .pointer("/data/children")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::malformed("Reddit listing has no data.children"))?;

    Ok(children
        .iter()
        .filter_map(|child| child.get("data"))
        .map(|post| {
            let url = str_field(post, "permalink")
                .map(|permalink| format!("https://www.reddit.com{}", permalink));
            json!({
                "subreddit": subreddit,
                "title": str_field(post, "title"),
                "url": url,
                "score": post.get("score").and_then(Value::as_i64),
                "num_comments": post.get("num_comments").and_then(Value::as_u64),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subreddit_lists() {
        assert_eq!(parse_subreddits("ADHD+Productivity"), vec!["ADHD", "Productivity"]);
        assert_eq!(
            parse_subreddits(" r/adhd , GetStudying+adhd+ "),
            vec!["adhd", "GetStudying"]
        );
        assert!(parse_subreddits(" + , ").is_empty());
    }

    #[test]
    fn search_url_is_scoped_to_the_subreddit() {
        let url = search_url("ADHD", "time blindness", 5).unwrap();
        assert_eq!(url.path(), "/r/ADHD/search");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("q".to_string(), "time blindness".to_string())));
        assert!(query.contains(&("restrict_sr".to_string(), "1".to_string())));
        assert!(query.contains(&("limit".to_string(), "5".to_string())));
    }

    #[test]
    fn parses_listing() {
        let body = json!({
            "data": {"children": [
                {"kind": "t3", "data": {
                    "title": "Body doubling works",
                    "permalink": "/r/ADHD/comments/abc/body_doubling/",
                    "score": 420,
                    "num_comments": 37
                }}
            ]}
        });
        let posts = parse_listing(&body, "ADHD").unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0]["url"],
            "https://www.reddit.com/r/ADHD/comments/abc/body_doubling/"
        );
        assert_eq!(posts[0]["score"], 420);

        assert_eq!(
            parse_listing(&json!({"error": 403}), "ADHD").unwrap_err().kind,
            ToolErrorKind::MalformedResponse
        );
    }

    #[test]
    fn token_errors_keep_outages_apart_from_bad_credentials() {
        let rejected = ToolError::upstream_http("upstream HTTP error (401 Unauthorized)").with_status(401);
        assert_eq!(token_error(rejected).kind, ToolErrorKind::MissingCredentials);

        let forbidden = ToolError::upstream_http("upstream HTTP error (403 Forbidden)").with_status(403);
        assert_eq!(token_error(forbidden).kind, ToolErrorKind::MissingCredentials);

        let outage = ToolError::upstream_http("upstream HTTP error (503)").with_status(503);
        assert_eq!(token_error(outage).kind, ToolErrorKind::UpstreamHttp);

        let refused = ToolError::upstream_http("request failed: connection refused");
        assert_eq!(token_error(refused).kind, ToolErrorKind::UpstreamHttp);

        let limited = ToolError::new(ToolErrorKind::RateLimited, "429").with_status(429);
        assert_eq!(token_error(limited).kind, ToolErrorKind::RateLimited);
    }

    #[test]
    fn stages_are_bounded_below_the_call_timeout() {
        let config = ToolsConfig {
            timeout: Duration::from_secs(10),
            ..ToolsConfig::default()
        };
        let tool = RedditSearch::new(&config);
        assert_eq!(tool.stage_timeout, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_credentials_are_reported() {
        let tool = RedditSearch::new(&ToolsConfig::default());
        let args = json!({"query": "focus"}).as_object().cloned().unwrap();
        let err = tool.call(&args).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::MissingCredentials);
        assert_eq!(err.message, "Reddit credentials missing");
    }
}
