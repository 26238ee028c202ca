//! Multi-source fan-out with per-source status.
//!
//! A tool that queries several named sources (subreddits, indexes) must not
//! lose the successful sources when one of them fails. [`gather`] runs every
//! source and [`aggregate`] folds the outcomes into one body:
//!
//! ```text
//! {
//!   "query": "...",
//!   "results": [ {..., "source": "a"}, {..., "source": "c"} ],
//!   "sources": [
//!     {"source": "a", "status": "ok", "count": 3},
//!     {"source": "b", "status": "error", "error": "...", "kind": "upstream_http"},
//!     {"source": "c", "status": "ok", "count": 1}
//!   ]
//! }
//! ```
//!
//! Only when every source fails is the whole call an error. Each source
//! runs under its own deadline, so one slow source is reported as
//! `upstream_timeout` while the others keep their results.

use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};

use super::{ToolError, ToolErrorKind};

/// Outcome of querying one named source.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub result: Result<Vec<Value>, ToolError>,
}

/// Share of a tool's call timeout that one stage (token exchange, or one
/// source) may use. Two stages stay inside the registry's bound.
pub fn stage_deadline(call_timeout: Duration) -> Duration {
    call_timeout * 2 / 5
}

/// Query every source concurrently, each bounded by `deadline`, and
/// aggregate the outcomes.
pub async fn gather<F, Fut>(
    query: &str,
    sources: &[String],
    deadline: Duration,
    fetch: F,
) -> Result<Value, ToolError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<Value>, ToolError>>,
{
    if sources.is_empty() {
        return Err(ToolError::invalid_arguments("no sources to query"));
    }

    let bounded = sources.iter().cloned().map(|source| {
        let pending = fetch(source);
        async move {
            tokio::time::timeout(deadline, pending).await.unwrap_or_else(|_| {
                Err(ToolError::new(
                    ToolErrorKind::UpstreamTimeout,
                    format!("upstream timeout after {:?}", deadline),
                ))
            })
        }
    });
    let results = futures::future::join_all(bounded).await;
    let outcomes = sources
        .iter()
        .cloned()
        .zip(results)
        .map(|(source, result)| SourceOutcome { source, result })
        .collect();

    aggregate(query, outcomes)
}

/// Fold per-source outcomes into a single success body.
pub fn aggregate(query: &str, outcomes: Vec<SourceOutcome>) -> Result<Value, ToolError> {
    let total = outcomes.len();
    let mut results = Vec::new();
    let mut statuses = Vec::with_capacity(total);
    let mut failures: Vec<(String, ToolError)> = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(items) => {
                statuses.push(json!({
                    "source": outcome.source,
                    "status": "ok",
                    "count": items.len(),
                }));
                results.extend(items.into_iter().map(|item| tag(item, &outcome.source)));
            }
            Err(e) => {
                tracing::warn!("Source '{}' failed: {}", outcome.source, e);
                statuses.push(json!({
                    "source": outcome.source,
                    "status": "error",
                    "error": e.message,
                    "kind": e.kind,
                }));
                failures.push((outcome.source, e));
            }
        }
    }

    if total > 0 && failures.len() == total {
        let kind = failures
            .first()
            .map(|(_, e)| e.kind)
            .unwrap_or(ToolErrorKind::UpstreamHttp);
        let detail = failures
            .iter()
            .map(|(source, e)| format!("{}: {}", source, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ToolError::new(
            kind,
            format!("all {} sources failed ({})", total, detail),
        ));
    }

    Ok(json!({
        "query": query,
        "results": results,
        "sources": statuses,
    }))
}

fn tag(mut item: Value, source: &str) -> Value {
    if let Value::Object(map) = &mut item {
        map.entry("source")
            .or_insert_with(|| Value::String(source.to_string()));
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(5);

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let body = gather("focus", &sources(&["ADHD", "broken", "Productivity"]), DEADLINE, |source| async move {
            if source == "broken" {
                Err(ToolError::upstream_http("upstream HTTP error (503)"))
            } else {
                Ok(vec![json!({"title": format!("{} post", source)})])
            }
        })
        .await
        .unwrap();

        let statuses = body["sources"].as_array().unwrap();
        assert_eq!(statuses.len(), 3);
        let ok: Vec<_> = statuses.iter().filter(|s| s["status"] == "ok").collect();
        let failed: Vec<_> = statuses.iter().filter(|s| s["status"] == "error").collect();
        assert_eq!(ok.len(), 2);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["source"], "broken");
        assert_eq!(failed[0]["kind"], "upstream_http");

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["source"], "ADHD");
        assert_eq!(results[1]["source"], "Productivity");
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let err = gather("focus", &sources(&["a", "b"]), DEADLINE, |_| async {
            Err(ToolError::new(ToolErrorKind::RateLimited, "429"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind, ToolErrorKind::RateLimited);
        assert!(err.message.contains("all 2 sources failed"));
    }

    #[tokio::test]
    async fn test_no_sources_is_invalid() {
        let err = gather("focus", &[], DEADLINE, |_| async { Ok(vec![]) }).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
    }

    #[tokio::test]
    async fn test_slow_source_times_out_alone() {
        let body = gather(
            "focus",
            &sources(&["a", "slow", "c"]),
            Duration::from_millis(50),
            |source| async move {
                if source == "slow" {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Ok(vec![json!({"title": format!("{} post", source)})])
            },
        )
        .await
        .unwrap();

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["source"], "a");
        assert_eq!(results[1]["source"], "c");

        let slow = &body["sources"][1];
        assert_eq!(slow["source"], "slow");
        assert_eq!(slow["status"], "error");
        assert_eq!(slow["kind"], "upstream_timeout");
    }

    #[test]
    fn test_two_stages_fit_in_the_call_timeout() {
        let call = Duration::from_secs(30);
        assert!(stage_deadline(call) * 2 < call);
    }

    #[test]
    fn test_existing_source_field_is_kept() {
        let body = aggregate(
            "q",
            vec![SourceOutcome {
                source: "a".into(),
                result: Ok(vec![json!({"source": "custom"}), json!("bare")]),
            }],
        )
        .unwrap();
        assert_eq!(body["results"][0]["source"], "custom");
        assert_eq!(body["results"][1], "bare");
    }
}
