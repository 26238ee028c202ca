//! Scholarly search through the OpenAlex works API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::http::{self, str_field};
use super::{count_arg, required_str, Tool, ToolArgs, ToolError};
use crate::config::ToolsConfig;

const OPENALEX_WORKS_URL: &str = "https://api.openalex.org/works";

/// Search OpenAlex for studies and papers.
pub struct ScholarSearch {
    mailto: String,
    client: Client,
}

impl ScholarSearch {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            mailto: config.openalex_mailto.clone(),
            client: http::client("crewline/0.1", config.timeout),
        }
    }
}

#[async_trait]
impl Tool for ScholarSearch {
    fn name(&self) -> &str {
        "scholar_search"
    }

    fn description(&self) -> &str {
        "Search OpenAlex for scholarly works (studies, reviews, papers). Returns a list of {title, year, doi, open_access, url}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search terms for the works index"
                },
                "per_page": {
                    "type": "integer",
                    "description": "Number of works to return (default: 5, max: 25)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let query = required_str(args, "query")?;
        let per_page = count_arg(args, "per_page", 5, 25);

        let per_page_param = per_page.to_string();
        let url = Url::parse_with_params(
            OPENALEX_WORKS_URL,
            &[
                ("search", query),
                ("per_page", per_page_param.as_str()),
                ("mailto", self.mailto.as_str()),
            ],
        )
        .map_err(|e| ToolError::invalid_arguments(format!("cannot build search URL: {}", e)))?;

        tracing::debug!("scholar_search: query='{}' per_page={}", query, per_page);
        let body = http::send_json(self.client.get(url)).await?;
        let results = parse_works(&body, per_page as usize)?;

        Ok(json!({ "query": query, "results": results }))
    }
}

/// Extract `{title, year, doi, open_access, url}` from an OpenAlex page.
///
/// `url` prefers the open-access copy, then the landing page, then the
/// OpenAlex id.
fn parse_works(body: &Value, limit: usize) -> Result<Vec<Value>, ToolError> {
    let works = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::malformed("OpenAlex response has no results list"))?;

    Ok(works
        .iter()
        .take(limit)
        .map(|work| {
            let open_access = work.get("open_access").unwrap_or(&Value::Null);
            let landing_page = work
                .get("primary_location")
                .and_then(|loc| str_field(loc, "landing_page_url"));
            let url = str_field(open_access, "oa_url")
                .or(landing_page)
                .or_else(|| str_field(work, "id"));

            json!({
                "title": str_field(work, "display_name"),
                "year": work.get("publication_year").and_then(Value::as_i64),
                "doi": str_field(work, "doi"),
                "open_access": open_access.get("is_oa").and_then(Value::as_bool),
                "url": url,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolErrorKind;

    #[test]
    fn parses_works_and_prefers_open_access_url() {
        let body = json!({
            "results": [
                {
                    "id": "https://openalex.org/W1",
                    "display_name": "Working memory training",
                    "publication_year": 2021,
                    "doi": "https://doi.org/10.1/abc",
                    "open_access": {"is_oa": true, "oa_url": "https://oa.example/w1.pdf"}
                },
                {
                    "id": "https://openalex.org/W2",
                    "display_name": "Time blindness",
                    "publication_year": 2019,
                    "open_access": {"is_oa": false, "oa_url": null},
                    "primary_location": {"landing_page_url": "https://journal.example/w2"}
                },
                {
                    "id": "https://openalex.org/W3",
                    "display_name": "No links"
                }
            ]
        });

        let works = parse_works(&body, 5).unwrap();
        assert_eq!(works.len(), 3);
        assert_eq!(works[0]["url"], "https://oa.example/w1.pdf");
        assert_eq!(works[0]["year"], 2021);
        assert_eq!(works[0]["open_access"], true);
        assert_eq!(works[1]["url"], "https://journal.example/w2");
        assert_eq!(works[1]["doi"], Value::Null);
        assert_eq!(works[2]["url"], "https://openalex.org/W3");
    }

    #[test]
    fn missing_results_is_malformed() {
        let err = parse_works(&json!({"meta": {}}), 5).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::MalformedResponse);
    }
}
