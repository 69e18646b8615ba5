//! GraphQL search client

use super::client::SearchClient;
use super::query::{SearchInput, SearchResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const SEARCH_QUERY: &str = "query searchResultItemsAndRelatedItems($input: [SearchInput]) {
  searchResult: search(input: $input) {
    items
    related {
      kind
      items
    }
  }
}";

/// Search client for a GraphQL search service
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: String,
    token_env: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitedInput<'a> {
    #[serde(flatten)]
    input: &'a SearchInput,
    limit: usize,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<SearchData>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    #[serde(default)]
    search_result: Vec<Option<SearchResult>>,
}

impl HttpSearchClient {
    /// Create a new search client
    pub fn new(endpoint: &str, token_env: Option<String>, timeout: Duration) -> Result<Self> {
        url::Url::parse(endpoint)
            .with_context(|| format!("Invalid search endpoint: {}", endpoint))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        tracing::debug!("Created search client for: {}", endpoint);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token_env,
        })
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let Some(var_name) = &self.token_env else {
            return Ok(req);
        };
        let token = std::env::var(var_name).with_context(|| {
            format!("Environment variable {} not set (required for auth)", var_name)
        })?;
        Ok(req.bearer_auth(token))
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, inputs: &[SearchInput], limit: usize) -> Result<Vec<SearchResult>> {
        let input: Vec<LimitedInput<'_>> = inputs
            .iter()
            .map(|input| LimitedInput { input, limit })
            .collect();
        let body = serde_json::json!({
            "operationName": "searchResultItemsAndRelatedItems",
            "query": SEARCH_QUERY,
            "variables": { "input": input },
        });

        tracing::debug!("Sending {} search inputs to {}", inputs.len(), self.endpoint);

        let req = self.apply_auth(self.client.post(&self.endpoint).json(&body))?;
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to query search: {}", self.endpoint))?;

        if !resp.status().is_success() {
            anyhow::bail!(
                "Search request failed: {} (status: {})",
                self.endpoint,
                resp.status()
            );
        }

        let parsed: GraphQlResponse = resp
            .json()
            .await
            .context("Failed to parse search response")?;

        if let Some(first) = parsed.errors.first() {
            anyhow::bail!("Search returned errors: {}", first);
        }

        let data = parsed.data.context("Search response carried no data")?;
        let mut results: Vec<SearchResult> = data
            .search_result
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        results.resize_with(inputs.len(), SearchResult::default);
        Ok(results)
    }

    fn client_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::convert_string_to_query;

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(HttpSearchClient::new("not a url", None, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_limit_is_flattened_into_input() {
        let input = convert_string_to_query("kind:pod");
        let limited = LimitedInput {
            input: &input,
            limit: 1000,
        };
        let value = serde_json::to_value(&limited).unwrap();
        assert_eq!(value["limit"], 1000);
        assert_eq!(value["filters"][0]["property"], "kind");
        assert!(value["relatedKinds"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_parses_null_result_entries() {
        let raw = serde_json::json!({
            "data": {"searchResult": [null, {"items": [{"kind": "Pod"}], "related": null}]}
        });
        let parsed: GraphQlResponse = serde_json::from_value(raw).unwrap();
        let data = parsed.data.unwrap();
        assert!(data.search_result[0].is_none());
        assert_eq!(data.search_result[1].as_ref().unwrap().items.len(), 1);
    }
}
