//! Web search tool backed by daedra (DuckDuckGo)

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_RESULTS: usize = 10;

/// The `web_search` tool the search agent calls
pub struct WebSearchTool {
    max_results: usize,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            max_results: DEFAULT_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Pull `query` and the result count out of the model's arguments
    fn parse_args(&self, args: &Value) -> Result<(String, usize)> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::Usage("Missing 'query' parameter".to_string()))?;

        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).clamp(1, self.max_results))
            .unwrap_or(self.max_results);

        Ok((query.to_string(), num_results))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return result titles, URLs and snippets"
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
                    "description": format!("Maximum number of results (default: {})", self.max_results)
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let (query, num_results) = self.parse_args(&args)?;
        tracing::debug!(%query, num_results, "Running web search");

        let search_args = daedra::SearchArgs {
            query: query.clone(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Capability(format!("web search failed: {}", e)))?;

        let results: Vec<Value> = response
            .data
            .iter()
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "description": r.description
                })
            })
            .collect();

        Ok(json!({
            "query": query,
            "results": results,
            "count": results.len()
        }))
    }
}
