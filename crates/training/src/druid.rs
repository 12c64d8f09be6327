// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`DruidQueryClient`]: a [`QueryEngine`] that POSTs a fixed query
//! template to a Druid endpoint, parameterized per request with the
//! model's filter, the requested granularity, and the time interval. The
//! template shape (a `filter`, a `granularity.period`/`granularity.origin`
//! pair, and an `intervals` array of `"{start}/{end}"` strings) mirrors
//! the original's `QueryBuilder.modify_filter` / `set_time_origin` /
//! `set_time_interval` / `modify_granularity`.

use crate::error::QueryError;
use crate::ports::{QueryEngine, QueryRequest, QueryResponse};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Issues queries against a Druid broker's native JSON query endpoint.
pub struct DruidQueryClient {
    http: reqwest::Client,
    endpoint: String,
    base_query: Value,
}

impl DruidQueryClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), endpoint: endpoint.into(), base_query: default_base_query() }
    }

    /// Override the base query template (e.g. to carry custom
    /// aggregations/postAggregations); `query` still parameterizes filter,
    /// granularity, and interval on top of it.
    pub fn with_base_query(mut self, base_query: Value) -> Self {
        self.base_query = base_query;
        self
    }

    fn build_query(&self, request: &QueryRequest) -> Value {
        let mut query = self.base_query.clone();
        query["filter"] = json!({
            "type": "selector",
            "dimension": "model",
            "value": request.model,
        });
        query["granularity"]["period"] = json!(request.granularity.iso8601());
        query["granularity"]["origin"] = json!(request.end.to_rfc3339());
        query["intervals"] = json!([format!("{}/{}", request.start.to_rfc3339(), request.end.to_rfc3339())]);
        query
    }
}

fn default_base_query() -> Value {
    json!({
        "queryType": "timeseries",
        "dataSource": "traffic",
        "granularity": { "type": "period", "period": "PT1M", "origin": null },
        "intervals": [],
        "filter": null,
        "aggregations": [],
        "postAggregations": [],
    })
}

#[async_trait]
impl QueryEngine for DruidQueryClient {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
        let body = self.build_query(request);
        let resp = self
            .http
            .post(format!("{}/druid/v2/", self.endpoint.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(QueryError::Transport(format!("druid returned status {}", resp.status())));
        }
        let value: Value = resp.json().await.map_err(|e| QueryError::Protocol(e.to_string()))?;
        Ok(QueryResponse(value))
    }
}

#[cfg(test)]
#[path = "druid_tests.rs"]
mod tests;
