//! Thin HTTP client over `flowfile-server`'s API (spec §6), grounded on
//! `aco::client::ClientConfig`'s server-url-plus-timeout shape, narrowed
//! to the stateless request/response calls this CLI needs — no token
//! storage or TLS configuration, since the façade doesn't require either.

use crate::error::{CliError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub struct FlowfileClient {
    base_url: String,
    http: reqwest::Client,
}

impl FlowfileClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builder failed");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn handle(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let detail = body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("no detail in response body")
            .to_string();
        Err(CliError::Server { status, detail })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| CliError::Request { url: url.clone(), source })?;
        let resp = Self::handle(resp).await?;
        Ok(resp.json().await.map_err(|source| CliError::Request { url, source })?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|source| CliError::Request { url: url.clone(), source })?;
        let resp = Self::handle(resp).await?;
        Ok(resp.json().await.map_err(|source| CliError::Request { url, source })?)
    }

    pub async fn create_flow(&self, name: &str) -> Result<Value> {
        self.post("/flow", &[], &serde_json::json!({ "name": name })).await
    }

    pub async fn get_flow(&self, flow_id: u64) -> Result<Value> {
        self.get("/flow", &[("flow_id", flow_id.to_string())]).await
    }

    pub async fn validate_flow(&self, flow_id: u64) -> Result<Value> {
        self.get("/flow/validate", &[("flow_id", flow_id.to_string())]).await
    }

    pub async fn node_kinds(&self) -> Result<Value> {
        self.get("/node_kinds", &[]).await
    }

    pub async fn add_node(&self, flow_id: u64, kind: &str, x: f64, y: f64) -> Result<Value> {
        self.post(
            "/editor/add_node",
            &[("flow_id", flow_id.to_string())],
            &serde_json::json!({ "kind": kind, "position": { "x": x, "y": y } }),
        )
        .await
    }

    pub async fn delete_node(&self, flow_id: u64, node_id: u64) -> Result<Value> {
        self.post(
            "/editor/delete_node",
            &[("flow_id", flow_id.to_string())],
            &serde_json::json!({ "node_id": node_id }),
        )
        .await
    }

    pub async fn update_settings(&self, flow_id: u64, node_id: u64, fields: Value) -> Result<Value> {
        self.post(
            "/update_settings",
            &[("flow_id", flow_id.to_string()), ("node_id", node_id.to_string())],
            &fields,
        )
        .await
    }

    pub async fn get_node(&self, flow_id: u64, node_id: u64) -> Result<Value> {
        self.get(
            "/node",
            &[("flow_id", flow_id.to_string()), ("node_id", node_id.to_string())],
        )
        .await
    }

    pub async fn get_node_data(&self, flow_id: u64, node_id: u64) -> Result<Value> {
        self.get(
            "/node/data",
            &[("flow_id", flow_id.to_string()), ("node_id", node_id.to_string())],
        )
        .await
    }

    pub async fn start_run(&self, flow_id: u64, mode: Option<&str>) -> Result<Value> {
        let mut query = vec![("flow_id", flow_id.to_string())];
        if let Some(mode) = mode {
            query.push(("mode", mode.to_string()));
        }
        self.post("/flow/run", &query, &Value::Null).await
    }

    pub async fn cancel_run(&self, flow_id: u64) -> Result<Value> {
        self.post("/flow/cancel", &[("flow_id", flow_id.to_string())], &Value::Null)
            .await
    }

    pub async fn run_status(
        &self,
        flow_id: u64,
        wait_for_change: Option<u64>,
        timeout_ms: Option<u64>,
    ) -> Result<Value> {
        let mut query = vec![("flow_id", flow_id.to_string())];
        if let Some(seq) = wait_for_change {
            query.push(("wait_for_change", seq.to_string()));
        }
        if let Some(ms) = timeout_ms {
            query.push(("timeout_ms", ms.to_string()));
        }
        self.get("/flow/run_status", &query).await
    }
}
