//! 远程知识图谱服务客户端
//!
//! POST `{endpoint}/tools/{operation}`，请求体 `{"arguments": {...}}`，响应体 `{"content": "..."}`。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GraphOperation, GraphQueryService};

#[derive(Debug, Deserialize)]
struct ToolResponse {
    content: String,
}

pub struct HttpGraphQueryService {
    client: Client,
    endpoint: String,
}

impl HttpGraphQueryService {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| format!("Build HTTP client: {}", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, operation: &GraphOperation) -> String {
        format!("{}/tools/{}", self.endpoint, operation.name())
    }
}

#[async_trait]
impl GraphQueryService for HttpGraphQueryService {
    async fn query(&self, operation: &GraphOperation) -> Result<String, String> {
        let url = self.url_for(operation);
        tracing::info!(operation = operation.name(), "knowledge graph query");

        let resp = self
            .client
            .post(&url)
            .json(&json!({ "arguments": operation.arguments() }))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: ToolResponse = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        Ok(body.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_strips_trailing_slash() {
        let svc = HttpGraphQueryService::new("http://kg.local:9000/", 5).unwrap();
        assert_eq!(
            svc.url_for(&GraphOperation::BlastRadius {
                link_id: "link-core-agg3".into()
            }),
            "http://kg.local:9000/tools/analyze_blast_radius"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let svc = HttpGraphQueryService::new("http://127.0.0.1:1", 2).unwrap();
        assert!(svc.query(&GraphOperation::NetworkHealth).await.is_err());
    }
}
