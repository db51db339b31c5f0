//! 网络诊断工具
//!
//! 每个工具对应知识图谱的一个查询操作，图谱返回精确答案，工具原样转交给 broker。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ServiceHandles;
use crate::knowledge::GraphOperation;
use crate::tools::schema::args_schema;
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ServiceArgs {
    /// 服务名，如 postgresql_orders
    pub service_name: String,
    /// 问题类型：timeout、connectivity、performance
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
}

fn default_issue_type() -> String {
    "timeout".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LinkArgs {
    /// 链路 id，如 link-core-agg3
    pub link_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PathArgs {
    /// 要追踪的服务名
    pub service_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkToolKind {
    DiagnoseInfrastructure,
    BlastRadius,
    TracePath,
    Health,
    HealthRaw,
}

impl NetworkToolKind {
    pub const ALL: [NetworkToolKind; 5] = [
        NetworkToolKind::DiagnoseInfrastructure,
        NetworkToolKind::BlastRadius,
        NetworkToolKind::TracePath,
        NetworkToolKind::Health,
        NetworkToolKind::HealthRaw,
    ];
}

/// 知识图谱支撑的诊断工具
pub struct NetworkTool {
    kind: NetworkToolKind,
    handles: Arc<ServiceHandles>,
}

impl NetworkTool {
    pub fn new(kind: NetworkToolKind, handles: Arc<ServiceHandles>) -> Self {
        Self { kind, handles }
    }

    pub fn all(handles: Arc<ServiceHandles>) -> Vec<NetworkTool> {
        NetworkToolKind::ALL
            .into_iter()
            .map(|kind| NetworkTool::new(kind, handles.clone()))
            .collect()
    }

    fn operation(&self, args: Value) -> Result<GraphOperation, String> {
        let invalid = |e: serde_json::Error| format!("Invalid arguments: {}", e);
        let op = match self.kind {
            NetworkToolKind::DiagnoseInfrastructure => {
                let a: ServiceArgs = serde_json::from_value(args).map_err(invalid)?;
                GraphOperation::DiagnoseService {
                    service_name: a.service_name,
                    issue_type: a.issue_type,
                }
            }
            NetworkToolKind::BlastRadius => {
                let a: LinkArgs = serde_json::from_value(args).map_err(invalid)?;
                GraphOperation::BlastRadius { link_id: a.link_id }
            }
            NetworkToolKind::TracePath => {
                let a: PathArgs = serde_json::from_value(args).map_err(invalid)?;
                GraphOperation::UpstreamPath {
                    service_name: a.service_name,
                }
            }
            NetworkToolKind::Health => GraphOperation::NetworkHealth,
            NetworkToolKind::HealthRaw => GraphOperation::NetworkHealthRaw,
        };
        Ok(op)
    }
}

#[async_trait]
impl Tool for NetworkTool {
    fn name(&self) -> &str {
        match self.kind {
            NetworkToolKind::DiagnoseInfrastructure => "diagnose_infrastructure",
            NetworkToolKind::BlastRadius => "analyze_network_blast_radius",
            NetworkToolKind::TracePath => "trace_network_path",
            NetworkToolKind::Health => "get_network_health",
            NetworkToolKind::HealthRaw => "get_network_health_raw",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            NetworkToolKind::DiagnoseInfrastructure => {
                "Diagnose infrastructure issues along the network path of a service."
            }
            NetworkToolKind::BlastRadius => "Analyze which devices and services are affected if a link fails.",
            NetworkToolKind::TracePath => "Trace the network path from a service up to the core router.",
            NetworkToolKind::Health => "Get a precise network health summary. Prefer this over the raw dump.",
            NetworkToolKind::HealthRaw => "Get ALL raw network data as JSON. Expensive; use only when asked for raw data.",
        }
    }

    fn parameters_schema(&self) -> Value {
        match self.kind {
            NetworkToolKind::DiagnoseInfrastructure => args_schema::<ServiceArgs>(),
            NetworkToolKind::BlastRadius => args_schema::<LinkArgs>(),
            NetworkToolKind::TracePath => args_schema::<PathArgs>(),
            NetworkToolKind::Health | NetworkToolKind::HealthRaw => serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let operation = self.operation(args)?;
        let knowledge = self.handles.knowledge().await?;
        knowledge.query(&operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::knowledge::InMemoryTopology;
    use crate::llm::MockLlmClient;

    fn handles() -> Arc<ServiceHandles> {
        Arc::new(ServiceHandles::with_instances(
            Arc::new(MockLlmClient),
            Arc::new(InMemoryTopology::seeded()),
        ))
    }

    #[tokio::test]
    async fn test_trace_path_via_knowledge_graph() {
        let tool = NetworkTool::new(NetworkToolKind::TracePath, handles());
        assert_eq!(tool.name(), "trace_network_path");
        let out = tool
            .execute(json!({"service_name": "weather_service"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            "weather_service → mcp-server-1 → dist-switch-2 → agg-switch-2 → core-router-1"
        );
    }

    #[tokio::test]
    async fn test_diagnose_defaults_issue_type() {
        let tool = NetworkTool::new(NetworkToolKind::DiagnoseInfrastructure, handles());
        let out = tool
            .execute(json!({"service_name": "vietnam_farm_agent"}))
            .await
            .unwrap();
        assert!(out.contains("ISSUES FOUND"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_error() {
        let tool = NetworkTool::new(NetworkToolKind::BlastRadius, handles());
        assert!(tool.execute(json!({})).await.unwrap_err().starts_with("Invalid arguments"));
    }

    #[test]
    fn test_all_tools_have_distinct_names() {
        let tools = NetworkTool::all(handles());
        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }
}
