//! 网络知识图谱查询
//!
//! 封闭的操作集合，每个操作返回一段简短、确定的文本答案（图谱负责推理，而不是把原始数据丢给 LLM）。
//! - **http**: 远程服务客户端（reqwest）
//! - **topology**: 进程内的种子拓扑

pub mod http;
pub mod topology;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use http::HttpGraphQueryService;
pub use topology::{Device, InMemoryTopology, Link, Service};

/// 知识图谱支持的查询操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOperation {
    /// 网络整体健康摘要
    NetworkHealth,
    /// 全量原始数据（JSON）
    NetworkHealthRaw,
    /// 服务到核心路由器的上游路径
    UpstreamPath { service_name: String },
    /// 某条链路故障时的影响范围
    BlastRadius { link_id: String },
    /// 服务的基础设施诊断
    DiagnoseService {
        service_name: String,
        issue_type: String,
    },
}

impl GraphOperation {
    /// 远程服务上的操作名
    pub fn name(&self) -> &'static str {
        match self {
            GraphOperation::NetworkHealth => "get_network_health",
            GraphOperation::NetworkHealthRaw => "get_network_health_raw",
            GraphOperation::UpstreamPath { .. } => "get_upstream_path",
            GraphOperation::BlastRadius { .. } => "analyze_blast_radius",
            GraphOperation::DiagnoseService { .. } => "diagnose_service",
        }
    }

    pub fn arguments(&self) -> Value {
        match self {
            GraphOperation::NetworkHealth | GraphOperation::NetworkHealthRaw => json!({}),
            GraphOperation::UpstreamPath { service_name } => json!({ "service_name": service_name }),
            GraphOperation::BlastRadius { link_id } => json!({ "link_id": link_id }),
            GraphOperation::DiagnoseService {
                service_name,
                issue_type,
            } => json!({ "service_name": service_name, "issue_type": issue_type }),
        }
    }
}

/// 图谱查询服务
#[async_trait]
pub trait GraphQueryService: Send + Sync {
    async fn query(&self, operation: &GraphOperation) -> Result<String, String>;
}
