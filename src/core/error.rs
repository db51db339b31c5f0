//! 引擎错误分类
//!
//! 只有 InvalidInput / Configuration / NoProgress / NoResult 以及携带原因的节点错误会穿过会话入口；
//! 工具调用失败与反思判定失败在节点内部被吸收，写入消息日志。

use std::time::Duration;

use thiserror::Error;

use crate::graph::GraphError;

/// 会话入口返回的错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 图结构校验失败（启动期致命错误）
    #[error("Graph configuration error: {0}")]
    Configuration(#[from] GraphError),

    #[error("No progress after {max_steps} steps (last node: {last_node})")]
    NoProgress { max_steps: usize, last_node: String },

    #[error("Graph terminated without an assistant answer")]
    NoResult,

    /// 分类器出错不降级到兜底标签：无法判断意图时让调用方看到真实原因
    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: NodeError,
    },

    /// 条件边谓词产生了未声明的路由键
    #[error("Route key '{key}' produced by node '{node}' has no successor")]
    UnmappedRoute { node: String, key: String },

    /// 节点请求路由到未注册的目标
    #[error("Node '{node}' requested unknown route target '{target}'")]
    InvalidRoute { node: String, target: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// 节点处理失败（外部调用出错且该节点无法降级处理时）
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// 工具执行失败；由工具执行节点转为 tool 消息内容，不会中断会话
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool execution failed: {0}")]
    Failed(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),

    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Tool '{0}' is not available to this broker")]
    NotPermitted(String),
}
