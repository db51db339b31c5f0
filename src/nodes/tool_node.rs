//! 工具执行节点：执行最新 assistant 消息中的全部工具调用
//!
//! 调用并发执行，结果按请求顺序追加为 tool 消息；失败以 `Error: <原因>` 形式写入，不会中断会话。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::core::{NodeError, ToolError};
use crate::graph::{ConversationState, Node, StateDelta};
use crate::memory::{Message, Role};
use crate::tools::ToolExecutor;

pub struct ToolNode {
    executor: Arc<ToolExecutor>,
    /// 本业务域允许调用的工具
    allowed: Vec<String>,
}

impl ToolNode {
    pub fn new(executor: Arc<ToolExecutor>, allowed: &[&str]) -> Self {
        Self {
            executor,
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn run(&self, state: &ConversationState) -> Result<StateDelta, NodeError> {
        let pending = state
            .log()
            .last()
            .filter(|m| m.role == Role::Assistant && m.has_tool_calls())
            .ok_or_else(|| NodeError::InvalidState("no pending tool calls".to_string()))?;

        let runs = pending.tool_calls.iter().map(|call| async move {
            if !self.allowed.iter().any(|name| name == &call.name) {
                return Err(ToolError::NotPermitted(call.name.clone()));
            }
            self.executor.execute(&call.name, call.arguments.clone()).await
        });

        let messages = join_all(runs)
            .await
            .into_iter()
            .zip(&pending.tool_calls)
            .map(|(result, call)| match result {
                Ok(content) => Message::tool(content),
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                    Message::tool(format!("Error: {}", e))
                }
            })
            .collect::<Vec<_>>();

        Ok(StateDelta::new().messages(messages))
    }
}
