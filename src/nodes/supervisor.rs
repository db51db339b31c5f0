//! 入口节点：意图分类与路由
//!
//! 把最新一条用户消息交给分类器，输出在封闭标签集中匹配（忽略大小写，包含即可），
//! 未识别或空输出路由到兜底节点；分类器本身出错则节点失败。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{NodeError, ServiceHandles};
use crate::graph::{ConversationState, Node, StateDelta, Target};
use crate::memory::{Message, Role};

/// 意图分类器：返回原始标签文本
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, messages: &[Message]) -> Result<String, String>;
}

/// 基于 LLM 的分类器：system prompt 列出标签词表，要求只回答一个标签
pub struct LlmIntentClassifier {
    handles: Arc<ServiceHandles>,
    labels: Vec<String>,
}

impl LlmIntentClassifier {
    pub fn new(handles: Arc<ServiceHandles>, labels: Vec<String>) -> Self {
        Self { handles, labels }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You route requests for a coffee exchange. Classify the user's request into exactly one of: {}. \
             If none applies, answer: general. Reply with the single label only.",
            self.labels.join(", ")
        )
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, messages: &[Message]) -> Result<String, String> {
        let llm = self.handles.llm().await?;
        let mut full = vec![Message::system(self.system_prompt())];
        full.extend_from_slice(messages);
        llm.complete(&full).await
    }
}

/// 第一个被输出包含的标签胜出（按配置顺序）
pub fn match_label<'a>(output: &str, routes: &'a [(String, String)]) -> Option<&'a str> {
    let normalized = output.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    routes
        .iter()
        .find(|(label, _)| normalized.contains(label.as_str()))
        .map(|(_, node)| node.as_str())
}

pub struct SupervisorNode {
    classifier: Arc<dyn IntentClassifier>,
    /// (标签, broker 节点名)
    routes: Vec<(String, String)>,
    fallback: String,
}

impl SupervisorNode {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        routes: Vec<(String, String)>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            routes: routes
                .into_iter()
                .map(|(label, node)| (label.to_lowercase(), node))
                .collect(),
            fallback: fallback.into(),
        }
    }
}

#[async_trait]
impl Node for SupervisorNode {
    async fn run(&self, state: &ConversationState) -> Result<StateDelta, NodeError> {
        let user = state
            .log()
            .latest(Role::User)
            .ok_or_else(|| NodeError::InvalidState("no user message to classify".to_string()))?;

        let label = self
            .classifier
            .classify(std::slice::from_ref(user))
            .await
            .map_err(NodeError::Classification)?;

        let matched = match_label(&label, &self.routes);
        let target = matched.unwrap_or(self.fallback.as_str()).to_string();
        tracing::info!(
            label = %label.trim(),
            route = %target,
            fallback = matched.is_none(),
            "supervisor routed"
        );
        Ok(StateDelta::new().route(Target::node(target)))
    }
}
