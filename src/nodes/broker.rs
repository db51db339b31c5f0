//! Broker 节点：业务域的回答者
//!
//! 请 LLM 给出答案或工具调用（JSON 文本协议）。已在日志中有结果的相同调用（同名同参数）不再提交；
//! 若过滤后一个不剩，则直接以最近的工具结果作答。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{NodeError, ServiceHandles};
use crate::graph::{ConversationState, Node, StateDelta};
use crate::memory::{Message, MessageLog, Role, ToolCall};
use crate::nodes::{extract_json, Domain};
use crate::tools::{tool_call_schema_json, ToolRegistry};

/// broker 的 LLM 输出
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerOutput {
    Answer(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToolCallRequest {
    Batch { tool_calls: Vec<ToolCall> },
    Single {
        tool: String,
        #[serde(default, alias = "arguments")]
        args: Option<Value>,
    },
}

/// 解析 broker 输出：只认 `{"tool_calls": [...]}` 与 `{"tool": ..., "args": ...}` 两种形式，其余一律视为答案
pub fn parse_broker_output(output: &str) -> BrokerOutput {
    let trimmed = output.trim();
    let calls = extract_json(trimmed)
        .and_then(|json| serde_json::from_str::<ToolCallRequest>(json).ok())
        .map(|req| match req {
            ToolCallRequest::Batch { tool_calls } => tool_calls,
            ToolCallRequest::Single { tool, args } => vec![ToolCall::new(
                tool,
                args.unwrap_or_else(|| Value::Object(Default::default())),
            )],
        })
        .unwrap_or_default();

    if calls.is_empty() || calls.iter().any(|c| c.name.trim().is_empty()) {
        BrokerOutput::Answer(trimmed.to_string())
    } else {
        BrokerOutput::ToolCalls(calls)
    }
}

/// 已执行过的工具调用：assistant 消息紧随其后有 tool 结果
fn executed_calls(log: &MessageLog) -> Vec<&ToolCall> {
    let msgs = log.messages();
    msgs.iter()
        .enumerate()
        .filter(|(i, m)| {
            m.has_tool_calls() && msgs.get(i + 1).map(|next| next.role == Role::Tool).unwrap_or(false)
        })
        .flat_map(|(_, m)| m.tool_calls.iter())
        .collect()
}

pub struct BrokerNode {
    domain: Domain,
    handles: Arc<ServiceHandles>,
    system_prompt: String,
}

impl BrokerNode {
    pub fn new(domain: Domain, handles: Arc<ServiceHandles>, registry: &ToolRegistry) -> Self {
        let system_prompt = format!(
            "{}\n\nAvailable tools:\n{}\n\nTo call tools, reply with JSON only, matching this schema:\n{}\n\
             Otherwise reply with the final answer in plain text.",
            domain.role,
            registry.schema_json_for(domain.tools),
            tool_call_schema_json()
        );
        Self {
            domain,
            handles,
            system_prompt,
        }
    }
}

#[async_trait]
impl Node for BrokerNode {
    async fn run(&self, state: &ConversationState) -> Result<StateDelta, NodeError> {
        let llm = self.handles.llm().await.map_err(NodeError::Llm)?;
        let mut messages = vec![Message::system(self.system_prompt.clone())];
        messages.extend_from_slice(state.messages());
        let output = llm.complete(&messages).await.map_err(NodeError::Llm)?;

        let calls = match parse_broker_output(&output) {
            BrokerOutput::Answer(text) => {
                tracing::info!(broker = self.domain.broker, "broker answered");
                return Ok(StateDelta::new().message(Message::assistant(text)));
            }
            BrokerOutput::ToolCalls(calls) => calls,
        };

        let executed = executed_calls(state.log());
        let (fresh, repeated): (Vec<ToolCall>, Vec<ToolCall>) =
            calls.into_iter().partition(|c| !executed.contains(&c));
        for call in &repeated {
            tracing::warn!(
                broker = self.domain.broker,
                tool = %call.name,
                "dropping repeated tool call whose result is already in the log"
            );
        }

        if fresh.is_empty() {
            let latest = state
                .log()
                .latest(Role::Tool)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return Ok(StateDelta::new().message(Message::assistant(latest)));
        }

        tracing::info!(
            broker = self.domain.broker,
            tools = ?fresh.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "broker requested tools"
        );
        Ok(StateDelta::new().message(Message::assistant_with_tool_calls("", fresh)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::knowledge::InMemoryTopology;
    use crate::llm::{LlmClient, ScriptedLlmClient};
    use crate::nodes::DOMAINS;

    fn broker(llm: Arc<ScriptedLlmClient>) -> BrokerNode {
        let handles = Arc::new(ServiceHandles::with_instances(
            llm as Arc<dyn LlmClient>,
            Arc::new(InMemoryTopology::seeded()),
        ));
        BrokerNode::new(DOMAINS[0], handles, &ToolRegistry::new())
    }

    #[test]
    fn test_parse_batch_single_and_answer() {
        assert_eq!(
            parse_broker_output(r#"{"tool_calls": [{"name": "get_farm_yield_inventory", "arguments": {"farm": "brazil"}}]}"#),
            BrokerOutput::ToolCalls(vec![ToolCall::new("get_farm_yield_inventory", json!({"farm": "brazil"}))])
        );
        assert_eq!(
            parse_broker_output("```json\n{\"tool\": \"get_all_farms_yield_inventory\"}\n```"),
            BrokerOutput::ToolCalls(vec![ToolCall::new("get_all_farms_yield_inventory", json!({}))])
        );
        assert_eq!(
            parse_broker_output("  Brazil has 3200 lbs.  "),
            BrokerOutput::Answer("Brazil has 3200 lbs.".to_string())
        );
        assert_eq!(
            parse_broker_output(r#"{"tool_calls": []}"#),
            BrokerOutput::Answer(r#"{"tool_calls": []}"#.to_string())
        );
    }

    #[test]
    fn test_json_answer_with_name_key_is_not_a_call() {
        let answer = r#"{"name": "core-router-1", "type": "router", "location": "datacenter-1"}"#;
        assert_eq!(parse_broker_output(answer), BrokerOutput::Answer(answer.to_string()));
    }

    #[tokio::test]
    async fn test_tool_request_has_empty_content() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"tool": "get_farm_yield_inventory", "args": {"farm": "brazil"}}"#]));
        let delta = broker(llm.clone())
            .run(&ConversationState::seeded("yield?", "inventory_broker"))
            .await
            .unwrap();

        assert_eq!(delta.messages.len(), 1);
        assert!(delta.messages[0].content.is_empty());
        assert_eq!(delta.messages[0].tool_calls[0].name, "get_farm_yield_inventory");
        let sent = llm.request(0).unwrap();
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "yield?");
    }

    #[tokio::test]
    async fn test_repeated_call_answers_with_latest_tool_result() {
        let call = ToolCall::new("get_farm_yield_inventory", json!({"farm": "brazil"}));
        let mut state = ConversationState::seeded("yield?", "inventory_broker");
        state.apply(StateDelta::new().messages([
            Message::assistant_with_tool_calls("", vec![call]),
            Message::tool("brazil farm yield: 3200 lbs of coffee"),
        ]));

        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool_calls": [{"name": "get_farm_yield_inventory", "arguments": {"farm": "brazil"}}]}"#,
        ]));
        let delta = broker(llm).run(&state).await.unwrap();

        assert_eq!(delta.messages, vec![Message::assistant("brazil farm yield: 3200 lbs of coffee")]);
    }

    #[tokio::test]
    async fn test_only_new_calls_are_kept() {
        let mut state = ConversationState::seeded("yield?", "inventory_broker");
        state.apply(StateDelta::new().messages([
            Message::assistant_with_tool_calls("", vec![ToolCall::new("get_farm_yield_inventory", json!({"farm": "brazil"}))]),
            Message::tool("brazil farm yield: 3200 lbs of coffee"),
        ]));
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool_calls": [{"name": "get_farm_yield_inventory", "arguments": {"farm": "brazil"}}, {"name": "get_farm_yield_inventory", "arguments": {"farm": "vietnam"}}]}"#,
        ]));
        let delta = broker(llm).run(&state).await.unwrap();

        assert_eq!(
            delta.messages[0].tool_calls,
            vec![ToolCall::new("get_farm_yield_inventory", json!({"farm": "vietnam"}))]
        );
    }

    #[tokio::test]
    async fn test_llm_failure_fails_node() {
        let llm = Arc::new(ScriptedLlmClient::failing("rate limited"));
        let err = broker(llm)
            .run(&ConversationState::seeded("yield?", "inventory_broker"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Llm(_)));
    }
}
