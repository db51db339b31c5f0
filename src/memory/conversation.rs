//! 消息日志：单次请求内的对话历史
//!
//! 只追加、不剪枝；插入顺序有意义。提供按角色反向查找「最近一条」的查询，找不到时返回 None。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 LLM API 一致，另加 Tool 承载工具结果）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// Broker 请求执行的单个工具调用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_arguments", alias = "args")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(Default::default())
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// 单条消息；追加进日志后不再修改
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, content)
    }

    /// Assistant 消息，携带待执行的工具调用
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// 只追加的消息日志
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn extend(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 从尾部反向查找指定角色的最近一条消息；O(n)，不存在时返回 None
    pub fn latest(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// 最近一条内容非空的 Assistant 消息（去除首尾空白）；只含工具调用的消息被跳过
    pub fn latest_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_by_role() {
        let mut log = MessageLog::new();
        log.push(Message::user("first"));
        log.push(Message::assistant("answer"));
        log.push(Message::user("second"));

        assert_eq!(log.latest(Role::User).map(|m| m.content.as_str()), Some("second"));
        assert_eq!(log.latest(Role::Assistant).map(|m| m.content.as_str()), Some("answer"));
        assert!(log.latest(Role::Tool).is_none());
    }

    #[test]
    fn test_latest_assistant_text_skips_tool_call_messages() {
        let mut log = MessageLog::new();
        log.push(Message::user("yield?"));
        log.push(Message::assistant("  Brazil yields 50,000 lbs.  "));
        log.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("get_all_farms_yield_inventory", json!({}))],
        ));
        log.push(Message::tool("total"));
        log.push(Message::system("reflection reason"));

        assert_eq!(log.latest_assistant_text(), Some("Brazil yields 50,000 lbs."));
    }

    #[test]
    fn test_latest_assistant_text_none_when_absent() {
        let mut log = MessageLog::new();
        log.push(Message::user("hello"));
        log.push(Message::assistant("   "));
        assert_eq!(log.latest_assistant_text(), None);
    }

    #[test]
    fn test_tool_call_accepts_args_alias() {
        let call: ToolCall =
            serde_json::from_value(json!({"name": "trace_network_path", "args": {"service_name": "x"}}))
                .unwrap();
        assert_eq!(call.arguments, json!({"service_name": "x"}));

        let bare: ToolCall = serde_json::from_value(json!({"name": "get_network_health"})).unwrap();
        assert_eq!(bare.arguments, json!({}));
    }
}
