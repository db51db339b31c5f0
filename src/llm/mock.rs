//! Mock / Scripted LLM 客户端（用于测试与离线运行，无需 API）

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 按脚本顺序返回预设回复；脚本耗尽后返回错误。记录调用次数与每次收到的消息
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    repeat_error: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    /// 脚本中可混入失败项
    pub fn from_results(results: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    /// 每次调用都失败
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            repeat_error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 第 n 次调用收到的消息（从 0 开始）
    pub fn request(&self, n: usize) -> Option<Vec<Message>> {
        self.requests.lock().ok()?.get(n).cloned()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        if let Some(err) = &self.repeat_error {
            return Err(err.clone());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| "script lock poisoned".to_string())?
            .pop_front();
        next.unwrap_or_else(|| Err("scripted LLM exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let out = MockLlmClient
            .complete(&[Message::user("first"), Message::assistant("x"), Message::user("second")])
            .await
            .unwrap();
        assert_eq!(out, "Echo from Mock: second");
    }

    #[tokio::test]
    async fn test_scripted_in_order_then_exhausted() {
        let llm = ScriptedLlmClient::new(["one", "two"]);
        assert_eq!(llm.complete(&[]).await.unwrap(), "one");
        assert_eq!(llm.complete(&[Message::user("q")]).await.unwrap(), "two");
        assert!(llm.complete(&[]).await.is_err());
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.request(1).unwrap()[0].content, "q");
    }

    #[tokio::test]
    async fn test_failing_always_errors() {
        let llm = ScriptedLlmClient::failing("down");
        assert_eq!(llm.complete(&[]).await.unwrap_err(), "down");
        assert_eq!(llm.complete(&[]).await.unwrap_err(), "down");
        assert_eq!(llm.calls(), 2);
    }
}
