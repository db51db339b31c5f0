//! 反思 / 终止控制
//!
//! broker 作答后决定继续路由还是结束：先做重复状态检查（最后一条与倒数第三条内容相同即终止，不再询问判定器），
//! 否则请判定器给出 `{should_continue, reason}`，理由追加为 system 消息。判定失败时保守终止。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::{NodeError, ServiceHandles};
use crate::graph::{ConversationState, Node, StateDelta, Target};
use crate::memory::Message;
use crate::nodes::extract_json;

/// 判定结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    pub should_continue: bool,
    #[serde(default)]
    pub reason: String,
}

#[async_trait]
pub trait ReflectionJudge: Send + Sync {
    async fn judge(&self, messages: &[Message]) -> Result<Verdict, String>;
}

/// 基于 LLM 的判定器：要求输出 JSON verdict，用 serde 解析
pub struct LlmReflectionJudge {
    handles: Arc<ServiceHandles>,
}

impl LlmReflectionJudge {
    pub fn new(handles: Arc<ServiceHandles>) -> Self {
        Self { handles }
    }
}

const JUDGE_PROMPT: &str = "You decide whether the conversation needs another routing step. \
If the user's request has been answered, or the conversation is going in circles, stop. \
Reply with JSON only: {\"should_continue\": true|false, \"reason\": \"...\"}";

pub fn parse_verdict(output: &str) -> Result<Verdict, String> {
    let json = extract_json(output).ok_or_else(|| format!("No verdict in judge output: {}", output.trim()))?;
    serde_json::from_str(json).map_err(|e| format!("Unparsable verdict: {}: {}", e, json))
}

#[async_trait]
impl ReflectionJudge for LlmReflectionJudge {
    async fn judge(&self, messages: &[Message]) -> Result<Verdict, String> {
        let llm = self.handles.llm().await?;
        let mut full = vec![Message::system(JUDGE_PROMPT)];
        full.extend_from_slice(messages);
        let output = llm.complete(&full).await?;
        parse_verdict(&output)
    }
}

/// 重复状态检查：日志多于两条，且最后一条与其前两位的消息内容相同（不比较角色）
pub fn is_duplicate_state(messages: &[Message]) -> bool {
    let n = messages.len();
    n > 2 && messages[n - 1].content == messages[n - 3].content
}

pub struct ReflectionNode {
    judge: Arc<dyn ReflectionJudge>,
    /// should_continue 时回到的节点
    restart: String,
}

impl ReflectionNode {
    pub fn new(judge: Arc<dyn ReflectionJudge>, restart: impl Into<String>) -> Self {
        Self {
            judge,
            restart: restart.into(),
        }
    }
}

#[async_trait]
impl Node for ReflectionNode {
    async fn run(&self, state: &ConversationState) -> Result<StateDelta, NodeError> {
        if is_duplicate_state(state.messages()) {
            tracing::info!("duplicate state detected, terminating");
            return Ok(StateDelta::new()
                .message(Message::system("Terminating: the conversation is repeating itself."))
                .route(Target::End));
        }

        let delta = match self.judge.judge(state.messages()).await {
            Ok(verdict) => {
                tracing::info!(
                    should_continue = verdict.should_continue,
                    reason = %verdict.reason,
                    "reflection verdict"
                );
                let reason = if verdict.reason.trim().is_empty() {
                    format!("should_continue={}", verdict.should_continue)
                } else {
                    verdict.reason
                };
                let target = if verdict.should_continue {
                    Target::node(self.restart.clone())
                } else {
                    Target::End
                };
                StateDelta::new().message(Message::system(reason)).route(target)
            }
            Err(e) => {
                tracing::warn!(error = %e, "reflection judge failed, terminating");
                StateDelta::new()
                    .message(Message::system(format!("Reflection failed, terminating: {}", e)))
                    .route(Target::End)
            }
        };
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJudge {
        verdict: Result<Verdict, String>,
        calls: AtomicUsize,
    }

    impl CountingJudge {
        fn new(verdict: Result<Verdict, String>) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReflectionJudge for CountingJudge {
        async fn judge(&self, _messages: &[Message]) -> Result<Verdict, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn keep_going() -> Result<Verdict, String> {
        Ok(Verdict {
            should_continue: true,
            reason: "needs more".into(),
        })
    }

    fn state(msgs: Vec<Message>) -> ConversationState {
        let mut state = ConversationState::seeded("q", "reflection");
        state.apply(StateDelta::new().messages(msgs));
        state
    }

    #[test]
    fn test_duplicate_guard_compares_n_and_n_minus_2() {
        let a = Message::assistant("same");
        assert!(!is_duplicate_state(&[a.clone(), a.clone()]));
        assert!(is_duplicate_state(&[a.clone(), Message::system("x"), a.clone()]));
        assert!(is_duplicate_state(&[
            Message::user("same"),
            Message::tool("y"),
            Message::assistant("same")
        ]));
        assert!(!is_duplicate_state(&[a.clone(), a.clone(), Message::assistant("other")]));
    }

    #[tokio::test]
    async fn test_duplicate_state_terminates_without_judge() {
        let judge = CountingJudge::new(keep_going());
        let node = ReflectionNode::new(judge.clone(), "exchange_supervisor");
        let st = state(vec![
            Message::assistant("3200 lbs"),
            Message::system("needs more"),
            Message::assistant("3200 lbs"),
        ]);

        let delta = node.run(&st).await.unwrap();
        assert_eq!(delta.route, Some(Target::End));
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_continue_routes_to_restart_with_reason() {
        let judge = CountingJudge::new(keep_going());
        let node = ReflectionNode::new(judge.clone(), "exchange_supervisor");
        let delta = node.run(&state(vec![Message::assistant("partial")])).await.unwrap();

        assert_eq!(delta.route, Some(Target::node("exchange_supervisor")));
        assert_eq!(delta.messages, vec![Message::system("needs more")]);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_judge_failure_terminates() {
        let node = ReflectionNode::new(CountingJudge::new(Err("timeout".into())), "exchange_supervisor");
        let delta = node.run(&state(vec![Message::assistant("answer")])).await.unwrap();
        assert_eq!(delta.route, Some(Target::End));
        assert!(delta.messages[0].content.contains("timeout"));
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(
            parse_verdict("```json\n{\"should_continue\": false, \"reason\": \"answered\"}\n```"),
            Ok(Verdict {
                should_continue: false,
                reason: "answered".into()
            })
        );
        assert!(parse_verdict("yes, continue").is_err());
        assert!(parse_verdict("{\"reason\": \"missing flag\"}").is_err());
    }
}
