//! 会话状态与状态增量
//!
//! ConversationState 由单个请求独占；节点只读状态并返回 StateDelta，由引擎原子地应用。

use crate::graph::types::Target;
use crate::memory::{Message, MessageLog};

/// 单个请求的对话状态：消息日志 + 当前路由目标
#[derive(Debug, Clone)]
pub struct ConversationState {
    log: MessageLog,
    routing_target: Target,
}

impl ConversationState {
    pub fn new(routing_target: Target) -> Self {
        Self {
            log: MessageLog::new(),
            routing_target,
        }
    }

    /// 以一条用户消息初始化，路由指向入口节点
    pub fn seeded(prompt: impl Into<String>, entry: impl Into<String>) -> Self {
        let mut state = Self::new(Target::Node(entry.into()));
        state.log.push(Message::user(prompt));
        state
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn routing_target(&self) -> &Target {
        &self.routing_target
    }

    pub(crate) fn set_routing_target(&mut self, target: Target) {
        self.routing_target = target;
    }

    /// 整体应用增量：先追加全部消息，再设置路由
    pub(crate) fn apply(&mut self, delta: StateDelta) {
        self.log.extend(delta.messages);
        if let Some(route) = delta.route {
            self.routing_target = route;
        }
    }
}

/// 节点返回的部分状态更新
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub route: Option<Target>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, msg: Message) -> Self {
        self.messages.push(msg);
        self
    }

    pub fn messages(mut self, msgs: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(msgs);
        self
    }

    pub fn route(mut self, target: impl Into<Target>) -> Self {
        self.route = Some(target.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_appends_then_routes() {
        let mut state = ConversationState::seeded("hi", "supervisor");
        state.apply(
            StateDelta::new()
                .message(Message::assistant("a"))
                .message(Message::system("b"))
                .route(Target::End),
        );
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.routing_target(), &Target::End);
    }

    #[test]
    fn test_apply_without_route_keeps_target() {
        let mut state = ConversationState::seeded("hi", "supervisor");
        state.apply(StateDelta::new().message(Message::assistant("a")));
        assert_eq!(state.routing_target(), &Target::node("supervisor"));
    }
}
