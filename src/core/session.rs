//! 会话：单次请求的生命周期与中断
//!
//! 每次 serve 创建一个 Session，持有独立的取消令牌；外部令牌取消时经由子令牌传播。

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 单个请求的会话上下文
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    cancel_token: CancellationToken,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_parent(&CancellationToken::new())
    }

    /// 以调用方的令牌为父令牌：父取消时本会话随之取消，本会话取消不影响父令牌
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel_token: parent.child_token(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// 触发取消（用户 Ctrl+C）
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 已运行毫秒数
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_cancel_propagates() {
        let parent = CancellationToken::new();
        let session = Session::with_parent(&parent);
        assert!(!session.is_cancelled());
        parent.cancel();
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_session_cancel_does_not_touch_parent() {
        let parent = CancellationToken::new();
        let session = Session::with_parent(&parent);
        session.cancel();
        assert!(session.is_cancelled());
        assert!(!parent.is_cancelled());
        assert_ne!(session.id(), Session::new().id());
    }
}
