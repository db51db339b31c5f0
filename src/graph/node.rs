//! 节点处理器 trait

use async_trait::async_trait;

use crate::core::NodeError;
use crate::graph::state::{ConversationState, StateDelta};

/// 图中的处理节点：只读状态，返回增量；看不到也改不了边
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: &ConversationState) -> Result<StateDelta, NodeError>;
}
