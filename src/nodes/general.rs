//! 兜底节点：无法识别意图时请用户澄清

use async_trait::async_trait;

use crate::core::NodeError;
use crate::graph::{ConversationState, Node, StateDelta};
use crate::memory::Message;

pub const FALLBACK_MESSAGE: &str = "I'm not sure how to handle that. Could you please clarify?";

/// 不做任何外部调用，不会失败
pub struct GeneralNode;

#[async_trait]
impl Node for GeneralNode {
    async fn run(&self, _state: &ConversationState) -> Result<StateDelta, NodeError> {
        Ok(StateDelta::new().message(Message::assistant(FALLBACK_MESSAGE)))
    }
}
