//! 记忆层：单次请求内只追加的消息日志（不做跨请求持久化）

pub mod conversation;

pub use conversation::{Message, MessageLog, Role, ToolCall};
