//! 核心层：错误分类、会话、共享适配器句柄

pub mod error;
pub mod handles;
pub mod session;

pub use error::{EngineError, NodeError, ToolError};
pub use handles::{KnowledgeFactory, LlmFactory, ServiceHandles};
pub use session::Session;
