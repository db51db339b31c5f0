//! 状态图：构建、编译校验与执行
//!
//! - **builder**: 流畅 API 声明节点与边，compile 做结构校验
//! - **compiled**: 编译后的只读图，可跨会话共享
//! - **engine**: 带步数上限与取消的执行循环
//! - **state**: 会话状态与节点返回的增量

pub mod builder;
pub mod compiled;
pub mod engine;
pub mod node;
pub mod state;
pub mod types;

pub use builder::GraphBuilder;
pub use compiled::CompiledGraph;
pub use engine::{ExecutionEngine, RunOutcome, DEFAULT_MAX_STEPS};
pub use node::Node;
pub use state::{ConversationState, StateDelta};
pub use types::{ConditionalEdge, EdgeSpec, GraphError, NodeName, RoutePredicate, Target, END};
