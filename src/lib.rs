//! Hive - 有状态对话编排引擎
//!
//! 模块划分：
//! - **agent**: 会话入口（ExchangeAgent::serve）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、会话、惰性共享的适配器句柄
//! - **graph**: 状态图构建、编译校验与带步数上限的执行引擎
//! - **knowledge**: 网络知识图谱查询（远程 / 进程内拓扑）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 单次请求内的消息日志
//! - **nodes**: 交易所图的节点（supervisor / broker / 工具 / reflection / general）与连线
//! - **observability**: 日志初始化
//! - **tools**: 工具 trait、注册表、执行器与业务域工具

pub mod agent;
pub mod config;
pub mod core;
pub mod graph;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod nodes;
pub mod observability;
pub mod tools;

pub use agent::ExchangeAgent;
pub use core::EngineError;
