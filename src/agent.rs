//! 会话入口
//!
//! ExchangeAgent 持有编译好的交易所图与执行引擎，可在多个请求间共享（Arc）。
//! serve 对每条用户输入创建独立的会话状态，跑图直到结束，返回最近一条非空 assistant 回复。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::{EngineError, ServiceHandles, Session};
use crate::graph::{ConversationState, ExecutionEngine};
use crate::nodes::{build_exchange_graph, ExchangeDeps};
use crate::tools::{register_exchange_tools, FarmLedger, ToolExecutor, ToolRegistry};

pub struct ExchangeAgent {
    engine: ExecutionEngine,
    handles: Arc<ServiceHandles>,
    request_timeout: Duration,
}

impl ExchangeAgent {
    pub fn new(engine: ExecutionEngine, handles: Arc<ServiceHandles>, request_timeout: Duration) -> Self {
        Self {
            engine,
            handles,
            request_timeout,
        }
    }

    /// 按配置构建：适配器句柄、工具、默认分类器与判定器
    pub fn from_config(cfg: &AppConfig) -> Result<Self, EngineError> {
        Self::with_handles(cfg, Arc::new(ServiceHandles::from_config(cfg)))
    }

    /// 使用给定句柄构建（测试中注入脚本化 LLM）
    pub fn with_handles(cfg: &AppConfig, handles: Arc<ServiceHandles>) -> Result<Self, EngineError> {
        let deps = ExchangeDeps::new(handles.clone(), Arc::new(exchange_executor(cfg, handles)));
        Self::from_deps(cfg, deps)
    }

    /// 使用完整的依赖集合构建（可替换分类器与判定器）
    pub fn from_deps(cfg: &AppConfig, deps: ExchangeDeps) -> Result<Self, EngineError> {
        let graph = build_exchange_graph(&deps)?;
        tracing::info!(
            nodes = ?graph.node_names(),
            entry = graph.entry(),
            tools = ?deps.executor.registry().tool_names(),
            "exchange graph compiled"
        );
        let engine = ExecutionEngine::new(Arc::new(graph), cfg.engine.max_steps);
        Ok(Self::new(engine, deps.handles, cfg.engine.request_timeout()))
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub async fn serve(&self, prompt: &str) -> Result<String, EngineError> {
        self.serve_with_cancel(prompt, &CancellationToken::new()).await
    }

    /// 处理单条用户输入；cancel_token 被取消时放弃正在执行的节点并返回 Cancelled
    pub async fn serve_with_cancel(
        &self,
        prompt: &str,
        cancel_token: &CancellationToken,
    ) -> Result<String, EngineError> {
        if prompt.trim().is_empty() {
            return Err(EngineError::InvalidInput("prompt must not be empty".to_string()));
        }

        let session = Session::with_parent(cancel_token);
        let span = tracing::info_span!("session", id = %session.id());
        self.run_session(prompt, &session).instrument(span).await
    }

    async fn run_session(&self, prompt: &str, session: &Session) -> Result<String, EngineError> {
        let state = ConversationState::seeded(prompt, self.engine.graph().entry());
        let run = tokio::time::timeout(self.request_timeout, self.engine.run(state, session.cancel_token())).await;

        let outcome = match run {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, elapsed_ms = session.elapsed_ms(), "session failed");
                return Err(e);
            }
            Err(_) => {
                session.cancel();
                tracing::warn!(timeout = ?self.request_timeout, "session timed out");
                return Err(EngineError::Timeout(self.request_timeout));
            }
        };

        if let Some(llm) = self.handles.llm_if_ready() {
            let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
            tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage");
        }
        tracing::info!(
            steps = outcome.steps,
            messages = outcome.state.messages().len(),
            elapsed_ms = session.elapsed_ms(),
            "session finished"
        );

        outcome
            .state
            .log()
            .latest_assistant_text()
            .map(str::to_string)
            .ok_or(EngineError::NoResult)
    }
}

/// 交易所工具集：种子农场台账 + 知识图谱诊断工具
fn exchange_executor(cfg: &AppConfig, handles: Arc<ServiceHandles>) -> ToolExecutor {
    let mut registry = ToolRegistry::new();
    register_exchange_tools(&mut registry, Arc::new(FarmLedger::seeded()), handles);
    ToolExecutor::new(registry, cfg.tools.tool_timeout_secs)
}
