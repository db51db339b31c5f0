//! 进程级共享的外部适配器句柄
//!
//! LLM 客户端与知识图谱查询客户端都是惰性创建的：第一个需要它的会话执行工厂，
//! 并发的其他会话等待并复用同一实例。初始化失败不会被缓存，下次调用会重试。

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::OnceCell;

use crate::config::AppConfig;
use crate::knowledge::{GraphQueryService, HttpGraphQueryService, InMemoryTopology};
use crate::llm::{create_llm_from_config, LlmClient};

pub type LlmFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn LlmClient>, String>> + Send + Sync>;
pub type KnowledgeFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn GraphQueryService>, String>> + Send + Sync>;

pub struct ServiceHandles {
    llm: OnceCell<Arc<dyn LlmClient>>,
    llm_factory: LlmFactory,
    knowledge: OnceCell<Arc<dyn GraphQueryService>>,
    knowledge_factory: KnowledgeFactory,
}

impl ServiceHandles {
    pub fn new(llm_factory: LlmFactory, knowledge_factory: KnowledgeFactory) -> Self {
        Self {
            llm: OnceCell::new(),
            llm_factory,
            knowledge: OnceCell::new(),
            knowledge_factory,
        }
    }

    /// 使用现成实例（测试与嵌入场景）
    pub fn with_instances(llm: Arc<dyn LlmClient>, knowledge: Arc<dyn GraphQueryService>) -> Self {
        Self {
            llm: OnceCell::new_with(Some(llm.clone())),
            llm_factory: Arc::new(move || {
                let llm = llm.clone();
                async move { Ok::<_, String>(llm) }.boxed()
            }),
            knowledge: OnceCell::new_with(Some(knowledge.clone())),
            knowledge_factory: Arc::new(move || {
                let knowledge = knowledge.clone();
                async move { Ok::<_, String>(knowledge) }.boxed()
            }),
        }
    }

    /// 按配置创建：[llm] 选择后端；[tools.knowledge_graph].endpoint 未设置时使用种子拓扑
    pub fn from_config(cfg: &AppConfig) -> Self {
        let llm_cfg = cfg.clone();
        let llm_factory: LlmFactory = Arc::new(move || {
            let cfg = llm_cfg.clone();
            async move { Ok::<_, String>(create_llm_from_config(&cfg)) }.boxed()
        });

        let kg = cfg.tools.knowledge_graph.clone();
        let knowledge_factory: KnowledgeFactory = Arc::new(move || {
            let kg = kg.clone();
            async move {
                let service: Arc<dyn GraphQueryService> = match kg.endpoint {
                    Some(endpoint) => {
                        tracing::info!(endpoint = %endpoint, "Using remote knowledge graph");
                        Arc::new(HttpGraphQueryService::new(endpoint, kg.timeout_secs)?)
                    }
                    None => {
                        tracing::info!("Using in-memory network topology");
                        Arc::new(InMemoryTopology::seeded())
                    }
                };
                Ok::<_, String>(service)
            }
            .boxed()
        });

        Self::new(llm_factory, knowledge_factory)
    }

    pub async fn llm(&self) -> Result<Arc<dyn LlmClient>, String> {
        self.llm
            .get_or_try_init(|| (self.llm_factory)())
            .await
            .cloned()
    }

    /// 已初始化的 LLM 客户端；尚未初始化时不触发创建
    pub fn llm_if_ready(&self) -> Option<Arc<dyn LlmClient>> {
        self.llm.get().cloned()
    }

    pub async fn knowledge(&self) -> Result<Arc<dyn GraphQueryService>, String> {
        self.knowledge
            .get_or_try_init(|| (self.knowledge_factory)())
            .await
            .cloned()
    }
}
