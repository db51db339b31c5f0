//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use traits::LlmClient;

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);
    let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        "deepseek" => match deepseek_key.or(openai_key) {
            Some(key) => {
                tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
                Arc::new(OpenAiClient::deepseek(Some(&cfg.llm.model), &key, timeout))
            }
            None => {
                tracing::warn!("No API key set for deepseek, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "openai" => match openai_key {
            Some(key) => {
                tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
                Arc::new(OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    &cfg.llm.model,
                    &key,
                    timeout,
                ))
            }
            None => {
                tracing::warn!("No OPENAI_API_KEY set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        other => {
            tracing::warn!("Unknown LLM provider '{}', using Mock LLM", other);
            Arc::new(MockLlmClient)
        }
    }
}
