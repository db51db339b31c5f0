//! 交易所图的节点与连线
//!
//! exchange_supervisor 分类意图 -> 对应 broker；broker 与其工具节点组成子循环；
//! broker 作答后进入 reflection，由它决定回到 supervisor 还是结束。无法分类时进入 general。

pub mod broker;
pub mod general;
pub mod reflection;
pub mod supervisor;
pub mod tool_node;

use std::sync::Arc;

use crate::core::ServiceHandles;
use crate::graph::{CompiledGraph, ConditionalEdge, ConversationState, GraphBuilder, GraphError, Target, END};
use crate::tools::{ToolExecutor, DIAGNOSTICS_TOOLS, INVENTORY_TOOLS, ORDERS_TOOLS};

pub use broker::{parse_broker_output, BrokerNode, BrokerOutput};
pub use general::{GeneralNode, FALLBACK_MESSAGE};
pub use reflection::{is_duplicate_state, parse_verdict, LlmReflectionJudge, ReflectionJudge, ReflectionNode, Verdict};
pub use supervisor::{match_label, IntentClassifier, LlmIntentClassifier, SupervisorNode};
pub use tool_node::ToolNode;

pub const SUPERVISOR: &str = "exchange_supervisor";
pub const REFLECTION: &str = "reflection";
pub const GENERAL: &str = "general";

/// broker 出边的路由键
pub const ROUTE_TOOLS: &str = "tools";
pub const ROUTE_NEXT: &str = "next";

/// 一个业务域：分类标签、broker 节点、工具节点与可用工具
#[derive(Debug, Clone, Copy)]
pub struct Domain {
    pub label: &'static str,
    pub broker: &'static str,
    pub tools_node: &'static str,
    pub tools: &'static [&'static str],
    pub role: &'static str,
}

pub const DOMAINS: [Domain; 3] = [
    Domain {
        label: "inventory",
        broker: "inventory_broker",
        tools_node: "inventory_tools",
        tools: INVENTORY_TOOLS,
        role: "You answer questions about coffee yield inventory at the farms.",
    },
    Domain {
        label: "orders",
        broker: "orders_broker",
        tools_node: "orders_tools",
        tools: ORDERS_TOOLS,
        role: "You create coffee orders and look up existing orders.",
    },
    Domain {
        label: "diagnostics",
        broker: "diagnostics_broker",
        tools_node: "diagnostics_tools",
        tools: DIAGNOSTICS_TOOLS,
        role: "You diagnose network and infrastructure problems behind the exchange services.",
    },
];

/// broker 的条件边谓词：最新消息带工具调用则去工具节点，否则进入反思
pub fn tools_or_next(state: &ConversationState) -> String {
    match state.log().last() {
        Some(msg) if msg.has_tool_calls() => ROUTE_TOOLS.to_string(),
        _ => ROUTE_NEXT.to_string(),
    }
}

/// 从 LLM 输出中提取 JSON：优先 ```json 代码块，其次首个 '{' 到最后一个 '}'
pub(crate) fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 图节点的外部协作者
#[derive(Clone)]
pub struct ExchangeDeps {
    pub handles: Arc<ServiceHandles>,
    pub executor: Arc<ToolExecutor>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub judge: Arc<dyn ReflectionJudge>,
}

impl ExchangeDeps {
    /// 默认使用基于 LLM 的分类器与反思判定
    pub fn new(handles: Arc<ServiceHandles>, executor: Arc<ToolExecutor>) -> Self {
        let labels = DOMAINS.iter().map(|d| d.label.to_string()).collect();
        Self {
            classifier: Arc::new(LlmIntentClassifier::new(handles.clone(), labels)),
            judge: Arc::new(LlmReflectionJudge::new(handles.clone())),
            handles,
            executor,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn ReflectionJudge>) -> Self {
        self.judge = judge;
        self
    }
}

/// 组装并编译交易所图
pub fn build_exchange_graph(deps: &ExchangeDeps) -> Result<CompiledGraph, GraphError> {
    let routes: Vec<(String, String)> = DOMAINS
        .iter()
        .map(|d| (d.label.to_string(), d.broker.to_string()))
        .collect();
    let mut supervisor_targets: Vec<Target> = DOMAINS.iter().map(|d| Target::node(d.broker)).collect();
    supervisor_targets.push(Target::node(GENERAL));

    let mut builder = GraphBuilder::new()
        .set_entry(SUPERVISOR)
        .add_node(SUPERVISOR, SupervisorNode::new(deps.classifier.clone(), routes, GENERAL))
        .add_conditional_edges(SUPERVISOR, ConditionalEdge::by_routing_target(supervisor_targets));

    for domain in DOMAINS {
        builder = builder
            .add_node(
                domain.broker,
                BrokerNode::new(domain, deps.handles.clone(), deps.executor.registry()),
            )
            .add_conditional_edges(
                domain.broker,
                ConditionalEdge::new([ROUTE_TOOLS, ROUTE_NEXT], tools_or_next)
                    .route(ROUTE_TOOLS, domain.tools_node)
                    .route(ROUTE_NEXT, REFLECTION),
            )
            .add_node(domain.tools_node, ToolNode::new(deps.executor.clone(), domain.tools))
            .add_edge(domain.tools_node, domain.broker);
    }

    builder
        .add_node(REFLECTION, ReflectionNode::new(deps.judge.clone(), SUPERVISOR))
        .add_conditional_edges(
            REFLECTION,
            ConditionalEdge::by_routing_target([Target::node(SUPERVISOR), Target::End]),
        )
        .add_node(GENERAL, GeneralNode)
        .add_edge(GENERAL, END)
        .compile()
}
