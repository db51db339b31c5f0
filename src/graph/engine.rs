//! 执行引擎
//!
//! 有限状态机：按 routing_target 派发节点 -> 应用增量 -> 解析出边 -> 下一步，直到 END。
//! 总派发次数受 max_steps 约束；每一步在取消令牌上竞速，取消时丢弃未完成的节点 future，增量不会被部分应用。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::EngineError;
use crate::graph::compiled::{CompiledEdge, CompiledGraph, Step};
use crate::graph::state::ConversationState;
use crate::graph::types::Target;

/// 默认步数上限
pub const DEFAULT_MAX_STEPS: usize = 50;

/// 一次完整执行的结果
#[derive(Debug)]
pub struct RunOutcome {
    pub state: ConversationState,
    /// 实际派发的节点次数
    pub steps: usize,
}

/// 执行引擎：持有只读的编译图与步数上限，可被多个会话并发使用
#[derive(Clone)]
pub struct ExecutionEngine {
    graph: Arc<CompiledGraph>,
    max_steps: usize,
}

impl ExecutionEngine {
    pub fn new(graph: Arc<CompiledGraph>, max_steps: usize) -> Self {
        Self {
            graph,
            max_steps: max_steps.max(1),
        }
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// 执行直到 routing_target 为 END；超过 max_steps 次派发仍未结束则返回 NoProgress
    pub async fn run(
        &self,
        mut state: ConversationState,
        cancel_token: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let mut current = match state.routing_target() {
            Target::End => return Ok(RunOutcome { state, steps: 0 }),
            Target::Node(name) => self.graph.index_of(name).ok_or_else(|| EngineError::InvalidRoute {
                node: "<start>".to_string(),
                target: name.clone(),
            })?,
        };

        for step in 1..=self.max_steps {
            let node = self.graph.node(current);
            tracing::debug!(step, node = %node.name, "dispatch");

            let delta = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    tracing::info!(step, node = %node.name, "cancelled before node finished");
                    return Err(EngineError::Cancelled);
                }
                result = node.handler.run(&state) => result.map_err(|source| EngineError::Node {
                    node: node.name.clone(),
                    source,
                })?,
            };

            if let Some(route) = &delta.route {
                if !self.graph.is_valid_target(route) {
                    return Err(EngineError::InvalidRoute {
                        node: node.name.clone(),
                        target: route.to_string(),
                    });
                }
            }
            state.apply(delta);

            let next = match &node.edge {
                CompiledEdge::Fixed(next) => *next,
                CompiledEdge::Conditional { predicate, mapping } => {
                    let key = predicate(&state);
                    *mapping.get(&key).ok_or_else(|| EngineError::UnmappedRoute {
                        node: node.name.clone(),
                        key: key.clone(),
                    })?
                }
            };

            let target = self.graph.target_of(next);
            tracing::debug!(step, from = %node.name, to = %target, "route");
            state.set_routing_target(target);

            match next {
                Step::End => return Ok(RunOutcome { state, steps: step }),
                Step::Node(idx) => current = idx,
            }
        }

        Err(EngineError::NoProgress {
            max_steps: self.max_steps,
            last_node: self.graph.node(current).name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::NodeError;
    use crate::graph::{ConditionalEdge, GraphBuilder, Node, StateDelta, END};
    use crate::memory::Message;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Node for Counting {
        async fn run(&self, _state: &ConversationState) -> Result<StateDelta, NodeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StateDelta::new().message(Message::assistant(format!("step {n}"))))
        }
    }

    struct Failing;

    #[async_trait]
    impl Node for Failing {
        async fn run(&self, _state: &ConversationState) -> Result<StateDelta, NodeError> {
            Err(NodeError::Llm("boom".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl Node for Slow {
        async fn run(&self, _state: &ConversationState) -> Result<StateDelta, NodeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(StateDelta::new().message(Message::assistant("late")))
        }
    }

    struct RouteTo(&'static str);

    #[async_trait]
    impl Node for RouteTo {
        async fn run(&self, _state: &ConversationState) -> Result<StateDelta, NodeError> {
            Ok(StateDelta::new().route(self.0))
        }
    }

    #[tokio::test]
    async fn test_step_ceiling_is_exact() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = GraphBuilder::new()
            .add_node("a", Counting { calls: calls.clone() })
            .add_node("b", Counting { calls: calls.clone() })
            .set_entry("a")
            .add_edge("a", "b")
            .add_edge("b", "a")
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 50);

        let err = engine
            .run(ConversationState::seeded("loop", "a"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoProgress { max_steps: 50, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_terminates_on_last_allowed_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = GraphBuilder::new()
            .add_node("a", Counting { calls: calls.clone() })
            .add_node("b", Counting { calls: calls.clone() })
            .set_entry("a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 2);

        let outcome = engine
            .run(ConversationState::seeded("hi", "a"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.state.messages().len(), 3);
        assert!(outcome.state.routing_target().is_end());
    }

    #[tokio::test]
    async fn test_predicate_evaluated_once_per_conditional_visit() {
        let node_calls = Arc::new(AtomicUsize::new(0));
        let predicate_calls = Arc::new(AtomicUsize::new(0));
        let counter = predicate_calls.clone();
        let edge = ConditionalEdge::new(["again", "done"], move |state: &ConversationState| {
            counter.fetch_add(1, Ordering::SeqCst);
            if state.messages().len() >= 4 {
                "done".to_string()
            } else {
                "again".to_string()
            }
        })
        .route("again", "fixed")
        .route("done", END);

        let graph = GraphBuilder::new()
            .add_node("cond", Counting { calls: node_calls.clone() })
            .add_node("fixed", Counting { calls: node_calls.clone() })
            .set_entry("cond")
            .add_conditional_edges("cond", edge)
            .add_edge("fixed", "cond")
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 10);

        let outcome = engine
            .run(ConversationState::seeded("hi", "cond"), &CancellationToken::new())
            .await
            .unwrap();

        // cond(2 msgs) -> fixed(3) -> cond(4) -> END
        assert_eq!(outcome.steps, 3);
        assert_eq!(predicate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_node_error_is_wrapped() {
        let graph = GraphBuilder::new()
            .add_node("broken", Failing)
            .set_entry("broken")
            .add_edge("broken", END)
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 5);

        let err = engine
            .run(ConversationState::seeded("hi", "broken"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            EngineError::Node { node, source } => {
                assert_eq!(node, "broken");
                assert!(source.to_string().contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_node() {
        let graph = GraphBuilder::new()
            .add_node("slow", Slow)
            .set_entry("slow")
            .add_edge("slow", END)
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 5);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = engine
            .run(ConversationState::seeded("hi", "slow"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[tokio::test]
    async fn test_invalid_route_rejected() {
        let graph = GraphBuilder::new()
            .add_node("a", RouteTo("nowhere"))
            .set_entry("a")
            .add_edge("a", END)
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 5);

        let err = engine
            .run(ConversationState::seeded("hi", "a"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRoute { .. }));
    }

    #[tokio::test]
    async fn test_undeclared_predicate_key_is_reported() {
        let edge = ConditionalEdge::new(["x"], |_: &ConversationState| "y".to_string()).route("x", END);
        let graph = GraphBuilder::new()
            .add_node("a", RouteTo(END))
            .set_entry("a")
            .add_conditional_edges("a", edge)
            .compile()
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(graph), 5);

        let err = engine
            .run(ConversationState::seeded("hi", "a"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnmappedRoute { ref key, .. } if key == "y"));
    }
}
