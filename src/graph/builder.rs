//! 图构建器
//!
//! 提供流畅的 API 声明节点与边；compile 时一次性完成结构校验：
//! 名字唯一、入口存在、每个节点恰有一条出边定义、边目标已注册、条件边键全覆盖、全部节点可达。

use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::compiled::{CompiledEdge, CompiledGraph, CompiledNode, Step};
use crate::graph::node::Node;
use crate::graph::types::*;

/// 图构建器
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<(NodeName, Arc<dyn Node>)>,
    entry: Option<NodeName>,
    edges: Vec<(NodeName, EdgeSpec)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点
    pub fn add_node(mut self, name: impl Into<NodeName>, node: impl Node + 'static) -> Self {
        self.nodes.push((name.into(), Arc::new(node)));
        self
    }

    /// 设置入口节点
    pub fn set_entry(mut self, name: impl Into<NodeName>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// 固定边：from 执行完后总是进入 to
    pub fn add_edge(mut self, from: impl Into<NodeName>, to: impl Into<Target>) -> Self {
        self.edges.push((from.into(), EdgeSpec::Fixed(to.into())));
        self
    }

    /// 条件边：from 执行完后按谓词结果选择后继
    pub fn add_conditional_edges(mut self, from: impl Into<NodeName>, edge: ConditionalEdge) -> Self {
        self.edges.push((from.into(), EdgeSpec::Conditional(edge)));
        self
    }

    /// 校验并编译
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let mut index: HashMap<NodeName, usize> = HashMap::new();
        for (i, (name, _)) in self.nodes.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(GraphError::DuplicateNode(name.clone()));
            }
        }

        let entry_name = self.entry.ok_or(GraphError::MissingEntry)?;
        let entry = *index
            .get(&entry_name)
            .ok_or_else(|| GraphError::UnknownEntry(entry_name.clone()))?;

        let mut specs: Vec<Option<EdgeSpec>> = (0..self.nodes.len()).map(|_| None).collect();
        for (from, spec) in self.edges {
            let Some(&i) = index.get(&from) else {
                return Err(GraphError::UnknownNode {
                    from,
                    to: describe_targets(&spec),
                });
            };
            if specs[i].is_some() {
                return Err(GraphError::DuplicateEdge(from));
            }
            specs[i] = Some(spec);
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for ((name, handler), spec) in self.nodes.into_iter().zip(specs) {
            let spec = spec.ok_or_else(|| GraphError::MissingEdge(name.clone()))?;
            let edge = match spec {
                EdgeSpec::Fixed(target) => CompiledEdge::Fixed(resolve(&index, &name, &target)?),
                EdgeSpec::Conditional(cond) => {
                    if cond.keys.is_empty() {
                        return Err(GraphError::EmptyRouteKeys(name));
                    }
                    let mut mapping = HashMap::new();
                    for key in &cond.keys {
                        let target = cond.mapping.get(key).ok_or_else(|| GraphError::UnmappedRouteKey {
                            node: name.clone(),
                            key: key.clone(),
                        })?;
                        mapping.insert(key.clone(), resolve(&index, &name, target)?);
                    }
                    CompiledEdge::Conditional {
                        predicate: cond.predicate,
                        mapping,
                    }
                }
            };
            nodes.push(CompiledNode { name, handler, edge });
        }

        check_reachable(&nodes, entry)?;

        Ok(CompiledGraph { nodes, index, entry })
    }
}

fn resolve(index: &HashMap<NodeName, usize>, from: &str, target: &Target) -> Result<Step, GraphError> {
    match target {
        Target::End => Ok(Step::End),
        Target::Node(name) => index
            .get(name)
            .map(|&i| Step::Node(i))
            .ok_or_else(|| GraphError::UnknownNode {
                from: from.to_string(),
                to: name.clone(),
            }),
    }
}

fn describe_targets(spec: &EdgeSpec) -> String {
    match spec {
        EdgeSpec::Fixed(target) => target.to_string(),
        EdgeSpec::Conditional(cond) => {
            let mut keys: Vec<&str> = cond.mapping.values().map(|t| t.key()).collect();
            keys.sort_unstable();
            keys.join("|")
        }
    }
}

/// 从入口做 DFS，固定边与条件边的全部映射目标都算可达
fn check_reachable(nodes: &[CompiledNode], entry: usize) -> Result<(), GraphError> {
    let mut seen = vec![false; nodes.len()];
    let mut stack = vec![entry];
    while let Some(i) = stack.pop() {
        if seen[i] {
            continue;
        }
        seen[i] = true;
        for step in nodes[i].edge.successors() {
            if let Step::Node(next) = step {
                if !seen[next] {
                    stack.push(next);
                }
            }
        }
    }

    let mut orphans: Vec<String> = nodes
        .iter()
        .zip(&seen)
        .filter(|(_, reached)| !**reached)
        .map(|(n, _)| n.name.clone())
        .collect();
    if orphans.is_empty() {
        Ok(())
    } else {
        orphans.sort();
        Err(GraphError::Unreachable(orphans))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::NodeError;
    use crate::graph::{ConversationState, StateDelta};

    struct Noop;

    #[async_trait]
    impl Node for Noop {
        async fn run(&self, _state: &ConversationState) -> Result<StateDelta, NodeError> {
            Ok(StateDelta::new())
        }
    }

    fn yes_no() -> ConditionalEdge {
        ConditionalEdge::new(["yes", "no"], |_: &ConversationState| "yes".to_string())
    }

    #[test]
    fn test_compile_valid_graph() {
        let graph = GraphBuilder::new()
            .add_node("a", Noop)
            .add_node("b", Noop)
            .set_entry("a")
            .add_conditional_edges("a", yes_no().route("yes", "b").route("no", END))
            .add_edge("b", "a")
            .compile()
            .expect("graph should compile");

        assert_eq!(graph.entry(), "a");
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.successors("a"), vec![Target::End, Target::node("b")]);
    }

    #[test]
    fn test_orphan_node_fails() {
        let result = GraphBuilder::new()
            .add_node("a", Noop)
            .add_node("orphan", Noop)
            .set_entry("a")
            .add_edge("a", END)
            .add_edge("orphan", "a")
            .compile();

        assert_eq!(result.unwrap_err(), GraphError::Unreachable(vec!["orphan".to_string()]));
    }

    #[test]
    fn test_incomplete_mapping_fails() {
        let result = GraphBuilder::new()
            .add_node("a", Noop)
            .add_node("b", Noop)
            .set_entry("a")
            .add_conditional_edges("a", yes_no().route("yes", "b"))
            .add_edge("b", END)
            .compile();

        assert_eq!(
            result.unwrap_err(),
            GraphError::UnmappedRouteKey {
                node: "a".to_string(),
                key: "no".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_node_fails() {
        let result = GraphBuilder::new()
            .add_node("a", Noop)
            .add_node("a", Noop)
            .set_entry("a")
            .add_edge("a", END)
            .compile();
        assert_eq!(result.unwrap_err(), GraphError::DuplicateNode("a".to_string()));
    }

    #[test]
    fn test_missing_and_unknown_entry() {
        let missing = GraphBuilder::new().add_node("a", Noop).add_edge("a", END).compile();
        assert_eq!(missing.unwrap_err(), GraphError::MissingEntry);

        let unknown = GraphBuilder::new()
            .add_node("a", Noop)
            .set_entry("zzz")
            .add_edge("a", END)
            .compile();
        assert_eq!(unknown.unwrap_err(), GraphError::UnknownEntry("zzz".to_string()));
    }

    #[test]
    fn test_edge_to_unknown_node_fails() {
        let result = GraphBuilder::new()
            .add_node("a", Noop)
            .set_entry("a")
            .add_edge("a", "ghost")
            .compile();
        assert_eq!(
            result.unwrap_err(),
            GraphError::UnknownNode {
                from: "a".to_string(),
                to: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_missing_and_duplicate_edges() {
        let missing = GraphBuilder::new()
            .add_node("a", Noop)
            .add_node("b", Noop)
            .set_entry("a")
            .add_edge("a", "b")
            .compile();
        assert_eq!(missing.unwrap_err(), GraphError::MissingEdge("b".to_string()));

        let duplicate = GraphBuilder::new()
            .add_node("a", Noop)
            .set_entry("a")
            .add_edge("a", END)
            .add_edge("a", END)
            .compile();
        assert_eq!(duplicate.unwrap_err(), GraphError::DuplicateEdge("a".to_string()));
    }

    #[test]
    fn test_empty_route_keys_fails() {
        let result = GraphBuilder::new()
            .add_node("a", Noop)
            .set_entry("a")
            .add_conditional_edges(
                "a",
                ConditionalEdge::new(Vec::<String>::new(), |_: &ConversationState| String::new()),
            )
            .compile();
        assert_eq!(result.unwrap_err(), GraphError::EmptyRouteKeys("a".to_string()));
    }
}
