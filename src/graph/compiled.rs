//! 编译后的只读图
//!
//! 节点按下标存放处理器；边在编译时已解析为下标，执行期不再按名字查找。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::graph::node::Node;
use crate::graph::types::{RoutePredicate, Target};

/// 已解析的后继：节点下标或终止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Node(usize),
    End,
}

pub(crate) enum CompiledEdge {
    Fixed(Step),
    Conditional {
        predicate: RoutePredicate,
        mapping: HashMap<String, Step>,
    },
}

impl CompiledEdge {
    pub(crate) fn successors(&self) -> Vec<Step> {
        match self {
            CompiledEdge::Fixed(step) => vec![*step],
            CompiledEdge::Conditional { mapping, .. } => mapping.values().copied().collect(),
        }
    }
}

pub(crate) struct CompiledNode {
    pub(crate) name: String,
    pub(crate) handler: Arc<dyn Node>,
    pub(crate) edge: CompiledEdge,
}

/// 通过结构校验的图，可在多个会话间共享（Arc）
pub struct CompiledGraph {
    pub(crate) nodes: Vec<CompiledNode>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) entry: usize,
}

impl CompiledGraph {
    /// 入口节点名
    pub fn entry(&self) -> &str {
        &self.nodes[self.entry].name
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 某节点所有可能的后继（用于检查图结构）
    pub fn successors(&self, name: &str) -> Vec<Target> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut targets: Vec<Target> = self.nodes[idx]
            .edge
            .successors()
            .into_iter()
            .map(|s| self.target_of(s))
            .collect();
        targets.sort_by(|a, b| a.key().cmp(b.key()));
        targets.dedup();
        targets
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn node(&self, idx: usize) -> &CompiledNode {
        &self.nodes[idx]
    }

    pub(crate) fn target_of(&self, step: Step) -> Target {
        match step {
            Step::Node(idx) => Target::Node(self.nodes[idx].name.clone()),
            Step::End => Target::End,
        }
    }

    /// 目标是否合法：已注册节点或终止
    pub(crate) fn is_valid_target(&self, target: &Target) -> bool {
        match target {
            Target::Node(name) => self.contains(name),
            Target::End => true,
        }
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry())
            .field("nodes", &self.node_names())
            .finish()
    }
}
