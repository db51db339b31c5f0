//! 图类型定义
//!
//! 路由目标、边定义（固定边 / 条件边）与图结构错误

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::state::ConversationState;

/// 终止标记对应的路由键
pub const END: &str = "__end__";

pub type NodeName = String;

/// 路由目标：某个已注册节点，或终止
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Node(NodeName),
    End,
}

impl Target {
    pub fn node(name: impl Into<NodeName>) -> Self {
        Target::Node(name.into())
    }

    /// 用作条件边路由键的字符串形式
    pub fn key(&self) -> &str {
        match self {
            Target::Node(name) => name,
            Target::End => END,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Target::End)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        if s == END {
            Target::End
        } else {
            Target::Node(s.to_string())
        }
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Target::from(s.as_str())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 条件边谓词：根据当前状态计算路由键
pub type RoutePredicate = Arc<dyn Fn(&ConversationState) -> String + Send + Sync>;

/// 条件边：声明谓词可能产生的全部路由键，以及键到后继的映射
#[derive(Clone)]
pub struct ConditionalEdge {
    pub(crate) keys: Vec<String>,
    pub(crate) predicate: RoutePredicate,
    pub(crate) mapping: HashMap<String, Target>,
}

impl ConditionalEdge {
    /// keys 是谓词的封闭取值集合；编译期检查每个键都有映射
    pub fn new<K, F>(keys: impl IntoIterator<Item = K>, predicate: F) -> Self
    where
        K: Into<String>,
        F: Fn(&ConversationState) -> String + Send + Sync + 'static,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            predicate: Arc::new(predicate),
            mapping: HashMap::new(),
        }
    }

    /// 添加一条 键 -> 后继 映射
    pub fn route(mut self, key: impl Into<String>, target: impl Into<Target>) -> Self {
        self.mapping.insert(key.into(), target.into());
        self
    }

    /// 按状态中的 routing_target 路由：每个候选目标的键映射到它自身
    pub fn by_routing_target(targets: impl IntoIterator<Item = Target>) -> Self {
        let targets: Vec<Target> = targets.into_iter().collect();
        let keys: Vec<String> = targets.iter().map(|t| t.key().to_string()).collect();
        let mut edge = Self::new(keys, |state: &ConversationState| {
            state.routing_target().key().to_string()
        });
        for target in targets {
            edge = edge.route(target.key().to_string(), target);
        }
        edge
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("keys", &self.keys)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

/// 节点的出边定义
#[derive(Debug, Clone)]
pub enum EdgeSpec {
    Fixed(Target),
    Conditional(ConditionalEdge),
}

/// 图结构错误（编译期）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),
    #[error("Entry point not set")]
    MissingEntry,
    #[error("Entry point '{0}' is not a registered node")]
    UnknownEntry(String),
    #[error("Edge {from} -> {to} references an unknown node")]
    UnknownNode { from: String, to: String },
    #[error("Node '{0}' has no outgoing edge")]
    MissingEdge(String),
    #[error("Node '{0}' has more than one outgoing edge")]
    DuplicateEdge(String),
    #[error("Conditional edge from '{0}' declares no route keys")]
    EmptyRouteKeys(String),
    #[error("Route key '{key}' of node '{node}' has no mapped successor")]
    UnmappedRouteKey { node: String, key: String },
    #[error("Nodes unreachable from entry: {0:?}")]
    Unreachable(Vec<String>),
}
