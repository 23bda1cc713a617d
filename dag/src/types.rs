use catalog::{ContextDecl, DbObject};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// The operation a [`DagNode`] represents (spec.md §3).
///
/// `Rebuild`, `DiffPrep`, `DiffComplete`, `Fallback` and `EndFallback` are
/// carried as part of the domain because the output plan format (spec.md
/// §6) names them as legal `action` values a downstream consumer may see
/// from other producers, but this DAG builder never constructs a node
/// with one of those five build types itself — a `rebuild` classification
/// always expands to a `Drop` node followed by a `Build` node (§4.2), and
/// the remaining three are reserved for multi-phase builds this core does
/// not attempt (spec.md §1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildType {
    Build,
    Drop,
    Diff,
    Exists,
    Rebuild,
    Arrive,
    Depart,
    DiffPrep,
    DiffComplete,
    Fallback,
    EndFallback,
    Breaker,
}

impl BuildType {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::Build => "build",
            BuildType::Drop => "drop",
            BuildType::Diff => "diff",
            BuildType::Exists => "exists",
            BuildType::Rebuild => "rebuild",
            BuildType::Arrive => "arrive",
            BuildType::Depart => "depart",
            BuildType::DiffPrep => "diffprep",
            BuildType::DiffComplete => "diffcomplete",
            BuildType::Fallback => "fallback",
            BuildType::EndFallback => "endfallback",
            BuildType::Breaker => "breaker",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `<build_type>.<fqn>` — the unique key of a [`DagNode`] (spec.md §3).
pub fn dag_key(build_type: BuildType, fqn: &str) -> String {
    format!("{}.{}", build_type.as_str(), fqn)
}

/// Where a [`DagNode`] sits in the selector's state machine (spec.md §3,
/// §4.3) and the sorter's bookkeeping (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Unvisited,
    Visiting,
    VisitedOnce,
    Visited,
    Buildable,
    Selected,
}

/// The scheduling unit (spec.md §3, "DagNode").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagNode {
    pub key: String,
    pub build_type: BuildType,
    pub fqn: String,
    pub pqn: Option<String>,
    pub obj_type: String,
    pub parent_fqn: Option<String>,
    pub visit: bool,
    pub contexts: Vec<ContextDecl>,
    pub cycle_breaker_type: Option<String>,
    pub status: NodeStatus,
    /// Set on a synthetic breaker node: the key of the node it stands in
    /// for (spec.md §4.3, "Breaker semantics").
    pub breaker_for: Option<String>,
}

impl DagNode {
    pub fn from_object(build_type: BuildType, object: &DbObject) -> Self {
        Self {
            key: dag_key(build_type, &object.fqn),
            build_type,
            fqn: object.fqn.clone(),
            pqn: object.pqn.clone(),
            obj_type: object.obj_type.clone(),
            parent_fqn: object.parent_fqn.clone(),
            visit: object.visit,
            contexts: object.contexts.clone(),
            cycle_breaker_type: object.cycle_breaker_type.clone(),
            status: NodeStatus::Unvisited,
            breaker_for: None,
        }
    }
}

/// A candidate dependency edge resolved to concrete node indices but not
/// yet collapsed to a single choice (spec.md §3, "DepSet").
///
/// `is_optional` sets try each candidate as an alternative until one
/// survives `dagify` (§4.3); non-optional sets require every candidate to
/// resolve and union all of them into the node's effective dep list.
#[derive(Debug, Clone)]
pub struct PendingDepSet {
    pub candidates: Vec<NodeIndex>,
    pub is_optional: bool,
    /// Filled in by the selector once an optional set has chosen its
    /// single surviving candidate.
    pub actual: Option<NodeIndex>,
}

/// No extra edge payload is carried — edges are plain ordering
/// constraints (spec.md §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct DagEdge;

/// `(build_type, source DbObject)` scheduling graph (spec.md §3).
///
/// A single owning arena (`graph`) with non-owning cross references
/// everywhere else (`byfqn`, `bypqn`, `pending`), per the Design Note in
/// spec.md §9 on cyclic ownership.
#[derive(Debug)]
pub struct Dag {
    pub graph: DiGraph<DagNode, DagEdge>,
    pub byfqn: HashMap<String, NodeIndex>,
    pub bypqn: HashMap<String, Vec<NodeIndex>>,
    pub pending: HashMap<NodeIndex, Vec<PendingDepSet>>,
}

impl Dag {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            byfqn: HashMap::new(),
            bypqn: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn insert_node(&mut self, node: DagNode) -> crate::error::DagResult<NodeIndex> {
        let key = node.key.clone();
        if self.byfqn.contains_key(&key) {
            return Err(crate::error::DagError::duplicate_node(&key));
        }
        let pqn = node.pqn.clone();
        let build_type = node.build_type;
        let idx = self.graph.add_node(node);
        self.byfqn.insert(key, idx);
        if let Some(pqn) = pqn {
            self.bypqn
                .entry(dag_key(build_type, &pqn))
                .or_default()
                .push(idx);
        }
        Ok(idx)
    }

    pub fn get(&self, key: &str) -> Option<NodeIndex> {
        self.byfqn.get(key).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &DagNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut DagNode {
        &mut self.graph[idx]
    }
}

impl Default for Dag {
    fn default() -> Self {
        Self::new()
    }
}
