use crate::error::{DagError, DagResult};
use crate::types::{Dag, DagNode, NodeStatus};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Classical DFS post-order topological sort (spec.md §4.4, "Simple
/// sort"). `unvisited → visiting → visited`; re-entering a `visiting`
/// node means the selector left a cycle behind — fatal, since that is a
/// bug in this crate rather than a condition a caller can act on.
pub fn simple_sort(dag: &mut Dag) -> DagResult<Vec<DagNode>> {
    for idx in dag.graph.node_indices() {
        dag.node_mut(idx).status = NodeStatus::Unvisited;
    }
    let mut order = Vec::with_capacity(dag.graph.node_count());
    let indices: Vec<NodeIndex> = dag.graph.node_indices().collect();
    for idx in indices {
        if dag.node(idx).status == NodeStatus::Unvisited {
            visit(dag, idx, &mut order)?;
        }
    }
    order.reverse();
    Ok(order.into_iter().map(|idx| dag.node(idx).clone()).collect())
}

fn visit(dag: &mut Dag, idx: NodeIndex, order: &mut Vec<NodeIndex>) -> DagResult<()> {
    match dag.node(idx).status {
        NodeStatus::Visited => return Ok(()),
        NodeStatus::Visiting => {
            return Err(DagError::unsorted_remainder(vec![dag.node(idx).key.clone()]))
        }
        _ => {}
    }
    dag.node_mut(idx).status = NodeStatus::Visiting;
    let deps: Vec<NodeIndex> = dag.graph.neighbors_directed(idx, Direction::Outgoing).collect();
    for dep in deps {
        visit(dag, dep, order)?;
    }
    dag.node_mut(idx).status = NodeStatus::Visited;
    order.push(idx);
    Ok(())
}

/// A ring of siblings under one parent, walked in FQN order (spec.md
/// §4.4, "Smart sort" step 1).
struct SiblingRing {
    ring: Vec<NodeIndex>,
    buildable_kids: usize,
}

/// Produce the same topological guarantees as [`simple_sort`] but biased
/// toward locality: siblings are emitted together in FQN order whenever
/// dependencies allow it, so the output reads like a hand-authored script
/// (spec.md §4.4, "Smart sort").
pub fn smart_sort(dag: &Dag) -> DagResult<Vec<DagNode>> {
    let all: Vec<NodeIndex> = dag.graph.node_indices().collect();
    let parent_of = |idx: NodeIndex| dag.node(idx).parent_fqn.clone();

    let mut children: HashMap<Option<String>, Vec<NodeIndex>> = HashMap::new();
    for &idx in &all {
        children.entry(parent_of(idx)).or_default().push(idx);
    }
    for kids in children.values_mut() {
        kids.sort_by(|a, b| dag.node(*a).fqn.cmp(&dag.node(*b).fqn));
    }

    let mut rings: HashMap<Option<String>, SiblingRing> = children
        .into_iter()
        .map(|(parent, ring)| (parent, SiblingRing { ring, buildable_kids: 0 }))
        .collect();

    let fqn_to_idx: HashMap<String, NodeIndex> = all.iter().map(|&idx| (dag.node(idx).fqn.clone(), idx)).collect();

    // dependents: reverse of the dependency edges (spec.md §4.4 step 2).
    let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    let mut remaining_deps: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
    for &idx in &all {
        let deps: HashSet<NodeIndex> = dag.graph.neighbors_directed(idx, Direction::Outgoing).collect();
        for &d in &deps {
            dependents.entry(d).or_default().push(idx);
        }
        remaining_deps.insert(idx, deps);
    }

    let mut buildable: HashSet<NodeIndex> = HashSet::new();
    for &idx in &all {
        mark_buildable(idx, &remaining_deps, &mut buildable, &mut rings, &parent_of);
    }

    let mut selected: HashSet<NodeIndex> = HashSet::new();
    let mut output = Vec::with_capacity(all.len());

    // Cursor position: which sibling ring we're in, and our index there.
    let mut cursor_parent: Option<String> = None;
    let mut cursor_pos: usize = 0;

    while selected.len() < all.len() {
        let found = advance_cursor(dag, &rings, &buildable, &fqn_to_idx, &mut cursor_parent, &mut cursor_pos);
        let Some(picked) = found else { break };

        selected.insert(picked);
        buildable.remove(&picked);
        output.push(picked);
        if let Some(ring) = rings.get_mut(&parent_of(picked)) {
            ring.buildable_kids = ring.buildable_kids.saturating_sub(1);
        }

        if let Some(deps) = dependents.remove(&picked) {
            for dependent in deps {
                if let Some(set) = remaining_deps.get_mut(&dependent) {
                    set.remove(&picked);
                }
                mark_buildable(dependent, &remaining_deps, &mut buildable, &mut rings, &parent_of);
            }
        }

        // Removing `picked` may have just made its own children buildable
        // (a child depends on its parent); descend into them next so the
        // output stays grouped by subtree (spec.md §4.4 step 4a).
        let picked_fqn = dag.node(picked).fqn.clone();
        if rings.get(&Some(picked_fqn.clone())).map(|r| r.buildable_kids > 0).unwrap_or(false) {
            cursor_parent = Some(picked_fqn);
            cursor_pos = 0;
        }
    }

    if selected.len() != all.len() {
        let remainder: Vec<String> = all
            .iter()
            .filter(|idx| !selected.contains(idx))
            .map(|&idx| dag.node(idx).key.clone())
            .collect();
        return Err(DagError::unsorted_remainder(remainder));
    }

    Ok(output.into_iter().map(|idx| dag.node(idx).clone()).collect())
}

fn mark_buildable(
    idx: NodeIndex,
    remaining_deps: &HashMap<NodeIndex, HashSet<NodeIndex>>,
    buildable: &mut HashSet<NodeIndex>,
    rings: &mut HashMap<Option<String>, SiblingRing>,
    parent_of: &dyn Fn(NodeIndex) -> Option<String>,
) {
    if remaining_deps.get(&idx).map(|s| s.is_empty()).unwrap_or(true) && buildable.insert(idx) {
        if let Some(ring) = rings.get_mut(&parent_of(idx)) {
            ring.buildable_kids += 1;
        }
    }
}

/// Minimal-displacement walk from the current cursor position to the
/// nearest buildable node (spec.md §4.4 step 4a): descend into buildable
/// children first, else scan siblings in ring order, else ascend.
fn advance_cursor(
    dag: &Dag,
    rings: &HashMap<Option<String>, SiblingRing>,
    buildable: &HashSet<NodeIndex>,
    fqn_to_idx: &HashMap<String, NodeIndex>,
    cursor_parent: &mut Option<String>,
    cursor_pos: &mut usize,
) -> Option<NodeIndex> {
    loop {
        let ring = rings.get(cursor_parent)?;
        if ring.ring.is_empty() {
            let (next_parent, next_pos) = ascend(dag, fqn_to_idx, cursor_parent)?;
            *cursor_parent = next_parent;
            *cursor_pos = next_pos;
            continue;
        }
        let len = ring.ring.len();
        let start = *cursor_pos % len;
        for step in 0..len {
            let pos = (start + step) % len;
            let candidate = ring.ring[pos];
            if buildable.contains(&candidate) {
                *cursor_pos = pos;
                return Some(candidate);
            }
        }
        let (next_parent, next_pos) = ascend(dag, fqn_to_idx, cursor_parent)?;
        *cursor_parent = next_parent;
        *cursor_pos = next_pos;
    }
}

/// Climb from the ring of `cursor_parent`'s children back to the ring
/// containing `cursor_parent` itself, i.e. one level up the object tree.
fn ascend(
    dag: &Dag,
    fqn_to_idx: &HashMap<String, NodeIndex>,
    cursor_parent: &Option<String>,
) -> Option<(Option<String>, usize)> {
    let fqn = cursor_parent.as_ref()?;
    let idx = *fqn_to_idx.get(fqn)?;
    Some((dag.node(idx).parent_fqn.clone(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuildType;
    use catalog::{DbObject, DependencyDelta, XmlElement};

    fn object(fqn: &str, parent: Option<&str>) -> DbObject {
        DbObject {
            fqn: fqn.to_string(),
            pqn: None,
            obj_type: "table".to_string(),
            key_attr: "fqn".to_string(),
            parent_fqn: parent.map(str::to_string),
            visit: false,
            cycle_breaker_type: None,
            contents_type: None,
            contents: XmlElement::new("dbobject"),
            contexts: Vec::new(),
            declared_deps: Vec::new(),
            diff: None,
            extra_deps: DependencyDelta::default(),
        }
    }

    #[test]
    fn simple_sort_orders_dependencies_before_dependents() {
        let mut dag = Dag::new();
        let a = dag.insert_node(DagNode::from_object(BuildType::Build, &object("a", None))).unwrap();
        let b = dag.insert_node(DagNode::from_object(BuildType::Build, &object("b", None))).unwrap();
        dag.graph.add_edge(a, b, crate::types::DagEdge);

        let order = simple_sort(&mut dag).expect("sort");
        let pos_a = order.iter().position(|n| n.fqn == "a").unwrap();
        let pos_b = order.iter().position(|n| n.fqn == "b").unwrap();
        assert!(pos_b < pos_a, "b must be emitted before a since a depends on b");
    }

    #[test]
    fn simple_sort_detects_leftover_cycle_as_fatal() {
        let mut dag = Dag::new();
        let a = dag.insert_node(DagNode::from_object(BuildType::Build, &object("a", None))).unwrap();
        let b = dag.insert_node(DagNode::from_object(BuildType::Build, &object("b", None))).unwrap();
        dag.graph.add_edge(a, b, crate::types::DagEdge);
        dag.graph.add_edge(b, a, crate::types::DagEdge);

        let err = simple_sort(&mut dag).unwrap_err();
        assert!(matches!(err, DagError::UnsortedRemainder { .. }));
    }

    #[test]
    fn smart_sort_respects_dependency_order_and_groups_siblings() {
        let mut dag = Dag::new();
        let schema = dag
            .insert_node(DagNode::from_object(BuildType::Build, &object("s", None)))
            .unwrap();
        let t1 = dag
            .insert_node(DagNode::from_object(BuildType::Build, &object("s.t1", Some("s"))))
            .unwrap();
        let t2 = dag
            .insert_node(DagNode::from_object(BuildType::Build, &object("s.t2", Some("s"))))
            .unwrap();
        dag.graph.add_edge(t1, schema, crate::types::DagEdge);
        dag.graph.add_edge(t2, schema, crate::types::DagEdge);

        let order = smart_sort(&dag).expect("smart sort");
        assert_eq!(order.len(), 3);
        let pos = |fqn: &str| order.iter().position(|n| n.fqn == fqn).unwrap();
        assert!(pos("s") < pos("s.t1"));
        assert!(pos("s") < pos("s.t2"));
    }

    #[test]
    fn smart_sort_detects_leftover_cycle_as_fatal() {
        let mut dag = Dag::new();
        let a = dag.insert_node(DagNode::from_object(BuildType::Build, &object("a", None))).unwrap();
        let b = dag.insert_node(DagNode::from_object(BuildType::Build, &object("b", None))).unwrap();
        dag.graph.add_edge(a, b, crate::types::DagEdge);
        dag.graph.add_edge(b, a, crate::types::DagEdge);

        let err = smart_sort(&dag).unwrap_err();
        assert!(matches!(err, DagError::UnsortedRemainder { .. }));
    }
}
