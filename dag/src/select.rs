use crate::error::{DagError, DagResult};
use crate::types::{Dag, DagEdge, DagNode, NodeStatus};
use petgraph::graph::NodeIndex;

/// Signals a cycle unwinding back through the call stack (spec.md §4.3,
/// "Algorithm"). Not a [`DagError`] itself: most of the time it is caught
/// by an ancestor frame and resolved with an alternative or a breaker;
/// only the outermost, un-caught case becomes a fatal [`DagError`].
struct Cyclic {
    path: Vec<NodeIndex>,
}

impl Cyclic {
    fn new(n: NodeIndex) -> Self {
        Self { path: vec![n] }
    }

    fn extend(mut self, n: NodeIndex) -> Self {
        self.path.push(n);
        self
    }
}

/// Convert the DAG-candidate graph into a true DAG by resolving every
/// [`crate::types::PendingDepSet`] to a single `actual` edge (or a union,
/// for non-optional sets), introducing breaker nodes where a cycle has no
/// other way out (spec.md §4.3).
pub fn select(dag: &mut Dag) -> DagResult<()> {
    // A node whose dagify call unwinds on an uncaught cycle is reset to
    // Unvisited so a later pass can re-examine it once an ancestor has
    // introduced a breaker (spec.md §4.3, "A retry loop allows
    // visited_once to be re-examined after a breaker is introduced").
    loop {
        let next = dag
            .graph
            .node_indices()
            .find(|&idx| dag.node(idx).status == NodeStatus::Unvisited);
        let Some(idx) = next else { break };
        if let Err(cyclic) = dagify(dag, idx) {
            return Err(DagError::cycle(
                cyclic.path.iter().map(|i| dag.node(*i).key.clone()).collect(),
            ));
        }
    }
    materialize_edges(dag);
    Ok(())
}

fn dagify(dag: &mut Dag, n: NodeIndex) -> Result<NodeIndex, Cyclic> {
    match dag.node(n).status {
        NodeStatus::Visiting => return Err(Cyclic::new(n)),
        NodeStatus::VisitedOnce | NodeStatus::Visited => return Ok(n),
        _ => {}
    }
    dag.node_mut(n).status = NodeStatus::Visiting;

    // Work from a clone so an early abort can leave the original pending
    // entry untouched for a later retry pass.
    let dep_sets = dag.pending.get(&n).cloned().unwrap_or_default();
    let mut resolved = Vec::with_capacity(dep_sets.len());

    for mut dep_set in dep_sets {
        if dep_set.actual.is_some() {
            resolved.push(dep_set);
            continue;
        }
        if dep_set.is_optional {
            let mut chosen = None;
            for candidate in &dep_set.candidates {
                match dagify(dag, *candidate) {
                    Ok(resolved_idx) => {
                        chosen = Some(resolved_idx);
                        break;
                    }
                    Err(_) => continue,
                }
            }
            dep_set.actual = chosen;
        } else {
            // A non-optional (is_set) DepSet requires every member to
            // resolve; a member that closes a cycle back onto `n` is
            // kept as a real edge, but `n` also gains a breaker
            // stand-in and that member's own edge back to `n` is
            // redirected onto the breaker, if `n` carries a
            // cycle_breaker_type — otherwise the whole pass aborts with
            // the cycle path.
            let candidates = dep_set.candidates.clone();
            let mut resolved_members = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                match dagify(dag, candidate) {
                    Ok(resolved_idx) => resolved_members.push(resolved_idx),
                    Err(cyclic) => {
                        if let Some(breaker_type) = dag.node(n).cycle_breaker_type.clone() {
                            // n's real dependency on `candidate` is kept
                            // (X→Y survives); n additionally depends on
                            // its own breaker stand-in (X→Xbreak).
                            let breaker_idx = spawn_breaker(dag, n, &breaker_type);
                            resolved_members.push(candidate);
                            resolved_members.push(breaker_idx);
                            // `cyclic.path[1]` is the node whose pending
                            // dependency closed the cycle directly back
                            // onto n; redirect that edge onto the
                            // breaker instead (Y→X becomes Y→Xbreak) so
                            // it no longer needs n to resolve.
                            if let Some(&closer) = cyclic.path.get(1) {
                                redirect_pending(dag, closer, n, breaker_idx);
                            }
                        } else {
                            dag.node_mut(n).status = NodeStatus::Unvisited;
                            return Err(cyclic.extend(n));
                        }
                    }
                }
            }
            dep_set.candidates = resolved_members;
        }
        resolved.push(dep_set);
    }

    dag.pending.insert(n, resolved);
    dag.node_mut(n).status = NodeStatus::VisitedOnce;
    Ok(n)
}

/// Clone `n` under its `cycle_breaker_type`, carrying every dependency `n`
/// already resolved except the one that closed the cycle being broken
/// (spec.md §4.3, "Breaker semantics"). The breaker has no pending
/// dependencies of its own left to resolve because it is only ever a
/// target, never re-entered by `dagify`.
fn spawn_breaker(dag: &mut Dag, n: NodeIndex, breaker_type: &str) -> NodeIndex {
    let source = dag.node(n);
    let mut breaker = DagNode {
        key: format!("breaker.{}.{}", breaker_type, source.fqn),
        build_type: crate::types::BuildType::Breaker,
        fqn: source.fqn.clone(),
        pqn: source.pqn.clone(),
        obj_type: breaker_type.to_string(),
        parent_fqn: source.parent_fqn.clone(),
        visit: false,
        contexts: Vec::new(),
        cycle_breaker_type: None,
        status: NodeStatus::VisitedOnce,
        breaker_for: Some(source.key.clone()),
    };
    // disambiguate on repeated breaks of the same node
    let mut suffix = 1;
    while dag.byfqn.contains_key(&breaker.key) {
        suffix += 1;
        breaker.key = format!("breaker.{}.{}.{}", breaker_type, dag.node(n).fqn, suffix);
    }
    let idx = dag.graph.add_node(breaker);
    let key = dag.node(idx).key.clone();
    dag.byfqn.insert(key, idx);
    idx
}

/// Rewrite every pending dependency of `node` that targets `old` to
/// target `new` instead (spec.md §4.3, "Y→X becomes Y→Xbreak"). `node`'s
/// own `dagify` call has already unwound and left its pending entry
/// untouched, so this is the only chance to retarget it before the
/// retry pass in [`select`] re-examines `node`.
fn redirect_pending(dag: &mut Dag, node: NodeIndex, old: NodeIndex, new: NodeIndex) {
    if let Some(sets) = dag.pending.get_mut(&node) {
        for set in sets {
            for candidate in &mut set.candidates {
                if *candidate == old {
                    *candidate = new;
                }
            }
            if set.actual == Some(old) {
                set.actual = Some(new);
            }
        }
    }
}

/// Replace every resolved [`crate::types::PendingDepSet`] with real graph
/// edges: `actual` for optional sets, every candidate for non-optional
/// ones (spec.md §4.3, "`is_set` DepSets ... union all resolved Deps").
fn materialize_edges(dag: &mut Dag) {
    let pending = std::mem::take(&mut dag.pending);
    for (n, sets) in pending {
        for set in sets {
            if set.is_optional {
                if let Some(actual) = set.actual {
                    dag.graph.add_edge(n, actual, DagEdge);
                }
            } else {
                for candidate in set.candidates {
                    dag.graph.add_edge(n, candidate, DagEdge);
                }
            }
        }
    }
}
