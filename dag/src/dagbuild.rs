use crate::error::{DagError, DagResult};
use crate::types::{dag_key, BuildType, Dag, DagNode, PendingDepSet};
use catalog::{DbObject, DepSet, DepTarget, DiffKind, ObjectTree};
use common::config::BuildMode;
use petgraph::graph::NodeIndex;

/// Which build types the diffed classification of an object produces
/// (spec.md §4.2, "Per-object expansion").
fn build_types_for(diff: DiffKind, mode: BuildMode) -> Vec<BuildType> {
    match diff {
        DiffKind::Same | DiffKind::DiffKids => vec![BuildType::Exists],
        DiffKind::New => vec![BuildType::Build],
        DiffKind::Gone => vec![BuildType::Drop],
        DiffKind::Diff => vec![BuildType::Diff],
        DiffKind::Rebuild => match mode {
            BuildMode::BuildOnly => vec![BuildType::Build],
            BuildMode::DropOnly => vec![BuildType::Drop],
            BuildMode::BuildAndDrop => vec![BuildType::Drop, BuildType::Build],
        },
    }
}

/// The truth table of spec.md §4.2, "Build-type truth table for dep
/// lookup": the ordered list of build-type prefixes searched when a node
/// of `from` looks up a dependency by FQN/PQN.
fn lookup_order(from: BuildType, dep_is_old: bool) -> &'static [BuildType] {
    if dep_is_old {
        return &[BuildType::Drop, BuildType::Build, BuildType::Diff, BuildType::Exists];
    }
    match from {
        BuildType::Drop => &[BuildType::Drop, BuildType::Exists, BuildType::Diff],
        _ => &[BuildType::Build, BuildType::Exists, BuildType::Diff],
    }
}

fn resolve_fqn(dag: &Dag, order: &[BuildType], fqn: &str) -> Option<NodeIndex> {
    order.iter().find_map(|bt| dag.get(&dag_key(*bt, fqn)))
}

fn resolve_pqn(dag: &Dag, order: &[BuildType], pqn: &str) -> Vec<NodeIndex> {
    for bt in order {
        let key = dag_key(*bt, pqn);
        if let Some(candidates) = dag.bypqn.get(&key) {
            if !candidates.is_empty() {
                return candidates.clone();
            }
        }
    }
    Vec::new()
}

/// Resolve one [`catalog::DepRef`] to its candidate node(s) via the truth
/// table, failing fatally if nothing matches (spec.md §4.2, "Failures").
fn resolve_dep(
    dag: &Dag,
    from: BuildType,
    referrer_fqn: &str,
    dep: &catalog::DepRef,
) -> DagResult<Vec<NodeIndex>> {
    let order = lookup_order(from, dep.old);
    match &dep.target {
        DepTarget::Fqn(fqn) => match resolve_fqn(dag, order, fqn) {
            Some(idx) => Ok(vec![idx]),
            None => Err(DagError::unresolved_fqn(fqn, referrer_fqn)),
        },
        DepTarget::Pqn(pqn) => {
            let candidates = resolve_pqn(dag, order, pqn);
            if candidates.is_empty() {
                return Err(DagError::unresolved_pqn(pqn, referrer_fqn));
            }
            Ok(candidates)
        }
    }
}

/// Attach the [`DepSet`]s of `direction` (forwards for build/diff/exists
/// nodes, backwards for drop nodes) onto `idx` as [`PendingDepSet`]s,
/// inverting edges for drop nodes (spec.md §4.2, "Inverted edges").
fn attach_dep_sets(
    dag: &mut Dag,
    idx: NodeIndex,
    from: BuildType,
    sets: &[DepSet],
) -> DagResult<()> {
    let referrer_fqn = dag.node(idx).fqn.clone();
    for set in sets {
        let mut candidates = Vec::new();
        for dep in &set.members {
            let resolved = resolve_dep(dag, from, &referrer_fqn, dep)?;
            if from == BuildType::Drop {
                // drop of X depends on drop of things that depended on X:
                // invert the edge instead of recording a forward candidate.
                for target in resolved {
                    dag.graph.add_edge(idx, target, crate::types::DagEdge);
                }
            } else {
                candidates.extend(resolved);
            }
        }
        if from != BuildType::Drop && !candidates.is_empty() {
            dag.pending.entry(idx).or_default().push(PendingDepSet {
                candidates,
                is_optional: set.is_optional,
                actual: None,
            });
        }
    }
    Ok(())
}

/// Attach the implicit parent edge (spec.md §4.2, "Parent edges"):
/// non-drop nodes hard-depend on their parent; drop nodes are depended on
/// by their parent (leaves drop before their containing object).
fn attach_parent_edge(dag: &mut Dag, idx: NodeIndex, build_type: BuildType, parent_fqn: &Option<String>) {
    let Some(parent_fqn) = parent_fqn else { return };
    let order = lookup_order(build_type, false);
    let Some(parent_idx) = resolve_fqn(dag, order, parent_fqn) else {
        return;
    };
    if build_type == BuildType::Drop {
        dag.graph.add_edge(parent_idx, idx, crate::types::DagEdge);
    } else {
        dag.graph.add_edge(idx, parent_idx, crate::types::DagEdge);
    }
}

/// Build/drop pairing (spec.md §4.2): a `build` node whose `drop` sibling
/// exists (the same FQN was also expanded to a drop, e.g. a `rebuild`)
/// depends on that drop running first.
fn attach_build_drop_pairing(dag: &mut Dag, fqn: &str) {
    let build_key = dag_key(BuildType::Build, fqn);
    let drop_key = dag_key(BuildType::Drop, fqn);
    if let (Some(&build_idx), Some(&drop_idx)) = (dag.byfqn.get(&build_key), dag.byfqn.get(&drop_key)) {
        dag.graph.add_edge(build_idx, drop_idx, crate::types::DagEdge);
    }
}

/// Build the full DAG-candidate graph from a diff-annotated [`ObjectTree`]
/// (spec.md §4.2). Returns a graph that may still contain cycles and
/// DepSets with unresolved alternatives — that is the dependency
/// selector's job (§4.3).
pub fn build_dag(tree: &ObjectTree, mode: BuildMode) -> DagResult<Dag> {
    let mut dag = Dag::new();

    // Pass 1: create every node so truth-table lookups in pass 2 can see
    // the full index regardless of document order.
    let mut expansions: Vec<(String, BuildType)> = Vec::new();
    for object in tree.walk() {
        let diff = object.diff_or(DiffKind::Same);
        for build_type in build_types_for(diff, mode) {
            let node = DagNode::from_object(build_type, object);
            dag.insert_node(node)?;
            expansions.push((object.fqn.clone(), build_type));
        }
    }

    // Pass 2: attach dependency, parent and build/drop-pairing edges.
    for (fqn, build_type) in &expansions {
        let object = tree.get(fqn).expect("fqn came from this tree");
        let idx = dag.get(&dag_key(*build_type, fqn)).expect("just inserted");

        attach_parent_edge(&mut dag, idx, *build_type, &object.parent_fqn);

        let sets = dep_sets_for(object, *build_type);
        attach_dep_sets(&mut dag, idx, *build_type, sets)?;
    }

    for (fqn, build_type) in &expansions {
        if *build_type == BuildType::Build {
            attach_build_drop_pairing(&mut dag, fqn);
        }
    }

    Ok(dag)
}

/// Which half of a [`DbObject`]'s dependency delta applies to a given
/// build type: drop nodes walk backwards (the before-state's edges),
/// everything else walks forwards (spec.md §4.1 "Dependency synthesis",
/// §4.2 "Inverted edges").
fn dep_sets_for(object: &DbObject, build_type: BuildType) -> &[DepSet] {
    if build_type == BuildType::Drop {
        &object.extra_deps.backwards
    } else {
        &object.extra_deps.forwards
    }
}
