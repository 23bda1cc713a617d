use crate::types::{BuildType, DagNode};
use catalog::ContextDecl;

/// One navigation event in the composite stream (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    ContextDepart { name: String, value: String },
    ContextArrive { name: String, value: String },
    ObjectDepart { fqn: String },
    ObjectArrive { fqn: String },
}

/// Lets the navigator ask "where does this FQN sit, and what contexts
/// does it carry" without depending on the diffed object tree directly —
/// the sorted output vector is the only input spec.md §4.5 names.
pub trait NavSource {
    fn parent_fqn(&self, fqn: &str) -> Option<String>;
    fn contexts(&self, fqn: &str) -> &[ContextDecl];
}

/// Context arrive/depart events between two objects (spec.md §4.5,
/// "Context navigation"). `from`/`to` are `None` for the null anchor at
/// either end of the run.
fn context_events(from_ctx: &[ContextDecl], to_ctx: &[ContextDecl]) -> (Vec<NavEvent>, Vec<NavEvent>) {
    let mut departures = Vec::new();
    let mut arrivals = Vec::new();
    let mut matched = vec![false; from_ctx.len()];

    for to in to_ctx {
        let found = from_ctx.iter().enumerate().find(|(_, c)| c.name == to.name);
        match found {
            Some((i, from)) => {
                matched[i] = true;
                if from.value != to.value {
                    if from.value != from.default {
                        departures.push(NavEvent::ContextDepart {
                            name: from.name.clone(),
                            value: from.value.clone(),
                        });
                    }
                    if to.value != to.default {
                        arrivals.push(NavEvent::ContextArrive {
                            name: to.name.clone(),
                            value: to.value.clone(),
                        });
                    }
                }
            }
            None => {
                if to.value != to.default {
                    arrivals.push(NavEvent::ContextArrive {
                        name: to.name.clone(),
                        value: to.value.clone(),
                    });
                }
            }
        }
    }

    for (i, entry) in from_ctx.iter().enumerate() {
        if !matched[i] && entry.value != entry.default {
            departures.push(NavEvent::ContextDepart {
                name: entry.name.clone(),
                value: entry.value.clone(),
            });
        }
    }

    (departures, arrivals)
}

/// The nearest common ancestor of `a` and `b`, found by walking up from
/// the deeper side until depths match, then in lockstep (spec.md §4.5,
/// "Object-path navigation", step 1). `None` means no common ancestor
/// short of the implicit root.
fn common_ancestor(source: &dyn NavSource, a: &str, b: &str) -> (Vec<String>, Vec<String>, Option<String>) {
    let chain = |fqn: &str| -> Vec<String> {
        let mut out = vec![fqn.to_string()];
        let mut cur = source.parent_fqn(fqn);
        while let Some(p) = cur {
            cur = source.parent_fqn(&p);
            out.push(p);
        }
        out
    };
    let mut a_chain = chain(a);
    let mut b_chain = chain(b);
    // both chains run leaf -> root; walk from the root end looking for
    // the last fqn shared by both.
    a_chain.reverse();
    b_chain.reverse();
    let mut common = None;
    let mut i = 0;
    while i < a_chain.len() && i < b_chain.len() && a_chain[i] == b_chain[i] {
        common = Some(a_chain[i].clone());
        i += 1;
    }
    a_chain.reverse();
    b_chain.reverse();
    (a_chain, b_chain, common)
}

/// Object-path depart/arrive events from A to B (spec.md §4.5, "Object-
/// path navigation"). `is_drop`/`is_build` let the caller suppress the
/// implicit navigation a drop or build performs on its own object.
fn object_path_events(
    source: &dyn NavSource,
    a: Option<(&str, bool)>,
    b: Option<(&str, bool)>,
) -> (Vec<NavEvent>, Vec<NavEvent>) {
    let mut departures = Vec::new();
    let mut arrivals = Vec::new();

    let Some((a_fqn, _)) = a else {
        if let Some((b_fqn, b_is_build)) = b {
            let mut chain = vec![b_fqn.to_string()];
            let mut cur = source.parent_fqn(b_fqn);
            while let Some(p) = cur {
                cur = source.parent_fqn(&p);
                chain.push(p);
            }
            chain.reverse();
            for (idx, fqn) in chain.iter().enumerate() {
                let is_last = idx == chain.len() - 1;
                if is_last && b_is_build {
                    continue;
                }
                arrivals.push(NavEvent::ObjectArrive { fqn: fqn.clone() });
            }
        }
        return (departures, arrivals);
    };

    let Some((b_fqn, b_is_build)) = b else {
        let mut chain = vec![a_fqn.to_string()];
        let mut cur = source.parent_fqn(a_fqn);
        while let Some(p) = cur {
            cur = source.parent_fqn(&p);
            chain.push(p);
        }
        for (idx, fqn) in chain.iter().enumerate() {
            let is_leaf = idx == 0;
            if is_leaf && a.map(|(_, is_drop)| is_drop).unwrap_or(false) {
                continue;
            }
            departures.push(NavEvent::ObjectDepart { fqn: fqn.clone() });
        }
        return (departures, arrivals);
    };

    let (a_chain, b_chain, common) = common_ancestor(source, a_fqn, b_fqn);
    let a_is_drop = a.map(|(_, d)| d).unwrap_or(false);

    for (idx, fqn) in a_chain.iter().enumerate() {
        if Some(fqn.clone()) == common {
            break;
        }
        let is_leaf = idx == 0;
        if is_leaf && a_is_drop {
            continue;
        }
        departures.push(NavEvent::ObjectDepart { fqn: fqn.clone() });
    }

    let mut b_path: Vec<&String> = b_chain.iter().collect();
    if let Some(common_fqn) = &common {
        if let Some(pos) = b_path.iter().position(|f| *f == common_fqn) {
            b_path = b_path.split_off(pos + 1);
        }
    }
    for (idx, fqn) in b_path.iter().enumerate() {
        let is_leaf = idx == b_path.len() - 1;
        if is_leaf && b_is_build {
            continue;
        }
        arrivals.push(NavEvent::ObjectArrive { fqn: (*fqn).clone() });
    }

    (departures, arrivals)
}

/// Full composite navigation from A to B: context departures, object
/// departures, object arrivals, context arrivals, in that order (spec.md
/// §4.5, "Composite navigation").
fn navigate(source: &dyn NavSource, a: Option<&DagNode>, b: Option<&DagNode>) -> Vec<NavEvent> {
    let from_ctx: &[ContextDecl] = a.map(|n| source.contexts(&n.fqn)).unwrap_or(&[]);
    let to_ctx: &[ContextDecl] = b.map(|n| source.contexts(&n.fqn)).unwrap_or(&[]);
    let (ctx_departs, ctx_arrives) = context_events(from_ctx, to_ctx);

    let a_arg = a.map(|n| (n.fqn.as_str(), n.build_type == BuildType::Drop));
    let b_arg = b.map(|n| (n.fqn.as_str(), n.build_type == BuildType::Build));
    let (obj_departs, obj_arrives) = object_path_events(source, a_arg, b_arg);

    let mut events = Vec::with_capacity(ctx_departs.len() + obj_departs.len() + obj_arrives.len() + ctx_arrives.len());
    events.extend(ctx_departs);
    events.extend(obj_departs);
    events.extend(obj_arrives);
    events.extend(ctx_arrives);
    events
}

/// One item of the combined output stream: a scheduled object, or a
/// navigation event inserted ahead of the next object that needs one
/// (spec.md §6, "Output plan format").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanItem {
    Object(DagNode),
    Navigate(NavEvent),
}

/// Interleave the sorted vector with navigation events: every object is
/// emitted regardless of its `visit` hint, but only `visit`-marked objects
/// get navigation emitted ahead of them (spec.md §4.5, "Per-object
/// navigation"). The last `visit`-marked object is followed by a
/// navigation back to null once the whole vector has been emitted
/// (spec.md §4.5, "close everything").
pub fn navigate_sorted(source: &dyn NavSource, sorted: &[DagNode]) -> Vec<PlanItem> {
    let mut out = Vec::with_capacity(sorted.len());
    let mut prev: Option<&DagNode> = None;
    for node in sorted {
        if node.visit {
            out.extend(navigate(source, prev, Some(node)).into_iter().map(PlanItem::Navigate));
            prev = Some(node);
        }
        out.push(PlanItem::Object(node.clone()));
    }
    if prev.is_some() {
        out.extend(navigate(source, prev, None).into_iter().map(PlanItem::Navigate));
    }
    out
}
