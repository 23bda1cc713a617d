use crate::error::{DagError, DagResult};
use crate::eval::{substitute, ExprEval};
use catalog::{Check, DbObject, DepRef, DepSet, DepTarget, DependencyDelta, DiffKind, ObjectTree, RuleSet, TypeRule};
use std::collections::HashMap;

/// Build the two-level (type, key) index used to match objects across the
/// two trees (spec.md §4.1 step 1). Raises on a duplicate (type, key)
/// pair within one side.
fn build_index(tree: &ObjectTree, rules: &RuleSet) -> DagResult<HashMap<(String, String), String>> {
    let mut index = HashMap::new();
    for object in tree.objects() {
        let key_attr = rules.key_attr_for(&object.obj_type);
        let key_value = key_value_for(object, key_attr).to_string();
        let ident = (object.obj_type.clone(), key_value);
        if index.insert(ident.clone(), object.fqn.clone()).is_some() {
            return Err(DagError::duplicate_identity(&ident.0, &ident.1));
        }
    }
    Ok(index)
}

fn key_value_for<'a>(object: &'a DbObject, key_attr: &str) -> &'a str {
    if key_attr == "fqn" {
        return &object.fqn;
    }
    object.contents.attr(key_attr).unwrap_or(object.fqn.as_str())
}

fn fire_dependency(
    rule: &catalog::DepTemplate,
    old: &catalog::XmlElement,
    new: &catalog::XmlElement,
    eval: &dyn ExprEval,
) -> DepSet {
    let dep = if let Some(tmpl) = &rule.fqn {
        DepRef {
            target: catalog::DepTarget::Fqn(substitute(tmpl, old, new, eval)),
            old: rule.old,
            soft: rule.soft,
        }
    } else {
        let tmpl = rule.pqn.as_deref().unwrap_or_default();
        DepRef {
            target: catalog::DepTarget::Pqn(substitute(tmpl, old, new, eval)),
            old: rule.old,
            soft: rule.soft,
        }
    };
    DepSet::single(dep)
}

/// Run every check in `rule` against `before`/`after`'s content nodes and
/// return the resulting classification plus any dependency edges fired
/// along the way (spec.md §4.1, "Matching algorithm" + "Dependency
/// synthesis").
fn diff_object(
    before: &DbObject,
    after: &DbObject,
    rule: Option<&TypeRule>,
    eval: &dyn ExprEval,
) -> DagResult<(DiffKind, DependencyDelta)> {
    let mut delta = DependencyDelta::default();
    let Some(rule) = rule else {
        let same = before.contents == after.contents;
        return Ok((if same { DiffKind::Same } else { DiffKind::Diff }, delta));
    };

    let mut rebuild = false;
    let mut any_diff = false;

    for check in &rule.checks {
        let fired = match check {
            Check::Attribute { name, fail, msg, .. } => {
                let old_val = before.contents.attr(name);
                let new_val = after.contents.attr(name);
                if old_val != new_val {
                    if *fail {
                        let msg = msg.clone().unwrap_or_else(|| format!("cannot change {} on {}", name, after.fqn));
                        let formatted = if msg.contains("%s") {
                            let msg = msg.replacen("%s", old_val.unwrap_or(""), 1);
                            msg.replacen("%s", new_val.unwrap_or(""), 1)
                        } else {
                            msg
                        };
                        return Err(DagError::rule_violation(formatted));
                    }
                    true
                } else {
                    false
                }
            }
            Check::Element { name, key, .. } => element_differs(before, after, name, key.as_deref()),
            Check::Text { .. } => before.contents.text != after.contents.text,
        };

        if fired {
            any_diff = true;
            if check.rebuild() {
                rebuild = true;
            }
            if let Some(tmpl) = check.dependency() {
                let dep = fire_dependency(tmpl, &before.contents, &after.contents, eval);
                delta.forwards.push(dep.clone());
                delta.backwards.push(dep);
            }
        }
    }

    let classification = if rebuild {
        DiffKind::Rebuild
    } else if any_diff {
        DiffKind::Diff
    } else {
        DiffKind::Same
    };

    Ok((classification, delta))
}

fn element_differs(before: &DbObject, after: &DbObject, name: &str, key: Option<&str>) -> bool {
    match key {
        Some(key_attr) => {
            let old_map: HashMap<&str, &catalog::XmlElement> = before
                .contents
                .children_named(name)
                .map(|c| (c.attr(key_attr).unwrap_or_default(), c))
                .collect();
            let new_map: HashMap<&str, &catalog::XmlElement> = after
                .contents
                .children_named(name)
                .map(|c| (c.attr(key_attr).unwrap_or_default(), c))
                .collect();
            if old_map.len() != before.contents.children_named(name).count()
                || new_map.len() != after.contents.children_named(name).count()
            {
                // duplicate keys on one side — fatal per spec.md §4.1 "tie-breaks"
                return true;
            }
            if old_map.len() != new_map.len() {
                return true;
            }
            old_map.iter().any(|(k, v)| new_map.get(k) != Some(v))
        }
        None => {
            let old_el = before.contents.children_named(name).next();
            let new_el = after.contents.children_named(name).next();
            old_el != new_el
        }
    }
}

/// Diff two object trees under `rules`, returning a merged tree in which
/// every object carries a `diff` classification and its forwards/
/// backwards dependency deltas (spec.md §4.1).
pub fn diff_trees(
    before: &ObjectTree,
    after: &ObjectTree,
    rules: &RuleSet,
    eval: &dyn ExprEval,
) -> DagResult<ObjectTree> {
    let mut remaining_before = build_index(before, rules)?;
    // also validate the after side has no internal duplicates
    build_index(after, rules)?;

    let mut merged = ObjectTree::new();

    for after_obj in after.walk() {
        let key_attr = rules.key_attr_for(&after_obj.obj_type);
        let key_value = key_value_for(after_obj, key_attr).to_string();
        let ident = (after_obj.obj_type.clone(), key_value);

        let mut merged_obj = after_obj.clone();

        if let Some(before_fqn) = remaining_before.remove(&ident) {
            let before_obj = before
                .get(&before_fqn)
                .expect("index points at a live before object");
            let (diff, delta) = diff_object(before_obj, after_obj, rules.get(&after_obj.obj_type), eval)?;
            merged_obj.diff = Some(diff);
            merged_obj.extra_deps = delta;
            merged_obj.extra_deps.forwards.extend(after_obj.declared_deps.clone());
            merged_obj.extra_deps.backwards.extend(before_obj.declared_deps.clone());
        } else {
            merged_obj.diff = Some(DiffKind::New);
            merged_obj.extra_deps.forwards = after_obj.declared_deps.clone();
        }

        merged.insert(merged_obj);
    }

    for (_, gone_fqn) in remaining_before {
        let mut gone_obj = before.get(&gone_fqn).expect("gone fqn is live").clone();
        gone_obj.diff = Some(DiffKind::Gone);
        gone_obj.extra_deps = DependencyDelta {
            forwards: Vec::new(),
            backwards: gone_obj.declared_deps.clone(),
        };
        merged.insert(gone_obj);
    }

    mark_diffkids(&mut merged);
    promote_rebuilds(&mut merged);

    Ok(merged)
}

/// Promote any `Same` object with a changed descendant to `DiffKids`
/// (spec.md §4.1, "Outcome is one of same, diff, rebuild, or diffkids").
fn mark_diffkids(tree: &mut ObjectTree) {
    let fqns: Vec<String> = tree.walk().map(|o| o.fqn.clone()).collect();
    // post-order so a parent sees its children's final classification
    for fqn in fqns.into_iter().rev() {
        let has_changed_child = tree
            .children_of(&fqn)
            .iter()
            .any(|c| tree.get(c).map(|o| o.diff_or(DiffKind::Same) != DiffKind::Same).unwrap_or(false));
        if has_changed_child {
            if let Some(obj) = tree.get_mut(&fqn) {
                if obj.diff_or(DiffKind::Same) == DiffKind::Same {
                    obj.diff = Some(DiffKind::DiffKids);
                }
            }
        }
    }
}

fn pqn_index(tree: &ObjectTree) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for object in tree.objects() {
        if let Some(pqn) = &object.pqn {
            index.entry(pqn.clone()).or_default().push(object.fqn.clone());
        }
    }
    index
}

fn is_rebuild_forcing(diff: Option<DiffKind>) -> bool {
    matches!(diff, Some(DiffKind::Rebuild) | Some(DiffKind::New) | Some(DiffKind::Gone))
}

fn target_forces_rebuild(dep: &DepRef, tree: &ObjectTree, pqns: &HashMap<String, Vec<String>>) -> bool {
    match &dep.target {
        DepTarget::Fqn(fqn) => tree.get(fqn).map(|o| is_rebuild_forcing(o.diff)).unwrap_or(false),
        DepTarget::Pqn(pqn) => pqns
            .get(pqn)
            .map(|fqns| fqns.iter().any(|f| tree.get(f).map(|o| is_rebuild_forcing(o.diff)).unwrap_or(false)))
            .unwrap_or(false),
    }
}

/// The fixed-point rebuild-promotion pass (spec.md §4.1, "Rebuild
/// promotion"): a `same`/`diff` object with a hard forward dependency on
/// something classified `rebuild`/`new`/`gone` is itself promoted to
/// `rebuild`, and every ancestor that has not yet been classified is
/// promoted to `diffkids`.
fn promote_rebuilds(tree: &mut ObjectTree) {
    let pqns = pqn_index(tree);
    loop {
        let mut changed = false;
        let fqns: Vec<String> = tree.objects().map(|o| o.fqn.clone()).collect();
        for fqn in &fqns {
            let obj = tree.get(fqn).expect("fqn came from this tree");
            if matches!(obj.diff, Some(DiffKind::New) | Some(DiffKind::Gone) | Some(DiffKind::Rebuild)) {
                continue;
            }
            let forces = obj
                .extra_deps
                .forwards
                .iter()
                .flat_map(|ds| ds.members.iter())
                .filter(|d| !d.soft)
                .any(|d| target_forces_rebuild(d, tree, &pqns));
            if !forces {
                continue;
            }
            changed = true;
            if let Some(o) = tree.get_mut(fqn) {
                o.diff = Some(DiffKind::Rebuild);
            }
            for ancestor in tree.ancestors(fqn) {
                if let Some(a) = tree.get_mut(&ancestor) {
                    if a.diff_or(DiffKind::Same) == DiffKind::Same {
                        a.diff = Some(DiffKind::DiffKids);
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj_tree(xml: &str) -> ObjectTree {
        catalog::xml::parse_object_tree(xml).expect("parse")
    }

    #[test]
    fn new_object_classified_new() {
        let before = obj_tree(r#"<r><dbobject type="schema" fqn="s"/></r>"#);
        let after = obj_tree(r#"<r><dbobject type="schema" fqn="s"/><dbobject type="table" fqn="t" parent="s"/></r>"#);
        let merged = diff_trees(&before, &after, &RuleSet::new(), &crate::eval::AttrEval).expect("diff");
        assert_eq!(merged.get("t").unwrap().diff, Some(DiffKind::New));
        assert_eq!(merged.get("s").unwrap().diff, Some(DiffKind::Same));
    }

    #[test]
    fn gone_object_classified_gone() {
        let before = obj_tree(r#"<r><dbobject type="schema" fqn="s"/><dbobject type="table" fqn="t" parent="s"/></r>"#);
        let after = obj_tree(r#"<r><dbobject type="schema" fqn="s"/></r>"#);
        let merged = diff_trees(&before, &after, &RuleSet::new(), &crate::eval::AttrEval).expect("diff");
        assert_eq!(merged.get("t").unwrap().diff, Some(DiffKind::Gone));
    }

    #[test]
    fn attribute_rebuild_check_promotes_dependents() {
        let mut rules = RuleSet::new();
        let mut rule = TypeRule::new("role", "fqn");
        rule.checks.push(Check::Attribute {
            name: "owner".into(),
            fail: false,
            rebuild: true,
            msg: None,
            dependency: None,
        });
        rules.insert(rule);

        let before = obj_tree(
            r#"<r><dbobject type="role" fqn="role.r" owner="alice"><dbobject type="grant" fqn="role.r.g" parent="role.r">
                <dependencies><dependency fqn="role.r"/></dependencies>
            </dbobject></dbobject></r>"#,
        );
        let after = obj_tree(
            r#"<r><dbobject type="role" fqn="role.r" owner="bob"><dbobject type="grant" fqn="role.r.g" parent="role.r">
                <dependencies><dependency fqn="role.r"/></dependencies>
            </dbobject></dbobject></r>"#,
        );

        let merged = diff_trees(&before, &after, &rules, &crate::eval::AttrEval).expect("diff");
        assert_eq!(merged.get("role.r").unwrap().diff, Some(DiffKind::Rebuild));
        assert_eq!(merged.get("role.r.g").unwrap().diff, Some(DiffKind::Rebuild));
    }

    #[test]
    fn fail_check_on_changed_attribute_raises_a_rule_violation() {
        let mut rules = RuleSet::new();
        let mut rule = TypeRule::new("table", "fqn");
        rule.checks.push(Check::Attribute {
            name: "distribution".into(),
            fail: true,
            rebuild: false,
            msg: Some("cannot change distribution from %s to %s".into()),
            dependency: None,
        });
        rules.insert(rule);

        let before = obj_tree(r#"<r><dbobject type="table" fqn="t" distribution="hash"/></r>"#);
        let after = obj_tree(r#"<r><dbobject type="table" fqn="t" distribution="round_robin"/></r>"#);

        let err = diff_trees(&before, &after, &rules, &crate::eval::AttrEval).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("hash"), "message should interpolate the old value: {message}");
        assert!(message.contains("round_robin"), "message should interpolate the new value: {message}");
    }

    #[test]
    fn idempotent_on_identical_input() {
        let tree = obj_tree(
            r#"<r><dbobject type="schema" fqn="s" name="s"><dbobject type="table" fqn="s.t" parent="s" name="t"/></dbobject></r>"#,
        );
        let merged = diff_trees(&tree, &tree, &RuleSet::new(), &crate::eval::AttrEval).expect("diff");
        for obj in merged.walk() {
            assert!(matches!(obj.diff, Some(DiffKind::Same) | Some(DiffKind::DiffKids)));
        }
    }
}
