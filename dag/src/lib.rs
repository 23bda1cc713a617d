pub mod dagbuild;
pub mod differ;
pub mod error;
pub mod eval;
pub mod navigate;
pub mod select;
pub mod sort;
pub mod types;

pub use error::{DagError, DagResult};
pub use navigate::{NavEvent, PlanItem};
pub use types::{BuildType, Dag, DagNode};

use catalog::{ObjectTree, RuleSet};
use common::config::{RunConfig, SortMode};

/// [`navigate::NavSource`] backed directly by the diffed [`ObjectTree`],
/// so the navigator never needs its own copy of the object graph.
struct TreeNavSource<'a> {
    tree: &'a ObjectTree,
    ignore_contexts: bool,
}

impl navigate::NavSource for TreeNavSource<'_> {
    fn parent_fqn(&self, fqn: &str) -> Option<String> {
        self.tree.get(fqn).and_then(|o| o.parent_fqn.clone())
    }

    fn contexts(&self, fqn: &str) -> &[catalog::ContextDecl] {
        if self.ignore_contexts {
            return &[];
        }
        self.tree.get(fqn).map(|o| o.contexts.as_slice()).unwrap_or(&[])
    }
}

/// Run the full pipeline (spec.md §4): diff the before/after catalog
/// trees, expand the diff into a DAG-candidate graph, resolve its
/// dependency alternatives into a true DAG, topologically order it, and
/// translate the order into a navigation event stream.
pub fn plan(
    before: &ObjectTree,
    after: &ObjectTree,
    rules: &RuleSet,
    eval: &dyn eval::ExprEval,
    config: &RunConfig,
) -> DagResult<Vec<PlanItem>> {
    let merged = differ::diff_trees(before, after, rules, eval)?;
    let mut dag = dagbuild::build_dag(&merged, config.build_mode)?;
    select::select(&mut dag)?;

    let sorted = match config.sort_mode {
        SortMode::Simple => sort::simple_sort(&mut dag)?,
        SortMode::Smart => sort::smart_sort(&dag)?,
    };

    let source = TreeNavSource {
        tree: &merged,
        ignore_contexts: config.ignore_contexts,
    };
    Ok(navigate::navigate_sorted(&source, &sorted))
}

/// Convenience overload for callers that don't need to pick a non-default
/// [`BuildMode`]/[`SortMode`].
pub fn plan_default(
    before: &ObjectTree,
    after: &ObjectTree,
    rules: &RuleSet,
    eval: &dyn eval::ExprEval,
) -> DagResult<Vec<PlanItem>> {
    plan(before, after, rules, eval, &RunConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::xml::parse_object_tree;
    use common::config::BuildMode;

    fn object_positions(items: &[PlanItem]) -> Vec<(String, BuildType)> {
        items
            .iter()
            .filter_map(|item| match item {
                PlanItem::Object(n) => Some((n.fqn.clone(), n.build_type)),
                PlanItem::Navigate(_) => None,
            })
            .collect()
    }

    // S1 — trivial linear build: a new schema and a new table under it.
    #[test]
    fn trivial_linear_build_orders_schema_before_table() {
        let before = ObjectTree::new();
        let after = parse_object_tree(
            r#"<r><dbobject type="schema" fqn="s" visit="1">
                 <dbobject type="table" fqn="s.t" parent="s"/>
               </dbobject></r>"#,
        )
        .unwrap();
        let items = plan_default(&before, &after, &RuleSet::new(), &eval::AttrEval).expect("plan");
        let objects = object_positions(&items);
        assert_eq!(objects, vec![("s".into(), BuildType::Build), ("s.t".into(), BuildType::Build)]);
        assert!(items.iter().any(|i| matches!(i, PlanItem::Navigate(NavEvent::ObjectArrive { fqn }) if fqn == "s")));
    }

    // S2 — simple drop: both objects vanish, drops ordered leaf-first.
    #[test]
    fn simple_drop_orders_table_before_schema() {
        let before = parse_object_tree(
            r#"<r><dbobject type="schema" fqn="s" visit="1">
                 <dbobject type="table" fqn="s.t" parent="s"/>
               </dbobject></r>"#,
        )
        .unwrap();
        let after = ObjectTree::new();
        let items = plan_default(&before, &after, &RuleSet::new(), &eval::AttrEval).expect("plan");
        let objects = object_positions(&items);
        assert_eq!(objects, vec![("s.t".into(), BuildType::Drop), ("s".into(), BuildType::Drop)]);
    }

    // Boundary: empty before-tree -> every after-object is new, no drops.
    #[test]
    fn empty_before_tree_produces_only_builds() {
        let before = ObjectTree::new();
        let after = parse_object_tree(r#"<r><dbobject type="schema" fqn="s"/></r>"#).unwrap();
        let items = plan_default(&before, &after, &RuleSet::new(), &eval::AttrEval).expect("plan");
        assert!(object_positions(&items).iter().all(|(_, bt)| *bt == BuildType::Build));
    }

    // Boundary: empty after-tree -> every before-object is gone, no builds.
    #[test]
    fn empty_after_tree_produces_only_drops() {
        let before = parse_object_tree(r#"<r><dbobject type="schema" fqn="s"/></r>"#).unwrap();
        let after = ObjectTree::new();
        let items = plan_default(&before, &after, &RuleSet::new(), &eval::AttrEval).expect("plan");
        assert!(object_positions(&items).iter().all(|(_, bt)| *bt == BuildType::Drop));
    }

    // Universal invariant 2: a rebuild classification always yields both
    // a drop and a build, drop first.
    #[test]
    fn rebuild_mode_build_and_drop_orders_drop_before_build() {
        let before = parse_object_tree(r#"<r><dbobject type="table" fqn="t"/></r>"#).unwrap();
        let after = parse_object_tree(r#"<r><dbobject type="table" fqn="t" renamed="1"/></r>"#).unwrap();

        let mut rule = catalog::TypeRule::new("table", "fqn");
        rule.checks.push(catalog::Check::Attribute {
            name: "renamed".to_string(),
            rebuild: true,
            fail: false,
            msg: None,
            dependency: None,
        });
        let mut rules = RuleSet::new();
        rules.insert(rule);

        let config = RunConfig {
            build_mode: BuildMode::BuildAndDrop,
            ..RunConfig::default()
        };
        let items = plan(&before, &after, &rules, &eval::AttrEval, &config).expect("plan");
        let objects = object_positions(&items);
        let drop_pos = objects.iter().position(|(fqn, bt)| fqn == "t" && *bt == BuildType::Drop).unwrap();
        let build_pos = objects.iter().position(|(fqn, bt)| fqn == "t" && *bt == BuildType::Build).unwrap();
        assert!(drop_pos < build_pos);
    }
}
