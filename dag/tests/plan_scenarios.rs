use catalog::xml::parse_object_tree;
use catalog::{Check, RuleSet, TypeRule};
use common::config::{BuildMode, RunConfig};
use dag::eval::AttrEval;
use dag::{BuildType, PlanItem};

fn object_order(items: &[PlanItem]) -> Vec<(String, BuildType)> {
    items
        .iter()
        .filter_map(|item| match item {
            PlanItem::Object(n) => Some((n.fqn.clone(), n.build_type)),
            PlanItem::Navigate(_) => None,
        })
        .collect()
}

// S3 — rebuild cascade: table.s.t is rebuilt; view.s.v has a hard
// dependency on it. Expect drop view, drop table, build table, build view.
#[test]
fn rebuild_cascade_orders_dependents_drop_first_then_build_last() {
    let before = parse_object_tree(
        r#"<r>
            <dbobject type="schema" fqn="s">
                <dbobject type="table" fqn="s.t" parent="s"/>
                <dbobject type="view" fqn="s.v" parent="s">
                    <dependencies><dependency fqn="s.t"/></dependencies>
                </dbobject>
            </dbobject>
        </r>"#,
    )
    .unwrap();
    let after = parse_object_tree(
        r#"<r>
            <dbobject type="schema" fqn="s">
                <dbobject type="table" fqn="s.t" parent="s" col="new"/>
                <dbobject type="view" fqn="s.v" parent="s">
                    <dependencies><dependency fqn="s.t"/></dependencies>
                </dbobject>
            </dbobject>
        </r>"#,
    )
    .unwrap();

    let mut rule = TypeRule::new("table", "fqn");
    rule.checks.push(Check::Attribute {
        name: "col".to_string(),
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
    let items = dag::plan(&before, &after, &rules, &AttrEval, &config).expect("plan");
    let order = object_order(&items);

    let pos = |fqn: &str, bt: BuildType| order.iter().position(|(f, b)| f == fqn && *b == bt).unwrap();
    let drop_v = pos("s.v", BuildType::Drop);
    let drop_t = pos("s.t", BuildType::Drop);
    let build_t = pos("s.t", BuildType::Build);
    let build_v = pos("s.v", BuildType::Build);

    assert!(drop_v < drop_t, "view must drop before the table it depends on");
    assert!(drop_t < build_t, "a table's drop precedes its own rebuild");
    assert!(build_t < build_v, "view rebuilds only once its dependency is rebuilt");
}

// S4 — cycle with breaker: function.a and function.b reference each
// other; both carry a cycle_breaker, so a breaker stands in for one side.
#[test]
fn cycle_with_breaker_produces_a_breaker_node_and_preserves_outer_order() {
    let before = catalog::ObjectTree::new();
    let after = parse_object_tree(
        r#"<r>
            <dbobject type="function" fqn="a" cycle_breaker="function_stub">
                <dependencies><dependency fqn="b"/></dependencies>
            </dbobject>
            <dbobject type="function" fqn="b" cycle_breaker="function_stub">
                <dependencies><dependency fqn="a"/></dependencies>
            </dbobject>
        </r>"#,
    )
    .unwrap();

    let items = dag::plan_default(&before, &after, &RuleSet::new(), &AttrEval).expect("plan");
    let order = object_order(&items);
    let builds: Vec<_> = order
        .iter()
        .filter(|(_, bt)| matches!(bt, BuildType::Build | BuildType::Breaker))
        .collect();

    assert_eq!(builds.len(), 3, "a, b and one breaker must all appear: {builds:?}");

    // `a` is dagified first (declared first) so it keeps its real edge
    // to `b`, gains a breaker stand-in, and `b`'s edge back to `a` is
    // redirected onto that breaker: breaker-for-a < b < a (spec.md §4.3,
    // testable property #5).
    let breaker_pos = order.iter().position(|(_, bt)| *bt == BuildType::Breaker).unwrap();
    let build_b_pos = order.iter().position(|(f, bt)| f == "b" && *bt == BuildType::Build).unwrap();
    let build_a_pos = order.iter().position(|(f, bt)| f == "a" && *bt == BuildType::Build).unwrap();

    assert!(breaker_pos < build_b_pos, "the breaker must build before b: {order:?}");
    assert!(build_b_pos < build_a_pos, "b must build before a: {order:?}");
}

// S5 — context change: two tables live under different non-default
// <context name="database"> values. Visiting one after the other must
// depart the first database and arrive the second.
#[test]
fn context_change_between_objects_emits_depart_then_arrive() {
    let before = catalog::ObjectTree::new();
    let after = parse_object_tree(
        r#"<r>
            <dbobject type="table" fqn="a" visit="true">
                <context name="database" value="db1" default="db0"/>
            </dbobject>
            <dbobject type="table" fqn="b" visit="true">
                <context name="database" value="db2" default="db0"/>
            </dbobject>
        </r>"#,
    )
    .unwrap();

    let items = dag::plan_default(&before, &after, &RuleSet::new(), &AttrEval).expect("plan");
    let navs: Vec<_> = items
        .iter()
        .filter_map(|i| match i {
            PlanItem::Navigate(n) => Some(n.clone()),
            _ => None,
        })
        .collect();

    assert!(
        navs.iter().any(|n| matches!(n, dag::NavEvent::ContextArrive { name, value } if name == "database" && value == "db1")),
        "must arrive db1 before visiting a: {navs:?}"
    );
    assert!(
        navs.iter().any(|n| matches!(n, dag::NavEvent::ContextDepart { name, value } if name == "database" && value == "db1")),
        "must depart db1 before visiting b: {navs:?}"
    );
    assert!(
        navs.iter().any(|n| matches!(n, dag::NavEvent::ContextArrive { name, value } if name == "database" && value == "db2")),
        "must arrive db2 before visiting b: {navs:?}"
    );
}

// S6 — hard-fail diff: a `fail` check firing on a changed attribute
// aborts the whole diff rather than silently classifying the object.
#[test]
fn hard_fail_check_aborts_the_diff() {
    let before = parse_object_tree(r#"<r><dbobject type="table" fqn="t" distribution="hash"/></r>"#).unwrap();
    let after = parse_object_tree(r#"<r><dbobject type="table" fqn="t" distribution="round_robin"/></r>"#).unwrap();

    let mut rule = TypeRule::new("table", "fqn");
    rule.checks.push(Check::Attribute {
        name: "distribution".to_string(),
        rebuild: false,
        fail: true,
        msg: None,
        dependency: None,
    });
    let mut rules = RuleSet::new();
    rules.insert(rule);

    let result = dag::plan_default(&before, &after, &rules, &AttrEval);
    assert!(result.is_err(), "a fail check must abort the plan, not silently succeed");
}

// Boundary: an optional DepSet whose only candidate closes a cycle
// resolves to "no edge" rather than a fatal error.
#[test]
fn optional_dep_set_in_a_cycle_resolves_to_no_edge() {
    let before = catalog::ObjectTree::new();
    let after = parse_object_tree(
        r#"<r>
            <dbobject type="view" fqn="a">
                <dependencies><dependency-set optional="true"><dependency fqn="b"/></dependency-set></dependencies>
            </dbobject>
            <dbobject type="view" fqn="b">
                <dependencies><dependency fqn="a"/></dependencies>
            </dbobject>
        </r>"#,
    )
    .unwrap();

    let items = dag::plan_default(&before, &after, &RuleSet::new(), &AttrEval).expect("plan");
    assert_eq!(object_order(&items).len(), 2);
}
