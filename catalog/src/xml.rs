use crate::error::CatalogError;
use crate::object::{ContextDecl, DbObject, DepRef, DepSet, DependencyDelta};
use crate::rules::{Check, DepTemplate, RuleSet, TypeRule};
use crate::tree::ObjectTree;
use crate::xmltree::XmlElement;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

/// Parse an arbitrary XML document into a generic [`XmlElement`] tree.
/// Used as the common front end for both the object tree and the diff
/// rule set (spec.md §6).
pub fn parse_xml(text: &str) -> Result<XmlElement, CatalogError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let mut el = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr.unescape_value()?.into_owned();
                    el.attrs.insert(key, value);
                }
                stack.push(el);
            }
            Event::Empty(e) => {
                let mut el = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr.unescape_value()?.into_owned();
                    el.attrs.insert(key, value);
                }
                push_child(&mut stack, &mut root, el);
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                if let Some(top) = stack.last_mut() {
                    if !text.trim().is_empty() {
                        top.text.get_or_insert_with(String::new).push_str(&text);
                    }
                }
            }
            Event::End(_) => {
                let el = stack.pop().ok_or_else(|| {
                    CatalogError::MisplacedElement {
                        context: common::diag!("unbalanced closing tag"),
                    }
                })?;
                push_child(&mut stack, &mut root, el);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| CatalogError::MisplacedElement {
        context: common::diag!("document has no root element"),
    })
}

fn push_child(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, child: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(child);
    } else {
        *root = Some(child);
    }
}

fn attr_flag(el: &XmlElement, name: &str) -> bool {
    matches!(el.attr(name), Some("true") | Some("1") | Some("yes"))
}

fn parse_dep_ref(el: &XmlElement) -> Result<DepRef, CatalogError> {
    let old = attr_flag(el, "old");
    let soft = attr_flag(el, "soft");
    if let Some(fqn) = el.attr("fqn") {
        return Ok(DepRef {
            target: crate::object::DepTarget::Fqn(fqn.to_string()),
            old,
            soft,
        });
    }
    if let Some(pqn) = el.attr("pqn") {
        return Ok(DepRef {
            target: crate::object::DepTarget::Pqn(pqn.to_string()),
            old,
            soft,
        });
    }
    Err(CatalogError::missing_attribute("dependency", "fqn|pqn"))
}

fn parse_dependencies(el: &XmlElement) -> Result<Vec<DepSet>, CatalogError> {
    let mut out = Vec::new();
    let Some(deps_block) = el.children_named("dependencies").next() else {
        return Ok(out);
    };
    for child in &deps_block.children {
        match child.name.as_str() {
            "dependency" => out.push(DepSet::single(parse_dep_ref(child)?)),
            "dependency-set" => {
                let is_optional = attr_flag(child, "optional");
                let members = child
                    .children_named("dependency")
                    .map(parse_dep_ref)
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(DepSet {
                    members,
                    is_optional,
                });
            }
            other => {
                return Err(CatalogError::misplaced_element("dependencies", other));
            }
        }
    }
    Ok(out)
}

fn parse_contexts(el: &XmlElement) -> Vec<ContextDecl> {
    el.children_named("context")
        .map(|c| ContextDecl {
            name: c.attr("name").unwrap_or_default().to_string(),
            value: c.attr("value").unwrap_or_default().to_string(),
            default: c.attr("default").unwrap_or_default().to_string(),
        })
        .collect()
}

/// Build one [`DbObject`] plus its subtree from a parsed `<dbobject>`
/// element, inserting every node (this one and its descendants) into
/// `tree` in document order (spec.md §6). Parentage is attribute-driven
/// like every other `dbobject` attribute: an explicit `parent="..."`
/// wins even on a flat, non-nested document; XML nesting only supplies
/// `parent_fqn` when the attribute is absent.
fn convert_dbobject(
    el: &XmlElement,
    parent_fqn: Option<&str>,
    tree: &mut ObjectTree,
) -> Result<(), CatalogError> {
    let fqn = el
        .attr("fqn")
        .ok_or_else(|| CatalogError::missing_attribute("dbobject", "fqn"))?
        .to_string();
    let obj_type = el
        .attr("type")
        .ok_or_else(|| CatalogError::missing_attribute("dbobject", "type"))?
        .to_string();

    let contents = XmlElement {
        name: el.name.clone(),
        attrs: el.attrs.clone(),
        text: el.text.clone(),
        children: el
            .children
            .iter()
            .filter(|c| c.name != "context" && c.name != "dependencies" && c.name != "dbobject")
            .cloned()
            .collect(),
    };

    let object = DbObject {
        fqn: fqn.clone(),
        pqn: el.attr("pqn").map(str::to_string),
        obj_type,
        key_attr: "fqn".to_string(),
        parent_fqn: el.attr("parent").map(str::to_string).or_else(|| parent_fqn.map(str::to_string)),
        visit: el.attr("visit").map(|v| !v.is_empty()).unwrap_or(false),
        cycle_breaker_type: el.attr("cycle_breaker").map(str::to_string),
        contents_type: el.attr("contents-type").map(str::to_string),
        contents,
        contexts: parse_contexts(el),
        declared_deps: parse_dependencies(el)?,
        diff: None,
        extra_deps: DependencyDelta::default(),
    };

    tree.insert(object);

    for child in el.children_named("dbobject") {
        convert_dbobject(child, Some(fqn.as_str()), tree)?;
    }

    Ok(())
}

/// Parse a document containing one or more top-level `<dbobject>`
/// elements (spec.md §6, "Object tree input format").
pub fn parse_object_tree(text: &str) -> Result<ObjectTree, CatalogError> {
    let root = parse_xml(text)?;
    let mut tree = ObjectTree::new();

    if root.name == "dbobject" {
        convert_dbobject(&root, None, &mut tree)?;
    } else {
        for child in root.children_named("dbobject") {
            convert_dbobject(child, None, &mut tree)?;
        }
    }

    Ok(tree)
}

pub fn load_object_tree(path: impl AsRef<Path>) -> Result<ObjectTree, CatalogError> {
    let text = std::fs::read_to_string(path)?;
    parse_object_tree(&text)
}

fn parse_dep_template(el: &XmlElement) -> Option<DepTemplate> {
    let dep = el.children_named("dependency").next()?;
    Some(DepTemplate {
        fqn: dep.attr("fqn").map(str::to_string),
        pqn: dep.attr("pqn").map(str::to_string),
        old: attr_flag(dep, "old"),
        soft: attr_flag(dep, "soft"),
    })
}

fn parse_check(el: &XmlElement) -> Result<Check, CatalogError> {
    let rebuild = attr_flag(el, "rebuild");
    let dependency = parse_dep_template(el);
    match el.name.as_str() {
        "attribute" => Ok(Check::Attribute {
            name: el
                .attr("name")
                .ok_or_else(|| CatalogError::missing_attribute("attribute", "name"))?
                .to_string(),
            fail: attr_flag(el, "fail"),
            rebuild,
            msg: el.attr("msg").map(str::to_string),
            dependency,
        }),
        "element" => Ok(Check::Element {
            name: el
                .attr("name")
                .ok_or_else(|| CatalogError::missing_attribute("element", "name"))?
                .to_string(),
            key: el.attr("key").map(str::to_string),
            rebuild,
            dependency,
        }),
        "text" => Ok(Check::Text { rebuild, dependency }),
        other => Err(CatalogError::misplaced_element("dbobject", other)),
    }
}

/// Parse the diff rule set document (spec.md §6, "Rule set format").
pub fn parse_rule_set(text: &str) -> Result<RuleSet, CatalogError> {
    let root = parse_xml(text)?;
    let mut rules = RuleSet::new();

    for el in root.children_named("dbobject") {
        let obj_type = el
            .attr("type")
            .ok_or_else(|| CatalogError::missing_attribute("dbobject", "type"))?
            .to_string();
        let key = el.attr("key").unwrap_or("fqn").to_string();
        let mut rule = TypeRule::new(obj_type.clone(), key);
        for check_el in &el.children {
            rule.checks.push(parse_check(check_el)?);
        }
        if rules.insert(rule).is_some() {
            return Err(CatalogError::duplicate_rule(obj_type));
        }
    }

    Ok(rules)
}

pub fn load_rule_set(path: impl AsRef<Path>) -> Result<RuleSet, CatalogError> {
    let text = std::fs::read_to_string(path)?;
    parse_rule_set(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_object_tree() {
        let xml = r#"
            <database>
              <dbobject type="schema" fqn="schema.s" name="s">
                <dbobject type="table" fqn="table.s.t" parent="schema.s" name="t">
                  <dependencies>
                    <dependency fqn="schema.s"/>
                  </dependencies>
                </dbobject>
              </dbobject>
            </database>
        "#;
        let tree = parse_object_tree(xml).expect("parse");
        assert_eq!(tree.len(), 2);
        let table = tree.get("table.s.t").expect("table");
        assert_eq!(table.parent_fqn.as_deref(), Some("schema.s"));
        assert_eq!(table.declared_deps.len(), 1);
        assert_eq!(tree.roots(), &["schema.s".to_string()]);
    }

    #[test]
    fn parent_attribute_wins_on_a_flat_sibling_document() {
        let xml = r#"
            <database>
              <dbobject type="schema" fqn="s"/>
              <dbobject type="table" fqn="t" parent="s"/>
            </database>
        "#;
        let tree = parse_object_tree(xml).expect("parse");
        assert_eq!(tree.get("t").unwrap().parent_fqn.as_deref(), Some("s"));
        assert_eq!(tree.roots(), &["s".to_string()]);
    }

    #[test]
    fn rejects_missing_fqn() {
        let xml = r#"<database><dbobject type="schema" name="s"/></database>"#;
        let err = parse_object_tree(xml).unwrap_err();
        assert!(matches!(err, CatalogError::MissingAttribute { .. }));
    }

    #[test]
    fn parses_rule_set_with_dependency_template() {
        let xml = r#"
            <rules>
              <dbobject type="table" key="fqn">
                <attribute name="owner" rebuild="true">
                  <dependency fqn="role.{new.owner}"/>
                </attribute>
                <attribute name="name" fail="true" msg="cannot rename %s to %s"/>
              </dbobject>
            </rules>
        "#;
        let rules = parse_rule_set(xml).expect("parse rules");
        let rule = rules.get("table").expect("table rule");
        assert_eq!(rule.checks.len(), 2);
        assert!(rule.checks[0].dependency().is_some());
    }
}
