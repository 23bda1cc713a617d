use std::collections::HashMap;

/// A `<dependency>` template embedded in a diff rule check (spec.md §4.1):
/// the `{old.attr}`/`{new.attr}`/`{eval.expr}` placeholders are resolved
/// against the matched `before`/`after` content nodes when the check
/// fires. Exactly one of `fqn`/`pqn` is set, mirroring [`crate::DepTarget`].
#[derive(Debug, Clone)]
pub struct DepTemplate {
    pub fqn: Option<String>,
    pub pqn: Option<String>,
    pub old: bool,
    pub soft: bool,
}

/// One check within a [`TypeRule`] (spec.md §4.1).
#[derive(Debug, Clone)]
pub enum Check {
    Attribute {
        name: String,
        fail: bool,
        rebuild: bool,
        msg: Option<String>,
        dependency: Option<DepTemplate>,
    },
    Element {
        /// Name of the child element type to compare.
        name: String,
        /// Attribute used to key and match individual elements; `None`
        /// means elements are matched by element name alone.
        key: Option<String>,
        rebuild: bool,
        dependency: Option<DepTemplate>,
    },
    Text {
        rebuild: bool,
        dependency: Option<DepTemplate>,
    },
}

impl Check {
    pub fn rebuild(&self) -> bool {
        match self {
            Check::Attribute { rebuild, .. } => *rebuild,
            Check::Element { rebuild, .. } => *rebuild,
            Check::Text { rebuild, .. } => *rebuild,
        }
    }

    pub fn dependency(&self) -> Option<&DepTemplate> {
        match self {
            Check::Attribute { dependency, .. } => dependency.as_ref(),
            Check::Element { dependency, .. } => dependency.as_ref(),
            Check::Text { dependency, .. } => dependency.as_ref(),
        }
    }
}

/// The diff rule for one object type (spec.md §4.1, "Per-type rule").
#[derive(Debug, Clone)]
pub struct TypeRule {
    pub obj_type: String,
    pub key: String,
    pub checks: Vec<Check>,
}

impl TypeRule {
    pub fn new(obj_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            obj_type: obj_type.into(),
            key: key.into(),
            checks: Vec::new(),
        }
    }
}

/// The diff rule set, indexed by object type (spec.md §2, "Diff rules
/// loader").
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, TypeRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: TypeRule) -> Option<TypeRule> {
        self.rules.insert(rule.obj_type.clone(), rule)
    }

    pub fn get(&self, obj_type: &str) -> Option<&TypeRule> {
        self.rules.get(obj_type)
    }

    /// Key attribute to use for a given object type; defaults to `"fqn"`
    /// when no rule names one (spec.md §3, "key_attr").
    pub fn key_attr_for(&self, obj_type: &str) -> &str {
        self.rules
            .get(obj_type)
            .map(|r| r.key.as_str())
            .unwrap_or("fqn")
    }
}
