use crate::xmltree::XmlElement;

/// How a [`DepRef`] names its target object (spec.md §3, "Dep").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepTarget {
    Fqn(String),
    Pqn(String),
}

impl DepTarget {
    pub fn as_str(&self) -> &str {
        match self {
            DepTarget::Fqn(s) | DepTarget::Pqn(s) => s,
        }
    }
}

/// A single dependency edge, with the two modifier flags from spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepRef {
    pub target: DepTarget,
    /// "this dependency existed in the before-state; only matters if it
    /// survives as a drop".
    pub old: bool,
    /// "do not count this edge when promoting rebuilds".
    pub soft: bool,
}

impl DepRef {
    pub fn fqn(name: impl Into<String>) -> Self {
        Self {
            target: DepTarget::Fqn(name.into()),
            old: false,
            soft: false,
        }
    }

    pub fn pqn(name: impl Into<String>) -> Self {
        Self {
            target: DepTarget::Pqn(name.into()),
            old: false,
            soft: false,
        }
    }
}

/// An ordered collection of candidate dependencies resolving to one chosen
/// edge, or a set of mandatory edges (spec.md §3, "DepSet").
///
/// A bare `<dependency>` not wrapped in a `<dependency-set>` is represented
/// as a singleton, non-optional `DepSet` — the DAG builder treats every
/// edge uniformly this way (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSet {
    pub members: Vec<DepRef>,
    /// "any one suffices" — at most one member is selected.
    pub is_optional: bool,
}

impl DepSet {
    pub fn single(dep: DepRef) -> Self {
        Self {
            members: vec![dep],
            is_optional: false,
        }
    }

    pub fn all_of(members: Vec<DepRef>) -> Self {
        Self {
            members,
            is_optional: false,
        }
    }

    pub fn any_of(members: Vec<DepRef>) -> Self {
        Self {
            members,
            is_optional: true,
        }
    }
}

/// A named ambient scope with a declared default (spec.md §3, "contexts").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDecl {
    pub name: String,
    pub value: String,
    pub default: String,
}

/// The differ's classification of one object (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    New,
    Gone,
    Same,
    Diff,
    Rebuild,
    DiffKids,
}

impl DiffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffKind::New => "new",
            DiffKind::Gone => "gone",
            DiffKind::Same => "same",
            DiffKind::Diff => "diff",
            DiffKind::Rebuild => "rebuild",
            DiffKind::DiffKids => "diffkids",
        }
    }
}

/// Dependency edges synthesized by fired diff rules, kept separate per
/// traversal direction (spec.md §4.1, "Dependency synthesis").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDelta {
    pub forwards: Vec<DepSet>,
    pub backwards: Vec<DepSet>,
}

/// An immutable description of a schema object (spec.md §3, "DbObject").
#[derive(Debug, Clone)]
pub struct DbObject {
    pub fqn: String,
    pub pqn: Option<String>,
    pub obj_type: String,
    pub key_attr: String,
    pub parent_fqn: Option<String>,
    pub visit: bool,
    pub cycle_breaker_type: Option<String>,
    pub contents_type: Option<String>,
    pub contents: XmlElement,
    pub contexts: Vec<ContextDecl>,
    /// Dependencies declared directly on the object, before any diff rule
    /// has had a chance to add more (§4.1 dependency synthesis unions
    /// these with rule-fired deps to produce the final `forwards`/
    /// `backwards` blocks).
    pub declared_deps: Vec<DepSet>,
    /// Set once this object has gone through the differ (§4.1); `None`
    /// for a freshly parsed, undiffed object.
    pub diff: Option<DiffKind>,
    pub extra_deps: DependencyDelta,
}

impl DbObject {
    /// The value used to match this object against its counterpart on the
    /// other side of a diff (spec.md §4.1 step 1): the attribute named by
    /// `key_attr`, defaulting to `fqn`.
    pub fn key_value(&self) -> &str {
        if self.key_attr == "fqn" {
            return &self.fqn;
        }
        self.contents
            .attr(&self.key_attr)
            .unwrap_or(self.fqn.as_str())
    }

    pub fn diff_or(&self, default: DiffKind) -> DiffKind {
        self.diff.unwrap_or(default)
    }
}
