use crate::object::DbObject;
use std::collections::HashMap;

/// An owning arena of [`DbObject`]s keyed by FQN, built once by the XML
/// loader (spec.md §3, "Lifecycles": "Objects are created at parse time").
///
/// Single-threaded and owned outright by one invocation — unlike the
/// teacher's `MemoryCatalog`, which wraps its state in `Arc<RwLock<_>>` to
/// support concurrent callers, the core here never shares a tree across
/// threads (spec.md §5).
#[derive(Debug, Default)]
pub struct ObjectTree {
    objects: HashMap<String, DbObject>,
    /// FQNs with no parent, in document order.
    roots: Vec<String>,
    /// parent fqn -> ordered child fqns, in document order.
    children: HashMap<String, Vec<String>>,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: DbObject) {
        let fqn = object.fqn.clone();
        match &object.parent_fqn {
            Some(parent) => self.children.entry(parent.clone()).or_default().push(fqn.clone()),
            None => self.roots.push(fqn.clone()),
        }
        self.objects.insert(fqn, object);
    }

    pub fn get(&self, fqn: &str) -> Option<&DbObject> {
        self.objects.get(fqn)
    }

    pub fn get_mut(&mut self, fqn: &str) -> Option<&mut DbObject> {
        self.objects.get_mut(fqn)
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn children_of(&self, fqn: &str) -> &[String] {
        self.children.get(fqn).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Depth-first, document-order walk of every object in the tree.
    pub fn walk(&self) -> impl Iterator<Item = &DbObject> {
        let mut order = Vec::with_capacity(self.objects.len());
        let mut stack: Vec<&String> = self.roots.iter().rev().collect();
        while let Some(fqn) = stack.pop() {
            order.push(fqn.as_str());
            if let Some(kids) = self.children.get(fqn) {
                stack.extend(kids.iter().rev());
            }
        }
        order.into_iter().map(move |fqn| &self.objects[fqn])
    }

    /// All objects, unordered — used by the differ's type/key index
    /// (spec.md §4.1 step 1).
    pub fn objects(&self) -> impl Iterator<Item = &DbObject> {
        self.objects.values()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut DbObject> {
        self.objects.values_mut()
    }

    /// FQNs of every ancestor of `fqn`, nearest first, computed by walking
    /// `parent_fqn` links (spec.md §4.5, "object-path navigation").
    pub fn ancestors(&self, fqn: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.objects.get(fqn).and_then(|o| o.parent_fqn.clone());
        while let Some(p) = current {
            current = self.objects.get(&p).and_then(|o| o.parent_fqn.clone());
            out.push(p);
        }
        out
    }

    pub fn depth(&self, fqn: &str) -> usize {
        self.ancestors(fqn).len()
    }
}
