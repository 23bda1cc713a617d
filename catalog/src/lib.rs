pub mod error;
pub mod object;
pub mod rules;
pub mod tree;
pub mod xml;
pub mod xmltree;

pub use error::CatalogError;
pub use object::{ContextDecl, DbObject, DepRef, DepSet, DepTarget, DependencyDelta, DiffKind};
pub use rules::{Check, DepTemplate, RuleSet, TypeRule};
pub use tree::ObjectTree;
pub use xmltree::XmlElement;
