use common::diag;
use common::error::diagnostics::DiagnosticMessage;
use thiserror::Error;

/// Failures raised while loading the object tree or the diff rule set
/// (spec.md §7, "Structural" and rule-set load errors).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed XML: {context}")]
    Xml {
        context: DiagnosticMessage,
        #[source]
        source: quick_xml::Error,
    },
    #[error("missing required attribute: {context}")]
    MissingAttribute { context: DiagnosticMessage },
    #[error("misplaced element: {context}")]
    MisplacedElement { context: DiagnosticMessage },
    #[error("duplicate rule for object type: {context}")]
    DuplicateRule { context: DiagnosticMessage },
}

impl CatalogError {
    #[track_caller]
    pub fn missing_attribute(element: &str, attr: &str) -> Self {
        Self::MissingAttribute {
            context: diag!("<{}> is missing required attribute '{}'", element, attr),
        }
    }

    #[track_caller]
    pub fn misplaced_element(parent: &str, child: &str) -> Self {
        Self::MisplacedElement {
            context: diag!("<{}> cannot appear inside <{}>", child, parent),
        }
    }

    #[track_caller]
    pub fn duplicate_rule(obj_type: impl Into<String>) -> Self {
        Self::DuplicateRule {
            context: diag!("rule for object type '{}' declared twice", obj_type.into()),
        }
    }
}

impl From<std::io::Error> for CatalogError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            context: diag!("{}", source),
            source,
        }
    }
}

impl From<quick_xml::Error> for CatalogError {
    #[track_caller]
    fn from(source: quick_xml::Error) -> Self {
        Self::Xml {
            context: diag!("{}", source),
            source,
        }
    }
}
