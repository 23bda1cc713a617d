use common::diag;
use common::error::diagnostics::DiagnosticMessage;
use thiserror::Error;

/// Failures raised by the differ, DAG builder, dependency selector,
/// topological sorter or navigator (spec.md §7).
#[derive(Debug, Error)]
pub enum DagError {
    #[error("rule violation: {context}")]
    RuleViolation { context: DiagnosticMessage },
    #[error("duplicate identity: {context}")]
    DuplicateIdentity { context: DiagnosticMessage },
    #[error("unresolved dependency: {context}")]
    UnresolvedDependency { context: DiagnosticMessage },
    #[error("unresolved cycle: {context}")]
    UnresolvedCycle {
        context: DiagnosticMessage,
        path: Vec<String>,
    },
    #[error("unsorted remainder: {context}")]
    UnsortedRemainder { context: DiagnosticMessage },
    #[error("structural error: {context}")]
    Structural { context: DiagnosticMessage },
    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),
}

impl DagError {
    #[track_caller]
    pub fn rule_violation(message: impl Into<String>) -> Self {
        Self::RuleViolation {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn duplicate_identity(obj_type: &str, key: &str) -> Self {
        Self::DuplicateIdentity {
            context: diag!("duplicate ({}, {}) on one side of a diff", obj_type, key),
        }
    }

    #[track_caller]
    pub fn duplicate_node(key: &str) -> Self {
        Self::DuplicateIdentity {
            context: diag!("DagNode key '{}' already exists", key),
        }
    }

    #[track_caller]
    pub fn unresolved_fqn(fqn: &str, referrer: &str) -> Self {
        Self::UnresolvedDependency {
            context: diag!("fqn '{}' referenced by '{}' has no matching object", fqn, referrer),
        }
    }

    #[track_caller]
    pub fn unresolved_pqn(pqn: &str, referrer: &str) -> Self {
        Self::UnresolvedDependency {
            context: diag!(
                "pqn '{}' referenced by '{}' has no matching object of any suitable build type",
                pqn,
                referrer
            ),
        }
    }

    #[track_caller]
    pub fn cycle(path: Vec<String>) -> Self {
        Self::UnresolvedCycle {
            context: diag!("cycle: {}", path.join(" -> ")),
            path,
        }
    }

    #[track_caller]
    pub fn unsorted_remainder(keys: Vec<String>) -> Self {
        Self::UnsortedRemainder {
            context: diag!(
                "{} node(s) left unsorted; the dependency selector missed a cycle: {}",
                keys.len(),
                keys.join(", ")
            ),
        }
    }

    #[track_caller]
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}

pub type DagResult<T> = Result<T, DagError>;
