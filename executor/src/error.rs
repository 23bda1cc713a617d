use common::error::diagnostics::DiagnosticMessage;
use thiserror::Error;

/// Failures raised while serializing a plan to XML (spec.md §6, "Plan
/// emitter"). The emitter never executes anything, so this is purely an
/// I/O and structural error surface.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: std::io::Error,
    },
    #[error("XML error: {context}")]
    Xml {
        context: DiagnosticMessage,
        #[source]
        source: quick_xml::Error,
    },
}

impl PlanError {
    #[track_caller]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: DiagnosticMessage::new(message.into()),
            source,
        }
    }

    #[track_caller]
    pub fn xml(message: impl Into<String>, source: quick_xml::Error) -> Self {
        Self::Xml {
            context: DiagnosticMessage::new(message.into()),
            source,
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
