pub mod diagnostics;

pub use diagnostics::DiagnosticMessage;
use thiserror::Error;

/// Failures raised while loading or validating a [`crate::config::RunConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {context}")]
    Parse {
        context: DiagnosticMessage,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {context}")]
    Invalid { context: DiagnosticMessage },
}

impl ConfigError {
    #[track_caller]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}
