use thiserror::Error;

/// The one error type `main` matches on: every collaborator's error
/// folds into this via `#[from]`, mirroring the teacher's `FFError`
/// aggregation in `cli::run_cmd`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] common::error::ConfigError),
    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),
    #[error(transparent)]
    Dag(#[from] dag::DagError),
    #[error(transparent)]
    Plan(#[from] executor::PlanError),
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
