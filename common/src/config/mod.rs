pub mod loader;

use serde::{Deserialize, Serialize};

/// Which operations the DAG builder should emit when an object carries no
/// explicit diff classification (§4.2 "default is determined by invocation
/// mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    BuildOnly,
    DropOnly,
    BuildAndDrop,
}

impl Default for BuildMode {
    fn default() -> Self {
        BuildMode::BuildAndDrop
    }
}

/// Which topological sort variant the scheduler should run (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    Simple,
    Smart,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::Smart
    }
}

/// Per-invocation flags threaded explicitly through the pipeline instead of
/// a dynamic symbol table (spec.md §9, "Dynamic symbol table").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub build_mode: BuildMode,
    pub sort_mode: SortMode,
    /// When true, context `<context>` declarations are never consulted and
    /// the navigator emits no context arrive/depart events.
    pub ignore_contexts: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            build_mode: BuildMode::default(),
            sort_mode: SortMode::default(),
            ignore_contexts: false,
        }
    }
}
