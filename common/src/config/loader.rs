use crate::config::RunConfig;
use crate::diag;
use crate::error::ConfigError;
use std::path::Path;

/// Load a [`RunConfig`] from an optional TOML file, falling back to
/// defaults when `path` is `None`. Mirrors the teacher's
/// `common::config::loader::read_config` entry point, minus the project
/// scaffolding concerns that loader also handles.
pub fn read_config(path: Option<&Path>) -> Result<RunConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        context: diag!("reading config file {}", path.display()),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        context: diag!("parsing config file {}", path.display()),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_path_given() {
        let cfg = read_config(None).expect("default config");
        assert_eq!(cfg.ignore_contexts, false);
    }

    #[test]
    fn loads_overrides_from_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "build_mode = \"drop-only\"\nsort_mode = \"simple\"\nignore_contexts = true").unwrap();

        let cfg = read_config(Some(file.path())).expect("load config");
        assert!(cfg.ignore_contexts);
        assert_eq!(cfg.sort_mode, crate::config::SortMode::Simple);
    }
}
