//! OpenConfig schema discovery.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Schema loading errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("No YANG modules found in {0}")]
    NoModules(PathBuf),

    #[error("Invalid schema search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to read schema directory: {0}")]
    Io(#[from] glob::GlobError),
}

/// Loads the schema modules used to interpret telemetry paths.
pub trait SchemaLoader: Send + Sync {
    /// Load the modules under `directory` and return their names.
    fn load(&self, directory: &Path) -> Result<Vec<String>, SchemaError>;
}

/// Discovers `*.yang` modules recursively.
///
/// Module names are file stems with any `@<revision>` suffix removed,
/// sorted and deduplicated.
#[derive(Debug, Default, Clone, Copy)]
pub struct YangModuleLoader;

impl SchemaLoader for YangModuleLoader {
    fn load(&self, directory: &Path) -> Result<Vec<String>, SchemaError> {
        if !directory.is_dir() {
            return Err(SchemaError::MissingDirectory(directory.to_path_buf()));
        }

        let pattern = format!(
            "{}/**/*.yang",
            glob::Pattern::escape(&directory.to_string_lossy())
        );

        let mut modules = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let name = stem.split('@').next().unwrap_or(stem);
                modules.push(name.to_string());
            }
        }

        modules.sort();
        modules.dedup();

        if modules.is_empty() {
            return Err(SchemaError::NoModules(directory.to_path_buf()));
        }

        debug!(
            directory = %directory.display(),
            count = modules.len(),
            "Loaded YANG modules"
        );
        Ok(modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_modules_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("openconfig-interfaces.yang"), "module x {}").unwrap();
        std::fs::create_dir(dir.path().join("types")).unwrap();
        std::fs::write(
            dir.path().join("types").join("openconfig-types@2019-04-16.yang"),
            "module y {}",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a module").unwrap();

        let modules = YangModuleLoader.load(dir.path()).unwrap();
        assert_eq!(modules, vec!["openconfig-interfaces", "openconfig-types"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(matches!(
            YangModuleLoader.load(&missing),
            Err(SchemaError::MissingDirectory(p)) if p == missing
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            YangModuleLoader.load(dir.path()),
            Err(SchemaError::NoModules(_))
        ));
    }
}
