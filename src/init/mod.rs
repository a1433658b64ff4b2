//! `walkspec init`: create the `.walkspec/` directory in a project.
//!
//! ```text
//! .walkspec/
//! ├── walkspec.toml    # Configuration (defaults written on first init)
//! ├── journal          # Executed actions, one line each
//! └── logs/            # Log files from `walkspec chat`
//! artifacts/           # Documents and their backups (location configurable)
//! └── backups/
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::artifact::store::BACKUPS_DIR;
use crate::config::{CONFIG_FILE, WalkspecToml};

/// The name of the walkspec state directory.
pub const WALKSPEC_DIR: &str = ".walkspec";

/// Result of initializing a walkspec project.
#[derive(Debug)]
pub struct InitResult {
    pub walkspec_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    /// False if `.walkspec/` already existed
    pub created: bool,
}

/// Initialize a walkspec project in the given directory.
///
/// Existing files are never overwritten; a partial structure is completed.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let walkspec_dir = project_dir.join(WALKSPEC_DIR);
    let created = !walkspec_dir.exists();

    std::fs::create_dir_all(&walkspec_dir)
        .with_context(|| format!("Failed to create directory: {}", walkspec_dir.display()))?;

    let config_file = walkspec_dir.join(CONFIG_FILE);
    let toml = if config_file.exists() {
        WalkspecToml::load(&config_file)?
    } else {
        let toml = WalkspecToml::default();
        toml.save(&config_file)?;
        toml
    };

    let artifacts_dir = {
        let dir = Path::new(&toml.artifacts.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            project_dir.join(dir)
        }
    };
    ensure_directory_structure(&walkspec_dir, &artifacts_dir)?;

    Ok(InitResult {
        walkspec_dir,
        artifacts_dir,
        created,
    })
}

fn ensure_directory_structure(walkspec_dir: &Path, artifacts_dir: &Path) -> Result<()> {
    let logs_dir = walkspec_dir.join("logs");
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create logs directory: {}", logs_dir.display()))?;

    let backups_dir = artifacts_dir.join(BACKUPS_DIR);
    std::fs::create_dir_all(&backups_dir).with_context(|| {
        format!(
            "Failed to create artifacts directory: {}",
            backups_dir.display()
        )
    })?;

    let journal = walkspec_dir.join("journal");
    if !journal.exists() {
        std::fs::write(&journal, "")
            .with_context(|| format!("Failed to create journal: {}", journal.display()))?;
    }

    Ok(())
}

/// Check if a project is already initialized.
pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(WALKSPEC_DIR).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // =========================================
    // init_project tests
    // =========================================

    #[test]
    fn test_init_project_creates_structure() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path()).unwrap();

        assert!(result.created);
        assert_eq!(result.walkspec_dir, dir.path().join(".walkspec"));
        assert!(result.walkspec_dir.join("walkspec.toml").is_file());
        assert!(result.walkspec_dir.join("journal").is_file());
        assert!(result.walkspec_dir.join("logs").is_dir());
        assert_eq!(result.artifacts_dir, dir.path().join("artifacts"));
        assert!(result.artifacts_dir.join("backups").is_dir());
    }

    #[test]
    fn test_init_project_writes_loadable_config() {
        let dir = tempdir().unwrap();
        let result = init_project(dir.path()).unwrap();
        let toml = WalkspecToml::load(&result.walkspec_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(toml, WalkspecToml::default());
    }

    #[test]
    fn test_init_project_twice_returns_created_false() {
        let dir = tempdir().unwrap();
        assert!(init_project(dir.path()).unwrap().created);
        assert!(!init_project(dir.path()).unwrap().created);
    }

    #[test]
    fn test_init_project_keeps_existing_config_and_journal() {
        let dir = tempdir().unwrap();
        let walkspec_dir = dir.path().join(".walkspec");
        std::fs::create_dir_all(&walkspec_dir).unwrap();
        std::fs::write(
            walkspec_dir.join(CONFIG_FILE),
            "[artifacts]\ndir = \"docs\"\n",
        )
        .unwrap();
        std::fs::write(walkspec_dir.join("journal"), "a|stop|completed|t\n").unwrap();

        let result = init_project(dir.path()).unwrap();

        assert_eq!(result.artifacts_dir, dir.path().join("docs"));
        assert!(dir.path().join("docs/backups").is_dir());
        assert_eq!(
            std::fs::read_to_string(walkspec_dir.join(CONFIG_FILE)).unwrap(),
            "[artifacts]\ndir = \"docs\"\n"
        );
        assert_eq!(
            std::fs::read_to_string(walkspec_dir.join("journal")).unwrap(),
            "a|stop|completed|t\n"
        );
    }

    // =========================================
    // is_initialized tests
    // =========================================

    #[test]
    fn test_is_initialized() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));
        init_project(dir.path()).unwrap();
        assert!(is_initialized(dir.path()));
    }
}
