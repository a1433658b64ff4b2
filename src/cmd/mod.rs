//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                          |
//! |-----------------|-------------------------------------------|
//! | `project`       | `Init`                                    |
//! | `session`       | `Chat`, `Say`                             |
//! | `documents`     | `Show`, `Phases`, `Backups`, `Journal`    |
//! | `config`        | `Config`                                  |

pub mod config;
pub mod documents;
pub mod project;
pub mod session;

pub use config::cmd_config;
pub use documents::{cmd_backups, cmd_journal, cmd_phases, cmd_show};
pub use project::cmd_init;
pub use session::{cmd_chat, cmd_say};

use anyhow::Result;
use std::path::Path;
use walkspec::artifact::{ArtifactStore, Documents};
use walkspec::config::WalkspecConfig;

/// Resolved configuration for commands that need a project directory.
pub(crate) fn load_config(project_dir: &Path, verbose: bool) -> Result<WalkspecConfig> {
    WalkspecConfig::with_cli_args(project_dir.to_path_buf(), verbose)
}

pub(crate) fn documents(config: &WalkspecConfig) -> Documents {
    let store = ArtifactStore::new(config.artifacts_dir())
        .with_backup_retention(config.toml.artifacts.backup_retention);
    Documents::new(store, config.toml.artifacts.layout)
}
