//! Project initialization command.

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use walkspec::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);
    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized walkspec project at {}",
            result.walkspec_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .walkspec/");
        println!("  ├── walkspec.toml # Configuration (see `walkspec config`)");
        println!("  ├── journal       # Executed actions");
        println!("  └── logs/         # Chat session logs");
        println!("  {}/", result.artifacts_dir.display());
        println!("  └── backups/      # Previous versions of each document");
        println!();
        println!("Next steps:");
        println!("  1. Run `walkspec chat` and describe your project");
        println!("  2. Say \"write the description\", then \"write the phasing\"");
    } else if was_initialized {
        println!(
            "walkspec project already initialized at {}",
            result.walkspec_dir.display()
        );
        println!("Directory structure verified.");
    }

    Ok(())
}
