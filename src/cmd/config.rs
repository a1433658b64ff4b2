//! Configuration view and validation commands — `walkspec config`.

use anyhow::Result;

use super::super::ConfigCommands;

fn print_model(label: &str, model: Option<String>) {
    match model {
        Some(model) => println!("  {} = \"{}\"", label, model),
        None => println!("  {} = (provider default)", label),
    }
}

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use walkspec::config::{CONFIG_FILE, WalkspecConfig, WalkspecToml};
    use walkspec::init::WALKSPEC_DIR;

    let walkspec_dir = project_dir.join(WALKSPEC_DIR);
    let config_path = walkspec_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", console::style("walkspec Configuration").bold());
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No walkspec.toml found at {}", config_path.display());
                println!("Using defaults. Run 'walkspec config init' to create one.");
            }
            println!();

            // Effective values include environment overrides.
            let config = WalkspecConfig::new(project_dir.to_path_buf())?;
            let toml = &config.toml;

            println!("[artifacts]");
            println!("  dir = \"{}\"", config.artifacts_dir().display());
            println!("  layout = \"{}\"", toml.artifacts.layout);
            println!("  backup_retention = {}", toml.artifacts.backup_retention);
            println!();
            println!("[router]");
            println!("  max_input_chars = {}", toml.router.max_input_chars);
            println!("  history_turns = {}", toml.router.history_turns);
            println!();
            println!("[conversation]");
            println!("  history_capacity = {}", toml.conversation.history_capacity);
            println!("  confirm_overwrite = {}", toml.conversation.confirm_overwrite);
            println!();
            println!("[llm]");
            println!("  provider = \"{}\"", toml.llm.provider);
            println!("  claude_cmd = \"{}\"", toml.llm.claude_cmd);
            println!("  base_url = \"{}\"", toml.llm.base_url);
            println!("  api_key_env = \"{}\"", toml.llm.api_key_env);
            print_model("router_model", toml.llm.router_model());
            print_model("content_model", toml.llm.content_model());
            print_model("search_model", toml.llm.search_model());
            print_model("deep_search_model", toml.llm.deep_search_model());
            println!("  timeout_secs = {}", toml.llm.timeout_secs);
            println!(
                "  retry = {} attempts, {}ms..{}ms backoff",
                toml.llm.retry.max_attempts,
                toml.llm.retry.initial_backoff_ms,
                toml.llm.retry.max_backoff_ms
            );
            println!();
            println!("[clipboard]");
            match &toml.clipboard.command {
                Some(command) => println!("  command = \"{}\"", command),
                None => println!("  command = (none, copy actions disabled)"),
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No walkspec.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = WalkspecToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("{}", console::style("Configuration warnings:").yellow());
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                use dialoguer::Confirm;
                let overwrite = Confirm::new()
                    .with_prompt(format!(
                        "{} already exists. Overwrite it with defaults?",
                        config_path.display()
                    ))
                    .default(false)
                    .interact()?;
                if !overwrite {
                    println!("Left {} unchanged.", config_path.display());
                    return Ok(());
                }
            }

            std::fs::create_dir_all(&walkspec_dir)?;
            WalkspecToml::default().save(&config_path)?;

            println!("Created walkspec.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [artifacts] dir, layout, backup_retention");
            println!("  - [llm] provider, models, timeouts and retry");
            println!("  - [clipboard] command used by the copy actions");
            println!();
        }
    }

    Ok(())
}
