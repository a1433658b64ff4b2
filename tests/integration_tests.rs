//! Integration tests for the walkspec CLI
//!
//! Everything here runs without a language model: commands either don't
//! need one, resolve locally (`stop`, `repeat`), or use a stub command in
//! place of the Claude CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a walkspec Command isolated from the caller's environment
fn walkspec() -> Command {
    let mut cmd = cargo_bin_cmd!("walkspec");
    for var in [
        "WALKSPEC_CLAUDE_CMD",
        "WALKSPEC_LLM_PROVIDER",
        "WALKSPEC_BASE_URL",
        "WALKSPEC_ARTIFACTS_DIR",
        "WALKSPEC_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn init_project(dir: &TempDir) {
    walkspec()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

const PHASING: &str = "# Project Phasing\n\n\
## Phase 1: Capture\n\n\
**Description:** Record utterances.\n\n\
**Definition of Done:** Transcripts arrive.\n\n\
## Phase 2: Route\n\n\
**Description:** Classify utterances.\n\n\
**Definition of Done:** Every utterance maps to one action.\n\n";

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        walkspec()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("chat"))
            .stdout(predicate::str::contains("phases"));
    }

    #[test]
    fn test_version() {
        walkspec().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        walkspec()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized walkspec project"));

        assert!(dir.path().join(".walkspec/walkspec.toml").is_file());
        assert!(dir.path().join(".walkspec/journal").is_file());
        assert!(dir.path().join(".walkspec/logs").is_dir());
        assert!(dir.path().join("artifacts/backups").is_dir());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();

        walkspec()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("init")
            .assert()
            .success();

        assert!(dir.path().join(".walkspec").is_dir());
    }

    #[test]
    fn test_unknown_show_target_is_rejected() {
        let dir = create_temp_project();
        walkspec()
            .current_dir(dir.path())
            .args(["show", "novel"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Document View Tests
// =============================================================================

mod documents {
    use super::*;

    #[test]
    fn test_show_missing_documents() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .args(["show", "description"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No description has been written yet"));
    }

    #[test]
    fn test_show_phasing_prints_file() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(dir.path().join("artifacts/phasing.md"), PHASING).unwrap();

        walkspec()
            .current_dir(dir.path())
            .args(["show", "phasing"])
            .assert()
            .success()
            .stdout(predicate::str::diff(PHASING));
    }

    #[test]
    fn test_show_spec_joins_sections() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(dir.path().join("artifacts/description.md"), "A voice spec editor.\n").unwrap();
        fs::write(dir.path().join("artifacts/phasing.md"), PHASING).unwrap();

        walkspec()
            .current_dir(dir.path())
            .args(["show", "spec"])
            .assert()
            .success()
            .stdout(predicate::str::contains("# Project Description"))
            .stdout(predicate::str::contains("A voice spec editor."))
            .stdout(predicate::str::contains("## Phase 2: Route"));
    }

    #[test]
    fn test_phases_lists_titles() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(dir.path().join("artifacts/phasing.md"), PHASING).unwrap();

        walkspec()
            .current_dir(dir.path())
            .arg("phases")
            .assert()
            .success()
            .stdout(predicate::str::contains("Capture"))
            .stdout(predicate::str::contains("Route"));
    }

    #[test]
    fn test_phases_without_document() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .arg("phases")
            .assert()
            .success()
            .stdout(predicate::str::contains("No phasing has been written yet"));
    }

    #[test]
    fn test_unified_layout_reads_spec_file() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path().join(".walkspec/walkspec.toml"),
            "[artifacts]\nlayout = \"unified\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("artifacts/spec.md"),
            format!("# Project Description\n\nA thing.\n\n{}", PHASING),
        )
        .unwrap();

        walkspec()
            .current_dir(dir.path())
            .args(["show", "description"])
            .assert()
            .success()
            .stdout(predicate::str::contains("A thing."));
    }

    #[test]
    fn test_backups_empty() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .args(["backups", "phasing"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No backups of phasing yet"));
    }

    #[test]
    fn test_backups_lists_files() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path()
                .join("artifacts/backups/phasing.20260102T030405006.backup"),
            PHASING,
        )
        .unwrap();

        walkspec()
            .current_dir(dir.path())
            .args(["backups", "phasing"])
            .assert()
            .success()
            .stdout(predicate::str::contains("20260102T030405006"));
    }
}

// =============================================================================
// Session Tests
// =============================================================================

mod session {
    use super::*;

    #[test]
    fn test_say_stop_needs_no_model() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .args(["say", "stop"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Okay."));

        walkspec()
            .current_dir(dir.path())
            .arg("journal")
            .assert()
            .success()
            .stdout(predicate::str::contains("stop"))
            .stdout(predicate::str::contains("completed"));
    }

    #[test]
    fn test_say_repeat_with_nothing_said() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .args(["say", "say", "that", "again"])
            .assert()
            .success()
            .stdout(predicate::str::contains("haven't said anything"));
    }

    #[test]
    fn test_journal_empty() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .arg("journal")
            .assert()
            .success()
            .stdout(predicate::str::contains("No actions recorded yet"));
    }

    #[test]
    fn test_chat_reads_stdin_until_exit() {
        let dir = create_temp_project();
        init_project(&dir);

        walkspec()
            .current_dir(dir.path())
            .arg("chat")
            .write_stdin("stop\nexit\nstop\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("Okay."));

        let journal = fs::read_to_string(dir.path().join(".walkspec/journal")).unwrap();
        assert_eq!(journal.lines().count(), 1);
        assert!(dir.path().join(".walkspec/logs/walkspec.log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_say_conversation_with_stub_model() {
        use std::os::unix::fs::PermissionsExt;

        let dir = create_temp_project();
        init_project(&dir);
        let stub = dir.path().join("fake-claude");
        fs::write(&stub, "#!/bin/sh\necho 'Sounds like a fun project.'\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        walkspec()
            .current_dir(dir.path())
            .env("WALKSPEC_CLAUDE_CMD", &stub)
            .args(["say", "I want to build a recipe app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Sounds like a fun project."));
    }
}

// =============================================================================
// Config Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        walkspec()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No walkspec.toml found"))
            .stdout(predicate::str::contains("provider = \"claude-cli\""));
    }

    #[test]
    fn test_config_show_env_override() {
        let dir = create_temp_project();

        walkspec()
            .current_dir(dir.path())
            .env("WALKSPEC_LLM_PROVIDER", "chat-completions")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("provider = \"chat-completions\""))
            .stdout(predicate::str::contains("moonshotai/kimi-k2-instruct-0905"));
    }

    #[test]
    fn test_config_validate_without_file() {
        let dir = create_temp_project();

        walkspec()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path().join(".walkspec/walkspec.toml"),
            "[artifacts]\nbackup_retention = 0\n",
        )
        .unwrap();

        walkspec()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("backup_retention"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();

        walkspec()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created walkspec.toml"));

        let content = fs::read_to_string(dir.path().join(".walkspec/walkspec.toml")).unwrap();
        assert!(content.contains("[artifacts]"));
        assert!(content.contains("[llm.retry]"));
    }

    #[test]
    fn test_config_init_force_overwrites() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(dir.path().join(".walkspec/walkspec.toml"), "[router]\nhistory_turns = 3\n").unwrap();

        walkspec()
            .current_dir(dir.path())
            .args(["config", "init", "--force"])
            .assert()
            .success();

        let content = fs::read_to_string(dir.path().join(".walkspec/walkspec.toml")).unwrap();
        assert!(content.contains("history_turns = 10"));
    }
}
