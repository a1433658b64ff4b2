//! Read-only views of the documents, backups and journal.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use super::{documents, load_config};
use crate::DocumentKind;
use walkspec::orchestrator::Journal;

pub fn cmd_show(project_dir: &Path, kind: DocumentKind) -> Result<()> {
    let config = load_config(project_dir, false)?;
    let documents = documents(&config);

    let (text, label) = match kind {
        DocumentKind::Description => (documents.read_description()?, "description"),
        DocumentKind::Phasing => (documents.read_phasing()?, "phasing"),
        DocumentKind::Spec => (documents.read_combined()?, "spec"),
    };

    match text {
        Some(text) => print!("{}", ensure_trailing_newline(&text)),
        None => println!("No {} has been written yet.", label),
    }
    Ok(())
}

pub fn cmd_phases(project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir, false)?;
    let documents = documents(&config);

    let Some(document) = documents.read_phase_document()? else {
        println!("No phasing has been written yet.");
        return Ok(());
    };
    if document.is_empty() {
        println!("The phasing document has no phases.");
        return Ok(());
    }

    println!();
    for phase in document.phases() {
        println!(
            "  {} {}",
            style(format!("{:>2}.", phase.number)).bold(),
            phase.title
        );
        if !phase.definition_of_done.is_empty() {
            println!("      {}", style(&phase.definition_of_done).dim());
        }
    }
    println!();

    if let Err(e) = document.validate_numbering() {
        println!("{} {}", style("Warning:").yellow(), e);
    }
    Ok(())
}

pub fn cmd_backups(project_dir: &Path, name: &str) -> Result<()> {
    let config = load_config(project_dir, false)?;
    let documents = documents(&config);

    let backups = documents
        .store()
        .backups(name)
        .with_context(|| format!("Failed to list backups of {}", name))?;
    if backups.is_empty() {
        println!("No backups of {} yet.", name);
        return Ok(());
    }

    println!("Backups of {} (newest first):", name);
    for backup in backups {
        println!("  {}  {}", style(&backup.stamp).cyan(), backup.path.display());
    }
    Ok(())
}

pub fn cmd_journal(project_dir: &Path, limit: usize) -> Result<()> {
    let config = load_config(project_dir, false)?;
    let entries = Journal::new(config.journal_file()).tail(limit)?;

    if entries.is_empty() {
        println!("No actions recorded yet.");
        return Ok(());
    }

    for entry in entries {
        let status = match entry.status.as_str() {
            "completed" => style(entry.status.clone()).green(),
            "rejected" => style(entry.status.clone()).yellow(),
            _ => style(entry.status.clone()).red(),
        };
        println!(
            "{}  {:<20} {}",
            style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            entry.action,
            status
        );
    }
    Ok(())
}

fn ensure_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}
