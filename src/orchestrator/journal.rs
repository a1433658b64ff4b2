//! Append-only record of executed actions.
//!
//! One line per finished item: `id|action|status|timestamp`, timestamp in
//! RFC 3339.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::state::ActionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub action: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn append(&self, id: &str, action: &str, status: ActionStatus) -> Result<()> {
        let line = format!("{}|{}|{}|{}\n", id, action, status, Utc::now().to_rfc3339());

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?
            .write_all(line.as_bytes())
            .context("Failed to write journal entry")?;

        Ok(())
    }

    /// All entries in order. Malformed lines are skipped.
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read journal: {}", self.path.display()))?;

        Ok(content.lines().filter_map(parse_line).collect())
    }

    /// The last `n` entries.
    pub fn tail(&self, n: usize) -> Result<Vec<JournalEntry>> {
        let entries = self.entries()?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

fn parse_line(line: &str) -> Option<JournalEntry> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() != 4 {
        return None;
    }
    Some(JournalEntry {
        id: parts[0].to_string(),
        action: parts[1].to_string(),
        status: parts[2].to_string(),
        timestamp: DateTime::parse_from_rfc3339(parts[3])
            .ok()?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal"));

        journal.append("a1", "write_phasing", ActionStatus::Completed).unwrap();
        journal.append("a2", "merge_phases", ActionStatus::Rejected).unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "a1");
        assert_eq!(entries[0].action, "write_phasing");
        assert_eq!(entries[1].status, "rejected");
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal"));
        assert!(journal.entries().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");
        std::fs::write(
            &path,
            "garbage\na|stop|completed|not-a-time\nb|stop|completed|2026-01-02T03:04:05+00:00\n",
        )
        .unwrap();

        let entries = Journal::new(path).entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b");
    }

    #[test]
    fn test_tail() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal"));
        for i in 0..5 {
            journal
                .append(&format!("id{i}"), "stop", ActionStatus::Completed)
                .unwrap();
        }
        let tail = journal.tail(2).unwrap();
        assert_eq!(
            tail.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["id3", "id4"]
        );
    }
}
