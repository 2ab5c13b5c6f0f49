//! Write-ahead journal kept next to a store's main file.
//!
//! The journal is JSON lines. The first line names the store it belongs to;
//! every following line is one mutation not yet merged into the main file.

use super::atomic_file::write_atomic;
use ladder_core::{ObjectId, Record, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    Header {
        store_id: String,
    },
    Insert {
        entity: String,
        id: ObjectId,
        record: Record,
    },
    Update {
        entity: String,
        id: ObjectId,
        record: Record,
    },
    Delete {
        entity: String,
        id: ObjectId,
    },
}

/// What was found when reading a journal.
#[derive(Debug, PartialEq)]
pub enum JournalContents {
    /// No journal, or one holding nothing but an interrupted first write.
    Missing,
    /// The journal belongs to another store, e.g. one that was replaced.
    Stale { store_id: String },
    /// Complete entries. `damaged` is set when the file ends in a partial
    /// line and must be rewritten before anything is appended.
    Entries {
        entries: Vec<JournalEntry>,
        damaged: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads every complete entry, checking the header against `store_id`.
    ///
    /// A torn final line from an interrupted append is dropped.
    pub fn read(&self, store_id: &str) -> Result<JournalContents> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(JournalContents::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().collect();
        let last = lines.len().saturating_sub(1);
        let mut damaged = !content.is_empty() && !content.ends_with('\n');

        let mut entries = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(e) if index == last => {
                    tracing::warn!(
                        "Dropping torn journal line in {}: {}",
                        self.path.display(),
                        e
                    );
                    damaged = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if entries.is_empty() {
                match &entry {
                    JournalEntry::Header { store_id: owner } if owner == store_id => {}
                    JournalEntry::Header { store_id: owner } => {
                        return Ok(JournalContents::Stale {
                            store_id: owner.clone(),
                        });
                    }
                    _ => {
                        return Err(ladder_core::LadderError::store(format!(
                            "journal {} has no header",
                            self.path.display()
                        )));
                    }
                }
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Ok(JournalContents::Missing);
        }
        Ok(JournalContents::Entries {
            entries: entries
                .into_iter()
                .filter(|e| !matches!(e, JournalEntry::Header { .. }))
                .collect(),
            damaged,
        })
    }

    /// Appends one entry and syncs it, writing the header first if the
    /// journal is missing or empty.
    pub fn append(&self, store_id: &str, entry: &JournalEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut buf = Vec::new();
        if is_new {
            write_line(&mut buf, &header(store_id))?;
        }
        write_line(&mut buf, entry)?;

        file.write_all(&buf)?;
        file.sync_data()?;
        Ok(())
    }

    /// Atomically replaces the journal with a header and `entries`.
    pub fn rewrite(&self, store_id: &str, entries: &[JournalEntry]) -> Result<()> {
        let mut buf = Vec::new();
        write_line(&mut buf, &header(store_id))?;
        for entry in entries {
            write_line(&mut buf, entry)?;
        }
        write_atomic(&self.path, &buf)?;
        Ok(())
    }

    /// Deletes the journal. A missing journal is fine.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn header(store_id: &str) -> JournalEntry {
    JournalEntry::Header {
        store_id: store_id.to_string(),
    }
}

fn write_line(buf: &mut Vec<u8>, entry: &JournalEntry) -> Result<()> {
    serde_json::to_writer(&mut *buf, entry)?;
    buf.push(b'\n');
    Ok(())
}
