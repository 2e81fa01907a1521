//! JSONL-backed history store.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::RunState;
use crate::error::{Result, RunwatchError};

const HISTORY_FILE: &str = "runs.jsonl";

/// A finished run as saved locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRun {
    pub run_key: String,
    pub saved_at: DateTime<Utc>,
    pub data: RunState,
}

impl SavedRun {
    pub fn new(run_key: impl Into<String>, data: RunState) -> Self {
        Self {
            run_key: run_key.into(),
            saved_at: Utc::now(),
            data,
        }
    }
}

pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    /// Open (creating the directory if needed) a store under `dir`.
    pub fn open(dir: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(HISTORY_FILE),
            max_entries: max_entries.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All saved runs, newest first. Corrupt lines are skipped.
    pub fn load(&self) -> Result<Vec<SavedRun>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut runs = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SavedRun>(&line) {
                Ok(run) => runs.push(run),
                Err(e) => warn!("Skipping corrupt history line {} in {}: {}", index + 1, self.path.display(), e),
            }
        }
        Ok(runs)
    }

    /// Save a run, replacing any earlier entry with the same key.
    pub fn save(&self, run: SavedRun) -> Result<()> {
        let mut runs = self.load()?;
        runs.retain(|r| r.run_key != run.run_key);
        runs.insert(0, run);
        runs.truncate(self.max_entries);
        self.rewrite(&runs)
    }

    pub fn get(&self, run_key: &str) -> Result<SavedRun> {
        self.load()?
            .into_iter()
            .find(|r| r.run_key == run_key)
            .ok_or_else(|| RunwatchError::RunNotFound(run_key.to_string()))
    }

    fn rewrite(&self, runs: &[SavedRun]) -> Result<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp)?;
            for run in runs {
                writeln!(file, "{}", serde_json::to_string(run)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
            .map_err(|e| RunwatchError::History(format!("Failed to replace {}: {}", self.path.display(), e)))
    }
}
