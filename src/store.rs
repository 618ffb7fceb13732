use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::types::{DaemonConfig, QueueRecord, DEFAULT_EMAIL_HOUR, DEFAULT_INTERVAL_HOURS};

/// JSON-backed config and queue storage rooted at a data directory.
///
/// All writes go through the write-temp-rename pattern so a reader never
/// observes a partially written file. A single daemon process is assumed to
/// own the directory exclusively; concurrent daemons would race.
#[derive(Clone, Debug)]
pub struct DataStore {
    dir: PathBuf,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.dir.join("queue.json")
    }

    // --- Config ---

    /// Load config.json, repairing it as needed. Never fails: a missing,
    /// unreadable, or non-object file is treated as `{}` before defaults are
    /// merged. Existing keys are never overwritten; the file is written back
    /// only when a default was merged in or the file was absent.
    pub fn load_config(&self) -> DaemonConfig {
        let path = self.config_path();
        let existed = path.exists();

        let mut obj = match fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
        {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        let mut merged = false;
        let defaults = [
            ("interval_hours", json!(DEFAULT_INTERVAL_HOURS)),
            ("email_hour", json!(DEFAULT_EMAIL_HOUR)),
        ];
        for (key, value) in defaults {
            if !obj.contains_key(key) {
                obj.insert(key.to_string(), value);
                merged = true;
            }
        }

        // A key with an unusable type (e.g. interval_hours as a string) is
        // corruption too, repaired to full defaults rather than erroring.
        let config: DaemonConfig =
            serde_json::from_value(Value::Object(obj)).unwrap_or_default();

        if merged || !existed {
            if let Err(e) = self.write_config(&config) {
                warn!("failed to write repaired config: {}", e);
            }
        }

        config
    }

    /// Persist config.json atomically. This is the one store operation whose
    /// failure is surfaced to the caller, since silently dropping a config write
    /// must not look like success.
    pub fn write_config(&self, config: &DaemonConfig) -> Result<(), String> {
        self.write_json(&self.config_path(), config)
    }

    // --- Queue ---

    /// Load queue.json. Absent or malformed content yields an empty queue,
    /// not an error.
    pub fn load_queue(&self) -> Vec<QueueRecord> {
        match fs::read_to_string(self.queue_path()) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Append one record via read-modify-write with atomic rename.
    pub fn append_to_queue(&self, record: &QueueRecord) -> Result<(), String> {
        let mut queue = self.load_queue();
        queue.push(record.clone());
        self.write_json(&self.queue_path(), &queue)
    }

    /// Atomically replace queue.json with an empty array.
    pub fn clear_queue(&self) -> Result<(), String> {
        self.write_json(&self.queue_path(), &Vec::<QueueRecord>::new())
    }

    // --- Internal ---

    /// Serialize `value` as pretty-printed JSON and atomically rename it over
    /// `path`. Writes to a temp file in the same directory first; the temp
    /// file is removed on any failure (NamedTempFile deletes on drop).
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), String> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create {}: {}", self.dir.display(), e))?;

        let body = serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize {}: {}", path.display(), e))?;

        let temp_file = NamedTempFile::new_in(&self.dir)
            .map_err(|e| format!("Failed to create temp file in {}: {}", self.dir.display(), e))?;

        fs::write(temp_file.path(), &body)
            .map_err(|e| format!("Failed to write temp file: {}", e))?;

        // sync to disk before rename
        let file = fs::File::open(temp_file.path())
            .map_err(|e| format!("Failed to open temp file for sync: {}", e))?;
        file.sync_all()
            .map_err(|e| format!("Failed to sync temp file: {}", e))?;

        temp_file
            .persist(path)
            .map_err(|e| format!("Failed to rename temp file to {}: {}", path.display(), e))?;

        Ok(())
    }
}
