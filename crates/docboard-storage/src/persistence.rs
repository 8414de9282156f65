//! File-backed dashboard store
//!
//! Layout under the store root:
//! 1. `{id}.json` holds the serialized dashboard
//! 2. `{id}.txt` holds the normalised document text
//!
//! Every write goes to a hidden temporary file in the same directory and is
//! synced before it becomes visible. Readers therefore see either nothing or
//! the complete record. Dashboards are published with a hard link, which
//! fails when the id is already taken, so stores in separate processes
//! sharing a directory never overwrite each other. Document texts are
//! renamed into place.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use docboard_dashboard::{Dashboard, DashboardSummary};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{newest_first, DashboardStore, StoreError};

const DASHBOARD_EXT: &str = "json";
const TEXT_EXT: &str = "txt";
const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    /// Serializes the exists-check and rename of `save` on filesystems
    /// without hard links.
    publish: Mutex<()>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened dashboard store");
        Ok(Self {
            root,
            publish: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dashboard_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.{DASHBOARD_EXT}"))
    }

    pub fn text_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.{TEXT_EXT}"))
    }

    /// Write `bytes` to a temporary sibling and sync it. The caller renames.
    fn stage(&self, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let temp = self.root.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let result = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()
        })();
        if let Err(err) = result {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        Ok(temp)
    }

    fn publish_file(&self, temp: &Path, target: &Path) -> Result<(), StoreError> {
        fs::rename(temp, target).map_err(|err| {
            let _ = fs::remove_file(temp);
            StoreError::Io(err)
        })
    }

    /// Publish `temp` at `target` only if nothing is there yet.
    fn publish_new(&self, temp: &Path, target: &Path, id: Uuid) -> Result<(), StoreError> {
        match fs::hard_link(temp, target) {
            Ok(()) => {
                let _ = fs::remove_file(temp);
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(temp);
                Err(StoreError::AlreadyExists(id))
            }
            Err(err) => {
                tracing::debug!(error = %err, "hard link unavailable, publishing by rename");
                let _guard = self.publish.lock();
                if target.exists() {
                    let _ = fs::remove_file(temp);
                    return Err(StoreError::AlreadyExists(id));
                }
                self.publish_file(temp, target)
            }
        }
    }

    fn read(&self, path: &Path, id: Uuid) -> Result<String, StoreError> {
        fs::read_to_string(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound(id),
            _ => StoreError::Io(err),
        })
    }
}

impl DashboardStore for FileStore {
    fn save(&self, dashboard: &Dashboard) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(dashboard)?;
        let temp = self.stage(&json)?;
        let target = self.dashboard_path(dashboard.id);

        self.publish_new(&temp, &target, dashboard.id)?;
        tracing::info!(dashboard = %dashboard.id, path = %target.display(), "saved dashboard");
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Dashboard, StoreError> {
        let json = self.read(&self.dashboard_path(id), id)?;
        let dashboard = serde_json::from_str(&json)?;
        tracing::debug!(dashboard = %id, "loaded dashboard");
        Ok(dashboard)
    }

    fn list(&self) -> Result<Vec<DashboardSummary>, StoreError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some(DASHBOARD_EXT)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with(TEMP_PREFIX));
            if !is_record {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|json| serde_json::from_str::<Dashboard>(&json).map_err(StoreError::from));
            match parsed {
                Ok(dashboard) => summaries.push(dashboard.summary()),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable dashboard")
                }
            }
        }
        newest_first(&mut summaries);
        Ok(summaries)
    }

    fn save_document_text(&self, id: Uuid, text: &str) -> Result<(), StoreError> {
        let temp = self.stage(text.as_bytes())?;
        self.publish_file(&temp, &self.text_path(id))
    }

    fn document_text(&self, id: Uuid) -> Result<String, StoreError> {
        self.read(&self.text_path(id), id)
    }
}
