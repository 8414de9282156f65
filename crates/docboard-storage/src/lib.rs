//! Docboard Dashboard Store
//!
//! Dashboards are immutable once assembled and addressed only by id:
//!
//! ```text
//! ┌──────────────┐   save(dashboard)   ┌────────────────────────────┐
//! │  Pipeline    │────────────────────►│  DashboardStore            │
//! │  (assembler) │                     │                            │
//! └──────────────┘                     │  MemoryStore  (RwLock map) │
//!                                      │  FileStore    ({id}.json,  │
//! ┌──────────────┐   get(id) / list()  │               {id}.txt)    │
//! │  CLI / API   │◄────────────────────│                            │
//! └──────────────┘                     └────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **No overwrite**: saving an id twice is `AlreadyExists`
//! - **Atomic publish**: `get` never observes a partially written dashboard
//! - **Independent writers**: concurrent saves with distinct ids do not interfere
//!
//! The normalised document text is kept next to each dashboard as context
//! for follow-up questions.

pub mod persistence;


use std::collections::{BTreeMap, HashMap};

use docboard_dashboard::{Dashboard, DashboardSummary};
use parking_lot::RwLock;
use uuid::Uuid;

pub use persistence::FileStore;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dashboard {0} not found")]
    NotFound(Uuid),
    #[error("dashboard {0} already exists")]
    AlreadyExists(Uuid),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt dashboard record: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Store interface
// ============================================================================

pub trait DashboardStore: Send + Sync {
    /// Persist a new dashboard. Existing ids are never overwritten.
    fn save(&self, dashboard: &Dashboard) -> Result<(), StoreError>;

    fn get(&self, id: Uuid) -> Result<Dashboard, StoreError>;

    /// Summaries, newest first.
    fn list(&self) -> Result<Vec<DashboardSummary>, StoreError>;

    fn save_document_text(&self, id: Uuid, text: &str) -> Result<(), StoreError>;

    fn document_text(&self, id: Uuid) -> Result<String, StoreError>;
}

pub(crate) fn newest_first(summaries: &mut [DashboardSummary]) {
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, used by tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dashboards: RwLock<BTreeMap<Uuid, Dashboard>>,
    texts: RwLock<HashMap<Uuid, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dashboards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dashboards.read().is_empty()
    }
}

impl DashboardStore for MemoryStore {
    fn save(&self, dashboard: &Dashboard) -> Result<(), StoreError> {
        let mut dashboards = self.dashboards.write();
        if dashboards.contains_key(&dashboard.id) {
            return Err(StoreError::AlreadyExists(dashboard.id));
        }
        dashboards.insert(dashboard.id, dashboard.clone());
        tracing::debug!(dashboard = %dashboard.id, "saved dashboard in memory");
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Dashboard, StoreError> {
        self.dashboards
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<DashboardSummary>, StoreError> {
        let mut summaries: Vec<DashboardSummary> =
            self.dashboards.read().values().map(Dashboard::summary).collect();
        newest_first(&mut summaries);
        Ok(summaries)
    }

    fn save_document_text(&self, id: Uuid, text: &str) -> Result<(), StoreError> {
        self.texts.write().insert(id, text.to_string());
        Ok(())
    }

    fn document_text(&self, id: Uuid) -> Result<String, StoreError> {
        self.texts
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }
}

/// Open (creating if needed) a file-backed store rooted at `dir`.
pub fn open_store(dir: impl Into<std::path::PathBuf>) -> Result<FileStore, StoreError> {
    FileStore::open(dir)
}
