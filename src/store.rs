use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::defects::SewingDefect;
use crate::error::{AppError, AppResult};
use crate::orders::{InlineOrder, LineWorker};
use crate::pairing::PairingRecord;
use crate::roles::RoleEntry;
use crate::roving::RovingRecord;
use crate::saving;
use crate::users::User;

/// Everything the backend persists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    pub users: Vec<User>,
    pub roles: Vec<RoleEntry>,
    pub defects: Vec<SewingDefect>,
    pub roving: Vec<RovingRecord>,
    pub pairing: Vec<PairingRecord>,
    pub line_workers: Vec<LineWorker>,
    pub inline_orders: Vec<InlineOrder>,
}

/// Shared, lock-protected database with write-through persistence
///
/// Every successful [`Store::write`] rewrites the snapshot file before the
/// change becomes visible. A store
/// without a path keeps everything in memory, which is what the tests use.
pub struct Store {
    db: RwLock<Database>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open the snapshot at `path`, starting empty when it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = if path.exists() {
            let db = saving::load_database(&path)?;
            info!(
                "loaded database from {} ({} roving records, {} users)",
                path.display(),
                db.roving.len(),
                db.users.len()
            );
            db
        } else {
            info!("no database at {}, starting empty", path.display());
            Database::default()
        };

        Ok(Store {
            db: RwLock::new(db),
            path: Some(path),
        })
    }

    pub fn in_memory(db: Database) -> Self {
        Store {
            db: RwLock::new(db),
            path: None,
        }
    }

    /// Run a read-only query against the database
    pub fn read<T>(&self, f: impl FnOnce(&Database) -> T) -> AppResult<T> {
        let db = self
            .db
            .read()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
        Ok(f(&db))
    }

    /// Run a mutation and persist the result when it succeeds
    ///
    /// The mutation works on a copy that replaces the live database only
    /// after it was saved, so a failed closure or a failed save leaves the
    /// store untouched.
    pub fn write<T>(&self, f: impl FnOnce(&mut Database) -> AppResult<T>) -> AppResult<T> {
        let mut db = self
            .db
            .write()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
        let mut next = db.clone();
        let value = f(&mut next)?;
        if let Some(path) = &self.path {
            saving::save_database(&next, path)?;
            debug!("database saved to {}", path.display());
        }
        *db = next;
        Ok(value)
    }

    /// Swap the whole database, used when restoring a backup
    pub fn replace(&self, replacement: Database) -> AppResult<()> {
        self.write(|db| {
            *db = replacement;
            Ok(())
        })
    }

    pub fn snapshot(&self) -> AppResult<Vec<u8>> {
        let bytes = self.read(saving::serialize_to_memory)??;
        Ok(bytes)
    }
}
