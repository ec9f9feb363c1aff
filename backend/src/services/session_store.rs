//! Whole-pool snapshots on disk.
//!
//! The file is one bincode blob of the full slot array. Loading never fails:
//! anything unreadable leaves the pool empty, which only forces clients to log
//! in again.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{models::session::Session, services::session_pool::SessionPool};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to prepare session store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode session snapshot: {0}")]
    Encode(#[from] bincode::Error),
    #[error("failed to write session store {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Restored { active: usize },
    Missing,
    Empty,
    Discarded,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sweeps, then writes the full slot array. Returns the number of active slots saved.
    pub async fn save(&self, pool: &SessionPool) -> Result<usize, PersistenceError> {
        pool.sweep();
        let slots = pool.snapshot();
        let active = slots.iter().filter(|s| s.active).count();
        let payload = bincode::serialize(&slots)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PersistenceError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|source| PersistenceError::Write {
                path: temp_path.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(PersistenceError::Write {
                path: self.path.clone(),
                source,
            });
        }

        tracing::info!(path = %self.path.display(), active, "saved session snapshot");
        Ok(active)
    }

    /// Restores the pool from disk, then sweeps whatever expired while we were down.
    pub async fn load(&self, pool: &SessionPool) -> LoadOutcome {
        let outcome = self.read_into(pool).await;
        let expired = pool.sweep();
        tracing::info!(
            path = %self.path.display(),
            ?outcome,
            expired,
            "loaded session snapshot"
        );
        outcome
    }

    async fn read_into(&self, pool: &SessionPool) -> LoadOutcome {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return LoadOutcome::Missing,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to read session store; starting with empty pool"
                );
                return LoadOutcome::Discarded;
            }
        };
        if bytes.is_empty() {
            return LoadOutcome::Empty;
        }

        let slots: Vec<Session> = match bincode::deserialize(&bytes) {
            Ok(slots) => slots,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to decode session store; starting with empty pool"
                );
                return LoadOutcome::Discarded;
            }
        };

        let active = slots.iter().filter(|s| s.active).count();
        if let Err(error) = pool.restore(slots) {
            tracing::warn!(
                path = %self.path.display(),
                error = %error,
                "session store does not match pool capacity; starting with empty pool"
            );
            return LoadOutcome::Discarded;
        }
        LoadOutcome::Restored { active }
    }
}
