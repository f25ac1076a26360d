//! Minimal JSON document store: the whole document lives in memory, is
//! mutated in place and written back in one go.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::errors::ClaimError;

#[derive(Debug)]
pub struct JsonDb<T> {
    path: PathBuf,
    pub data: T,
}

impl<T> JsonDb<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Reads the document; a missing or empty file yields `T::default()`.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ClaimError> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => T::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ClaimError::Ledger(format!("{} is not a valid document: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No document yet, starting empty");
                T::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    /// Writes the document through a sibling temp file so a crash mid-write
    /// leaves the previous version intact.
    pub async fn write(&self) -> Result<(), ClaimError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(&self.data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        info!(path = %self.path.display(), "Document written");
        Ok(())
    }
}
