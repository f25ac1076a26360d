//! Screenshot artifacts kept next to the ledger. Capturing them is best
//! effort: a failed screenshot is logged and never blocks the claim record.

use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::ClaimError;
use crate::offer::OfferKind;
use crate::utils::sanitize_filename;

#[derive(Debug, Clone)]
pub struct EvidenceDir {
    root: PathBuf,
}

impl EvidenceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/internal/<title>.png` or `<root>/external/<title>.png`
    pub fn offer_path(&self, kind: OfferKind, title: &str) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{}.png", sanitize_filename(title)))
    }

    /// `<root>/<timestamp>.png`
    pub fn run_path(&self, timestamp: &str) -> PathBuf {
        self.root
            .join(format!("{}.png", sanitize_filename(timestamp)))
    }

    /// Awaits the screenshot and writes it to `path`; failures are logged.
    /// Returns whether the artifact was saved.
    pub async fn capture<F>(&self, screenshot: F, path: PathBuf) -> bool
    where
        F: Future<Output = Result<Vec<u8>, ClaimError>>,
    {
        match save(screenshot, &path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Saved screenshot");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Screenshot not saved");
                false
            }
        }
    }
}

async fn save<F>(screenshot: F, path: &Path) -> Result<(), ClaimError>
where
    F: Future<Output = Result<Vec<u8>, ClaimError>>,
{
    let bytes = screenshot
        .await
        .map_err(|e| ClaimError::EvidenceCapture(e.to_string()))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ClaimError::EvidenceCapture(e.to_string()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ClaimError::EvidenceCapture(e.to_string()))
}
