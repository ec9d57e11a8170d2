//! Debug snapshots of pages that yielded nothing
//!
//! Writes `<dir>/<label>-<YYYYmmdd-HHMMSS>.html` and `.png`, stamped in
//! UTC. Snapshot failures are logged and swallowed; they never affect the
//! crawl result.

use crate::browser::PageDriver;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Files written for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub html: Option<PathBuf>,
    pub png: Option<PathBuf>,
}

/// Destination for debug snapshots
#[derive(Debug, Clone)]
pub struct DebugSink {
    dir: PathBuf,
}

impl DebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captures the page markup and a full-page screenshot
    ///
    /// # Arguments
    ///
    /// * `page` - The page to capture, still open
    /// * `label` - Why the snapshot is taken, e.g. `no-comments`
    ///
    /// # Returns
    ///
    /// The paths that were written; a part that failed is `None`
    pub async fn capture<P: PageDriver + ?Sized>(&self, page: &P, label: &str) -> Snapshot {
        let stem = format!("{}-{}", label, Utc::now().format("%Y%m%d-%H%M%S"));
        let mut snapshot = Snapshot::default();

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!("Cannot create debug directory {}: {}", self.dir.display(), e);
            return snapshot;
        }

        match page.content().await {
            Ok(html) => {
                let path = self.dir.join(format!("{}.html", stem));
                match tokio::fs::write(&path, html).await {
                    Ok(()) => snapshot.html = Some(path),
                    Err(e) => tracing::warn!("Failed to write {}: {}", path.display(), e),
                }
            }
            Err(e) => tracing::warn!("Page markup unavailable for snapshot: {}", e),
        }

        match page.screenshot().await {
            Ok(png) => {
                let path = self.dir.join(format!("{}.png", stem));
                match tokio::fs::write(&path, png).await {
                    Ok(()) => snapshot.png = Some(path),
                    Err(e) => tracing::warn!("Failed to write {}: {}", path.display(), e),
                }
            }
            Err(e) => tracing::warn!("Screenshot unavailable for snapshot: {}", e),
        }

        if let Some(html) = &snapshot.html {
            tracing::warn!("Saved debug snapshot {}", html.display());
        }
        snapshot
    }
}
