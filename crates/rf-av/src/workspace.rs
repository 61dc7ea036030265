//! Scratch space for intermediate artifacts.
//!
//! A [`Workspace`] owns a private temporary directory. Everything written
//! into it is removed when the workspace is dropped, whether the stage using
//! it succeeded or not.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory for one stage run.
///
/// # Example
///
/// ```no_run
/// use rf_av::Workspace;
///
/// let ws = Workspace::new_in(std::path::Path::new("/srv/uploads/thumbnails")).unwrap();
/// let frame = ws.temp_file("thumb_clip_temp.png");
/// // ... write and consume `frame` ...
/// drop(ws); // frame is gone
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a workspace inside `parent` (created if missing), keeping
    /// intermediates on the same filesystem as the final output.
    pub fn new_in(parent: &Path) -> rf_core::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let temp_dir = tempfile::Builder::new()
            .prefix(".reelforge-")
            .tempdir_in(parent)
            .map_err(|e| rf_core::Error::tool("workspace", format!("failed to create temp dir: {e}")))?;
        Ok(Self { temp_dir })
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a path for a named temporary file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}
