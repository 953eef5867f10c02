//! Scoped temporary storage for intermediate rasters.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A private scratch directory tied to one pipeline invocation.
///
/// Contents are removed when the area is released or dropped, whichever
/// comes first, so intermediate files never outlive the invocation that
/// produced them — early error returns and panics included. Each invocation
/// acquires its own area, so concurrent runs never collide.
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory under the system temp location.
    pub fn acquire() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("scanlens-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "Staging area acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy `source` into the area, keeping its file name. Returns the path
    /// of the staged copy.
    pub fn stage_copy(&self, source: &Path) -> io::Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "source has no file name")
        })?;
        let target = self.dir.path().join(name);
        std::fs::copy(source, &target)?;
        tracing::debug!(file = %target.display(), "Slice staged");
        Ok(target)
    }

    /// Remove the area and everything in it. Dropping the area has the same
    /// effect; this form surfaces removal errors.
    pub fn release(self) -> io::Result<()> {
        self.dir.close()
    }
}
