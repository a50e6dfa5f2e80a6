//! Transient file storage
//!
//! Layout under the work directory:
//! - `jobs/<uuid>/` per-request uploads and intermediate PDFs, removed when
//!   the request finishes
//! - `packages/` assembled packages awaiting their one-time download

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

const JOBS_DIR: &str = "jobs";
const PACKAGES_DIR: &str = "packages";

#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let work_dir = Self { root: root.into() };
        work_dir.ensure_layout()?;
        Ok(work_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join(PACKAGES_DIR)
    }

    /// Create a private directory for one request
    pub fn job(&self) -> io::Result<Job> {
        let id = Uuid::new_v4();
        let dir = self.root.join(JOBS_DIR).join(id.to_string());
        std::fs::create_dir_all(&dir)?;
        debug!(job = %id, "Created job directory");
        Ok(Job { id, dir })
    }

    /// Path of a package by client-supplied name, or `None` if the name is
    /// unusable once reduced to its base name
    pub fn package_path(&self, filename: &str) -> Option<PathBuf> {
        sanitize_filename(filename).map(|name| self.packages_dir().join(name))
    }

    /// Read a package and delete it
    pub async fn take_package(&self, filename: &str) -> io::Result<Option<Vec<u8>>> {
        let Some(path) = self.package_path(filename) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), "Failed to remove downloaded package: {}", e);
                }
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove everything and recreate the empty layout
    pub fn cleanup(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.ensure_layout()?;
        info!(root = %self.root.display(), "Cleaned work directory");
        Ok(())
    }

    fn ensure_layout(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.root.join(JOBS_DIR))?;
        std::fs::create_dir_all(self.packages_dir())
    }
}

/// Scratch space for one request
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub dir: PathBuf,
}

impl Job {
    /// Write an upload under its sanitized base name
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = sanitize_filename(filename).unwrap_or_else(|| "upload".to_string());
        let path = self.dir.join(format!("upload_{}", name));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn sections_dir(&self) -> PathBuf {
        self.dir.join("sections")
    }

    pub fn cover_path(&self) -> PathBuf {
        self.dir.join("cover.pdf")
    }

    /// Short unique stem for the package name
    pub fn package_stem(&self) -> String {
        let id = self.id.simple().to_string();
        format!("reorganized_{}", &id[..8])
    }

    pub fn remove(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!(job = %self.id, "Failed to remove job directory: {}", e);
        }
    }
}

/// Reduce a client-supplied name to a safe base name
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned)
    }
}
