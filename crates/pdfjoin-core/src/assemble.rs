//! Package assembly
//!
//! Joins the cover page and the per-section documents into the final
//! package. Unreadable inputs are skipped; only a failure to write the
//! output is fatal.

use chrono::Utc;
use lopdf::Document;
use shared_types::Degradation;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::PdfJoinError;
use crate::merge::merge_to_bytes;
use crate::split::SectionDocument;

pub const COVER_SECTION: &str = "Cover Page";

#[derive(Debug, Clone)]
pub struct Assembly {
    pub path: PathBuf,
    pub page_count: u32,
    pub sections_included: usize,
    pub warnings: Vec<Degradation>,
}

impl Assembly {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Name for an assembled package: `<stem>_<UTC timestamp>.pdf`
pub fn package_filename(stem: &str) -> String {
    format!("{}_{}.pdf", stem, Utc::now().format("%Y%m%d_%H%M%S_%6f"))
}

/// Write `cover` (if any) followed by `sections` into `out_dir`.
///
/// `stem` should already be unique per request; a timestamp is appended.
pub fn assemble(
    cover: Option<&Path>,
    sections: &[SectionDocument],
    out_dir: &Path,
    stem: &str,
) -> Result<Assembly, PdfJoinError> {
    let mut warnings = Vec::new();
    let mut documents = Vec::with_capacity(sections.len() + 1);

    if let Some(cover) = cover {
        match load(cover) {
            Ok(doc) => documents.push(doc),
            Err(message) => {
                warn!(path = %cover.display(), "Skipping cover page: {}", message);
                warnings.push(Degradation::AssetMissing {
                    section: COVER_SECTION.to_string(),
                    message,
                });
            }
        }
    }

    let mut sections_included = 0;
    for section in sections {
        match load(&section.path) {
            Ok(doc) => {
                documents.push(doc);
                sections_included += 1;
            }
            Err(message) => {
                warn!(section = %section.name, "Skipping section: {}", message);
                warnings.push(Degradation::AssetMissing {
                    section: section.name.clone(),
                    message,
                });
            }
        }
    }

    let page_count: u32 = documents
        .iter()
        .map(|d| d.get_pages().len() as u32)
        .sum();
    let bytes = merge_to_bytes(documents)?;

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(package_filename(stem));
    std::fs::write(&path, bytes)?;

    info!(
        path = %path.display(),
        page_count,
        sections_included,
        skipped = warnings.len(),
        "Assembled package"
    );

    Ok(Assembly {
        path,
        page_count,
        sections_included,
        warnings,
    })
}

fn load(path: &Path) -> Result<Document, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    Document::load_mem(&bytes).map_err(|e| e.to_string())
}
