//! Request pipelines
//!
//! Reorganization runs strictly in sequence: extract text, segment, ask the
//! advisor, build the plan, split pages, assemble. Each stage waits for the
//! previous one to finish. Blocking work runs on the blocking pool under a
//! timeout.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use compliance_engine::{
    build_plan, extraction_quality, parse_advisor_output, segmenter::annotate_previews,
    AdvisorProposal, DocumentAnalysis, Industry, RuleBook,
};
use pdfjoin_core::{assemble, extract_pages, CoverPage, PdfJoinError};
use serde::Serialize;
use shared_types::{
    Degradation, ExtractedText, ExtractionMetadata, LenderRequirements, PlanSummary,
    ReorganizationPlan, Section,
};
use tracing::{debug, info, warn};

use crate::advisor::cache_key;
use crate::error::ServerError;
use crate::state::AppState;
use crate::storage::Job;

/// Run blocking work with a timeout
pub async fn run_blocking<T, F>(timeout_ms: u64, work: F) -> Result<T, ServerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        tokio::task::spawn_blocking(work),
    )
    .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(ServerError::Internal(format!(
            "Worker task failed: {}",
            join_error
        ))),
        Err(_) => Err(ServerError::Timeout(timeout_ms)),
    }
}

/// Run blocking work that writes files, removing them if the request times out.
///
/// The work hands its outputs to `Handoff::publish` as its last step.
pub async fn run_blocking_with_outputs<T, F>(timeout_ms: u64, work: F) -> Result<T, ServerError>
where
    F: FnOnce(&Handoff) -> T + Send + 'static,
    T: Send + 'static,
{
    let handoff = Handoff::default();
    let worker = handoff.clone();
    let result = run_blocking(timeout_ms, move || work(&worker)).await;
    if matches!(result, Err(ServerError::Timeout(_))) {
        handoff.abandon();
    }
    result
}

#[derive(Debug, Default)]
enum HandoffState {
    #[default]
    Pending,
    Published(Vec<PathBuf>),
    Abandoned,
}

/// Files written by blocking work on behalf of a request.
///
/// Whichever side comes second removes the files when the request has
/// stopped waiting: `abandon` removes what was already published, and
/// `publish` after `abandon` removes its own outputs.
#[derive(Debug, Clone, Default)]
pub struct Handoff(Arc<Mutex<HandoffState>>);

impl Handoff {
    /// Record outputs. Returns false, after removing them, if the request
    /// already gave up.
    pub fn publish(&self, paths: Vec<PathBuf>) -> bool {
        let mut state = match self.0.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &mut *state {
            HandoffState::Abandoned => {
                paths.iter().for_each(|p| remove_output(p));
                false
            }
            HandoffState::Published(published) => {
                published.extend(paths);
                true
            }
            HandoffState::Pending => {
                *state = HandoffState::Published(paths);
                true
            }
        }
    }

    pub fn abandon(&self) {
        let mut state = match self.0.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let HandoffState::Published(paths) = std::mem::replace(&mut *state, HandoffState::Abandoned) {
            paths.iter().for_each(|p| remove_output(p));
        }
    }
}

fn remove_output(path: &Path) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed output of abandoned request"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove abandoned output: {}", e),
    }
}

fn abandoned() -> PdfJoinError {
    PdfJoinError::OperationError("request stopped waiting".to_string())
}

/// Extract text, turning every failure into an `ExtractionError` degradation
pub async fn extract_text(
    state: &AppState,
    path: &Path,
    filename: &str,
) -> Result<ExtractedText, Degradation> {
    let extractor = Arc::clone(&state.extractor);
    let (owned_path, owned_name) = (path.to_path_buf(), filename.to_string());

    let message =
        match run_blocking(state.limits.pdf_timeout_ms, move || {
            extractor.extract(&owned_path, &owned_name)
        })
        .await
        {
            Ok(Ok(extracted)) => return Ok(extracted),
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };

    warn!(filename, "Text extraction failed: {}", message);
    Err(Degradation::ExtractionError {
        file: filename.to_string(),
        message,
    })
}

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub extraction: Option<ExtractionMetadata>,
    pub text_quality: u8,
    pub industry: Option<Industry>,
    #[serde(flatten)]
    pub analysis: DocumentAnalysis,
    pub warnings: Vec<Degradation>,
}

/// Analyze one uploaded file. Extraction failures degrade to empty text.
pub async fn analyze(
    state: &AppState,
    upload: &Path,
    filename: &str,
    requirements: Option<&LenderRequirements>,
    industry: Option<Industry>,
) -> Analysis {
    let mut warnings = Vec::new();
    let (text, extraction) = match extract_text(state, upload, filename).await {
        Ok(extracted) => (extracted.text, Some(extracted.metadata)),
        Err(degradation) => {
            warnings.push(degradation);
            (String::new(), None)
        }
    };

    let analysis = match industry {
        Some(industry) => state.engine.analyze(
            &text,
            filename,
            requirements,
            &RuleBook::for_industry(industry),
        ),
        None => {
            let rules = state.rules.read().await;
            state.engine.analyze(&text, filename, requirements, &rules)
        }
    };

    info!(
        filename,
        sections = analysis.sections.len(),
        categories = analysis.categories.len(),
        "Analyzed document"
    );

    Analysis {
        extraction,
        text_quality: extraction_quality(&text),
        industry,
        analysis,
        warnings,
    }
}

#[derive(Debug, Serialize)]
pub struct Reorganization {
    pub plan: ReorganizationPlan,
    pub summary: PlanSummary,
    /// Package filename for the one-time download
    pub package: String,
    pub page_count: u32,
    pub source_pages: u32,
    pub text_quality: u8,
    pub warnings: Vec<Degradation>,
}

/// Reorganize an uploaded PDF into a package.
///
/// Only an unreadable source or an unwritable output is an error; everything
/// else is reported in `warnings`.
pub async fn reorganize(
    state: &AppState,
    job: &Job,
    upload: &Path,
    filename: &str,
    requirements: Option<LenderRequirements>,
) -> Result<Reorganization, ServerError> {
    let mut warnings = Vec::new();
    let requirements = requirements.as_ref();

    let text = match extract_text(state, upload, filename).await {
        Ok(extracted) => extracted.text,
        Err(degradation) => {
            warnings.push(degradation);
            String::new()
        }
    };

    let mut sections = state.engine.segment(&text, filename, requirements);
    {
        let rules = state.rules.read().await;
        annotate_previews(&mut sections, &text, &rules);
    }
    debug!(sections = sections.len(), "Segmented upload");

    let (proposal, advisor_warning) = advise(state, &text, &sections, requirements).await;
    warnings.extend(advisor_warning);

    let plan = build_plan(sections, requirements, proposal.as_ref());
    let summary = plan.summary();

    let pdf_timeout = state.limits.pdf_timeout_ms;
    let source = upload.to_path_buf();
    let ordered = plan.ordered_sections.clone();
    let sections_dir = job.sections_dir();
    let job_dir = job.dir.clone();
    let extraction = run_blocking_with_outputs(pdf_timeout, move |handoff| {
        let extraction = extract_pages(&source, &ordered, &sections_dir)?;
        if handoff.publish(vec![job_dir]) {
            Ok(extraction)
        } else {
            Err(abandoned())
        }
    })
    .await??;
    warnings.extend(extraction.warnings);

    let cover = CoverPage::new(
        summary.clone(),
        &requirements.cloned().unwrap_or_default(),
    );
    let cover_path = job.cover_path();
    let documents = extraction.documents;
    let packages_dir = state.storage.packages_dir();
    let stem = job.package_stem();
    let job_dir = job.dir.clone();
    let assembly = run_blocking_with_outputs(pdf_timeout, move |handoff| -> Result<_, PdfJoinError> {
        // A cover that fails to render is reported by assemble as missing
        match cover.render_to_bytes() {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&cover_path, bytes) {
                    warn!("Failed to write cover page: {}", e);
                }
            }
            Err(e) => warn!("Failed to render cover page: {}", e),
        }
        let assembly = assemble(Some(&cover_path), &documents, &packages_dir, &stem)?;
        if handoff.publish(vec![job_dir, assembly.path.clone()]) {
            Ok(assembly)
        } else {
            Err(abandoned())
        }
    })
    .await??;
    warnings.extend(assembly.warnings.iter().cloned());

    info!(
        package = %assembly.filename(),
        pages = assembly.page_count,
        compliance = plan.compliance_score,
        advisor_used = plan.advisor_used,
        warnings = warnings.len(),
        "Reorganized package"
    );

    Ok(Reorganization {
        package: assembly.filename(),
        page_count: assembly.page_count,
        source_pages: extraction.total_pages,
        text_quality: extraction_quality(&text),
        summary,
        plan,
        warnings,
    })
}

/// Ask the advisor for an order, using the cache when possible.
///
/// Returns no proposal and no warning when no advisor is configured.
async fn advise(
    state: &AppState,
    text: &str,
    sections: &[Section],
    requirements: Option<&LenderRequirements>,
) -> (Option<AdvisorProposal>, Option<Degradation>) {
    let Some(advisor) = &state.advisor else {
        return (None, None);
    };

    let key = cache_key(text, requirements);
    let cached = state.advice.lock().await.get(&key);
    if let Some(proposal) = cached {
        debug!("Advisor cache hit");
        return (Some(proposal), None);
    }

    let timeout_ms = state.limits.advisor_timeout_ms;
    let call = advisor.propose_order(sections, requirements);
    let reason = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(Ok(raw)) => match parse_advisor_output(&raw) {
            Some(proposal) => {
                state.advice.lock().await.put(key, proposal.clone());
                return (Some(proposal), None);
            }
            None => "advisor reply contained no usable document order".to_string(),
        },
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("advisor timed out after {}ms", timeout_ms),
    };

    warn!("Falling back to catalog order: {}", reason);
    (None, Some(Degradation::AdvisorUnavailable { reason }))
}
