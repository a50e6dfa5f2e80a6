//! API handlers for the package server
//!
//! Provides REST endpoints for:
//! - Rule book management and industry templates
//! - Lender requirement sessions
//! - Document analysis
//! - Package reorganization and one-time download

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use compliance_engine::{parse_requirements, segmenter::is_pdf, Industry, NewRule, Rule};
use serde::{Deserialize, Serialize};
use shared_types::LenderRequirements;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;
use crate::pipeline::{self, Analysis, Reorganization};
use crate::state::{AppState, SharedState};
use crate::storage::sanitize_filename;

/// All routes, without the HTTP middleware added in `main`
pub fn router(state: SharedState) -> Router {
    let body_limit = state.limits.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Rules
        .route("/api/industries", get(handle_list_industries))
        .route("/api/rules", get(handle_list_rules).post(handle_add_rule))
        .route("/api/rules/:id", delete(handle_delete_rule))
        // Requirement sessions
        .route("/api/requirements", post(handle_parse_requirements))
        .route(
            "/api/requirements/:session_id",
            get(handle_get_requirements).delete(handle_delete_requirements),
        )
        // Documents
        .route("/api/analyze", post(handle_analyze))
        .route("/api/reorganize", post(handle_reorganize))
        .route("/api/download/:filename", get(handle_download))
        .route("/api/cleanup", post(handle_cleanup))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Health check response
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub advisor_configured: bool,
    pub sessions: usize,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "package-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        advisor_configured: state.advisor.is_some(),
        sessions: state.sessions.lock().await.len(),
    })
}

#[derive(Serialize)]
pub struct IndustryInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub document_types: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct IndustryListResponse {
    pub success: bool,
    pub industries: Vec<IndustryInfo>,
}

/// Handler: GET /api/industries
pub async fn handle_list_industries() -> Json<IndustryListResponse> {
    let industries = Industry::ALL
        .iter()
        .map(|industry| IndustryInfo {
            key: industry.key(),
            name: industry.display_name(),
            description: industry.description(),
            document_types: industry.document_types(),
        })
        .collect();

    Json(IndustryListResponse {
        success: true,
        industries,
    })
}

#[derive(Serialize)]
pub struct RuleListResponse {
    pub success: bool,
    pub rules: Vec<Rule>,
    pub count: usize,
}

/// Handler: GET /api/rules
pub async fn handle_list_rules(State(state): State<SharedState>) -> Json<RuleListResponse> {
    let rules = state.rules.read().await.rules();
    let count = rules.len();
    Json(RuleListResponse {
        success: true,
        rules,
        count,
    })
}

#[derive(Serialize)]
pub struct RuleResponse {
    pub success: bool,
    pub rule: Rule,
}

/// Handler: POST /api/rules
pub async fn handle_add_rule(
    State(state): State<SharedState>,
    Json(new_rule): Json<NewRule>,
) -> Result<Json<RuleResponse>, ServerError> {
    let rule = state.rules.write().await.add(new_rule)?;
    info!(id = rule.id, label = %rule.label, "Added rule");
    Ok(Json(RuleResponse {
        success: true,
        rule,
    }))
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Handler: DELETE /api/rules/:id
pub async fn handle_delete_rule(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<Json<SuccessResponse>, ServerError> {
    if state.rules.write().await.remove(id) {
        info!(id, "Removed rule");
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(ServerError::NotFound(format!("Rule {}", id)))
    }
}

#[derive(Deserialize)]
pub struct RequirementsRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct RequirementsResponse {
    pub success: bool,
    pub session_id: String,
    pub requirements: LenderRequirements,
}

/// Handler: POST /api/requirements
pub async fn handle_parse_requirements(
    State(state): State<SharedState>,
    Json(req): Json<RequirementsRequest>,
) -> Result<Json<RequirementsResponse>, ServerError> {
    if req.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest(
            "Requirement text is empty".into(),
        ));
    }

    let requirements = parse_requirements(&req.text);
    let session_id = Uuid::new_v4().to_string();
    state
        .sessions
        .lock()
        .await
        .put(session_id.clone(), requirements.clone());

    info!(
        session = %session_id,
        lender = %requirements.lender_name,
        documents = requirements.documents.len(),
        "Stored requirement session"
    );

    Ok(Json(RequirementsResponse {
        success: true,
        session_id,
        requirements,
    }))
}

/// Handler: GET /api/requirements/:session_id
pub async fn handle_get_requirements(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<RequirementsResponse>, ServerError> {
    let requirements = lookup_session(&state, &session_id).await?;
    Ok(Json(RequirementsResponse {
        success: true,
        session_id,
        requirements,
    }))
}

/// Handler: DELETE /api/requirements/:session_id
pub async fn handle_delete_requirements(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SuccessResponse>, ServerError> {
    match state.sessions.lock().await.remove(&session_id) {
        Some(_) => Ok(Json(SuccessResponse { success: true })),
        None => Err(ServerError::NotFound(format!("Session '{}'", session_id))),
    }
}

#[derive(Serialize)]
pub struct FileAnalysis {
    pub filename: String,
    #[serde(flatten)]
    pub result: Analysis,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub requirements_applied: bool,
    pub files: Vec<FileAnalysis>,
}

/// Handler: POST /api/analyze
///
/// Multipart fields: one or more `file` parts, optional `session_id` or
/// `requirements`, optional `industry`. Each file is analyzed on its own
/// and keeps its own warnings.
pub async fn handle_analyze(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ServerError> {
    let form = UploadForm::read(multipart).await?;
    let uploads = form.files()?;
    let requirements = resolve_requirements(&state, &form.fields).await?;
    let industry = form.fields.get("industry").map(|key| Industry::from_key(key));

    info!(files = uploads.len(), "Analyze request");

    let mut files = Vec::with_capacity(uploads.len());
    for (filename, bytes) in uploads {
        debug!(filename = %filename, size = bytes.len(), "Analyzing upload");
        let job = state.storage.job()?;
        let result = match job.save_upload(&filename, &bytes) {
            Ok(upload) => Ok(pipeline::analyze(
                &state,
                &upload,
                &filename,
                requirements.as_ref(),
                industry,
            )
            .await),
            Err(e) => Err(e),
        };
        job.remove();
        files.push(FileAnalysis {
            filename,
            result: result?,
        });
    }

    Ok(Json(AnalyzeResponse {
        success: true,
        requirements_applied: requirements.is_some(),
        files,
    }))
}

#[derive(Serialize)]
pub struct ReorganizeResponse {
    pub success: bool,
    pub filename: String,
    pub download_url: String,
    #[serde(flatten)]
    pub result: Reorganization,
}

/// Handler: POST /api/reorganize
///
/// Multipart fields: `file` (a single PDF), optional `session_id` or
/// `requirements`.
pub async fn handle_reorganize(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<ReorganizeResponse>, ServerError> {
    let form = UploadForm::read(multipart).await?;
    let (filename, bytes) = form.single_file()?;
    if !is_pdf(&filename) {
        return Err(ServerError::InvalidRequest(
            "Only PDF files can be reorganized".into(),
        ));
    }
    let requirements = resolve_requirements(&state, &form.fields).await?;

    info!(
        filename = %filename,
        size = bytes.len(),
        with_requirements = requirements.is_some(),
        "Reorganize request"
    );

    let job = state.storage.job()?;
    let result = match job.save_upload(&filename, &bytes) {
        Ok(upload) => pipeline::reorganize(&state, &job, &upload, &filename, requirements).await,
        Err(e) => Err(e.into()),
    };
    job.remove();
    let result = result?;

    Ok(Json(ReorganizeResponse {
        success: true,
        filename,
        download_url: format!("/api/download/{}", result.package),
        result,
    }))
}

/// Handler: GET /api/download/:filename
///
/// Serves a package once; the file is deleted after it is read.
pub async fn handle_download(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let name = sanitize_filename(&filename)
        .ok_or_else(|| ServerError::InvalidRequest("Invalid filename".into()))?;

    let bytes = state
        .storage
        .take_package(&name)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("Package '{}'", name)))?;

    debug!(package = %name, size = bytes.len(), "Serving package");

    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
}

/// Handler: POST /api/cleanup
pub async fn handle_cleanup(
    State(state): State<SharedState>,
) -> Result<Json<CleanupResponse>, ServerError> {
    let storage = state.storage.clone();
    tokio::task::spawn_blocking(move || storage.cleanup())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(CleanupResponse {
        success: true,
        message: "Temporary files cleaned up".to_string(),
    }))
}

/// Multipart form: every `file` part in upload order plus the text fields
#[derive(Default)]
struct UploadForm {
    files: Vec<(String, Bytes)>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.files.push((filename, bytes));
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// File parts with a usable name; the empty part a browser sends for an
    /// unused file input is skipped
    fn files(&self) -> Result<Vec<(String, Bytes)>, ServerError> {
        if self.files.is_empty() {
            return Err(ServerError::InvalidRequest("No file uploaded".into()));
        }
        let files: Vec<_> = self
            .files
            .iter()
            .filter(|(name, _)| sanitize_filename(name).is_some())
            .cloned()
            .collect();
        if files.is_empty() {
            return Err(ServerError::InvalidRequest("No file selected".into()));
        }
        Ok(files)
    }

    fn single_file(&self) -> Result<(String, Bytes), ServerError> {
        let mut files = self.files()?;
        if files.len() > 1 {
            return Err(ServerError::InvalidRequest(
                "Only one file can be reorganized at a time".into(),
            ));
        }
        Ok(files.remove(0))
    }
}

/// Inline requirement text wins over a session id
async fn resolve_requirements(
    state: &AppState,
    fields: &HashMap<String, String>,
) -> Result<Option<LenderRequirements>, ServerError> {
    if let Some(text) = fields.get("requirements").filter(|t| !t.trim().is_empty()) {
        return Ok(Some(parse_requirements(text)));
    }
    match fields
        .get("session_id")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        Some(id) => lookup_session(state, id).await.map(Some),
        None => Ok(None),
    }
}

async fn lookup_session(state: &AppState, id: &str) -> Result<LenderRequirements, ServerError> {
    state
        .sessions
        .lock()
        .await
        .get(&id.to_string())
        .ok_or_else(|| ServerError::NotFound(format!("Session '{}'", id)))
}
