//! Shared application state

use std::sync::Arc;

use compliance_engine::{AdvisorProposal, ComplianceEngine, RuleBook};
use shared_types::LenderRequirements;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::advisor::{HttpAdvisor, OrderingAdvisor};
use crate::cache::LruCache;
use crate::config::Config;
use crate::extract::{FileTextExtractor, TextExtractor};
use crate::storage::WorkDir;

pub type SharedState = Arc<AppState>;

/// Timeouts and size limits for request processing
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub advisor_timeout_ms: u64,
    pub pdf_timeout_ms: u64,
    pub max_upload_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            advisor_timeout_ms: 20_000,
            pdf_timeout_ms: 30_000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

pub struct AppState {
    pub engine: ComplianceEngine,
    /// Editable rules used when no industry template is requested
    pub rules: RwLock<RuleBook>,
    /// Parsed requirement sets by session id
    pub sessions: Mutex<LruCache<String, LenderRequirements>>,
    /// Parsed advisor replies by content hash
    pub advice: Mutex<LruCache<String, AdvisorProposal>>,
    pub storage: WorkDir,
    pub extractor: Arc<dyn TextExtractor>,
    pub advisor: Option<Arc<dyn OrderingAdvisor>>,
    pub limits: Limits,
}

impl AppState {
    pub fn new(storage: WorkDir, limits: Limits, session_capacity: usize, cache_capacity: usize) -> Self {
        Self {
            engine: ComplianceEngine::new(),
            rules: RwLock::new(RuleBook::default()),
            sessions: Mutex::new(LruCache::new(session_capacity)),
            advice: Mutex::new(LruCache::new(cache_capacity)),
            storage,
            extractor: Arc::new(FileTextExtractor),
            advisor: None,
            limits,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn OrderingAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = WorkDir::new(config.work_dir())?;
        info!("Work directory: {}", storage.root().display());

        let limits = Limits {
            advisor_timeout_ms: config.advisor_timeout_ms,
            pdf_timeout_ms: config.pdf_timeout_ms,
            max_upload_bytes: config.max_upload_bytes(),
        };
        let mut state = Self::new(
            storage,
            limits,
            config.session_capacity,
            config.cache_capacity,
        );

        match &config.advisor_url {
            Some(url) => {
                let advisor = HttpAdvisor::new(
                    url.clone(),
                    config.advisor_api_key.clone(),
                    config.advisor_model.clone(),
                    config.advisor_timeout_ms,
                )?;
                info!("Ordering advisor: {} ({})", url, config.advisor_model);
                state = state.with_advisor(Arc::new(advisor));
            }
            None => info!("No ordering advisor configured, using catalog order"),
        }

        Ok(state)
    }
}
