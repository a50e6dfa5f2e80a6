//! Command-line and environment configuration

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the package server
#[derive(Parser, Debug, Clone)]
#[command(name = "package-server")]
#[command(about = "Analyze closing packages and reorganize them to a lender's checklist")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "PACKAGE_SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PACKAGE_SERVER_PORT", default_value = "3000")]
    pub port: u16,

    /// Directory for uploads, intermediate files and packages
    #[arg(long, env = "PACKAGE_SERVER_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// OpenAI-compatible chat completions endpoint; ordering advice is
    /// disabled when unset
    #[arg(long, env = "ADVISOR_URL")]
    pub advisor_url: Option<String>,

    #[arg(long, env = "ADVISOR_API_KEY", hide_env_values = true)]
    pub advisor_api_key: Option<String>,

    #[arg(long, env = "ADVISOR_MODEL", default_value = "gpt-4o-mini")]
    pub advisor_model: String,

    /// Advisor request timeout in milliseconds
    #[arg(long, env = "ADVISOR_TIMEOUT_MS", default_value = "20000")]
    pub advisor_timeout_ms: u64,

    /// Timeout for text extraction and each PDF stage, in milliseconds
    #[arg(long, env = "PACKAGE_SERVER_PDF_TIMEOUT_MS", default_value = "30000")]
    pub pdf_timeout_ms: u64,

    /// Advisor responses kept in memory
    #[arg(long, env = "PACKAGE_SERVER_CACHE_CAPACITY", default_value = "128")]
    pub cache_capacity: usize,

    /// Requirement sessions kept in memory
    #[arg(long, env = "PACKAGE_SERVER_SESSION_CAPACITY", default_value = "256")]
    pub session_capacity: usize,

    /// Maximum upload size in megabytes
    #[arg(long, env = "PACKAGE_SERVER_MAX_UPLOAD_MB", default_value = "50")]
    pub max_upload_mb: usize,

    /// Enable verbose logging
    #[arg(short, long, env = "PACKAGE_SERVER_VERBOSE")]
    pub verbose: bool,
}

impl Config {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("package-server"))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
