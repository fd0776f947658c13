//! Environment configuration for the API server

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use pagemix_core::PipelineConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `libpdfium`; the working directory and system paths
    /// are searched after it
    pub pdfium_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut pipeline = PipelineConfig::default();

        if let Some(root) = lookup("PAGEMIX_UPLOAD_ROOT") {
            pipeline.upload_root = PathBuf::from(root);
        }
        if let Some(size) = parse_var(&lookup, "PAGEMIX_MAX_UPLOAD_SIZE")? {
            pipeline.max_upload_size = size;
        }
        if let Some(secs) = parse_var(&lookup, "PAGEMIX_RETENTION_TTL_SECS")? {
            pipeline.retention_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "PAGEMIX_SWEEP_INTERVAL_SECS")? {
            pipeline.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(scale) = parse_var(&lookup, "PAGEMIX_PREVIEW_SCALE")? {
            pipeline.preview_scale = scale;
        }
        if let Some(list) = lookup("PAGEMIX_ALLOWED_EXTENSIONS") {
            pipeline.allowed_extensions = parse_extensions(&list);
        }
        pipeline.validate()?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT),
            pdfium_path: lookup("PAGEMIX_PDFIUM_PATH").map(PathBuf::from),
            pipeline,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {}={:?}: {}", key, raw, e)),
    }
}

/// `"PDF, .docx"` -> `["pdf", "docx"]`
fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
