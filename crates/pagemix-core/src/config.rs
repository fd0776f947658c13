//! Pipeline configuration
//!
//! Defaults mirror what the service ran with in production: 100 MiB uploads,
//! 30 minute retention, a sweep every 5 minutes.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PageMixError;

pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;
pub const DEFAULT_RETENTION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_PREVIEW_SCALE: f32 = 0.8;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the store's `{id}.pdf` blobs
    pub upload_root: PathBuf,
    /// Largest accepted upload, in bytes
    pub max_upload_size: usize,
    /// Age after which the sweeper reclaims an entry
    pub retention_ttl: Duration,
    /// Period between background sweeps
    pub sweep_interval: Duration,
    /// Raster scale factor for thumbnails (1.0 = 72 dpi)
    pub preview_scale: f32,
    /// Accepted upload extensions, lowercase, without the dot
    pub allowed_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            retention_ttl: DEFAULT_RETENTION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            preview_scale: DEFAULT_PREVIEW_SCALE,
            allowed_extensions: vec!["pdf".to_string(), "docx".to_string()],
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PageMixError> {
        if !self.preview_scale.is_finite() || self.preview_scale <= 0.0 {
            return Err(PageMixError::InvalidInput(format!(
                "preview_scale must be a positive number, got {}",
                self.preview_scale
            )));
        }
        if self.max_upload_size == 0 {
            return Err(PageMixError::InvalidInput(
                "max_upload_size must be greater than zero".into(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(PageMixError::InvalidInput(
                "allowed_extensions must not be empty".into(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(PageMixError::InvalidInput(
                "sweep_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Case-insensitive membership test for an extension (no leading dot)
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}
