//! Application state for the PageMix API

use std::sync::Arc;

use anyhow::{Context, Result};
use pagemix_core::{
    DocumentStore, Ingestor, PageRasterizer, PdfiumRasterizer, PipelineConfig, Previewer,
};

use crate::config::ServerConfig;

pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub ingestor: Ingestor,
}

impl AppState {
    /// On-disk store under the configured upload root, thumbnails via PDFium
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let root = &config.pipeline.upload_root;
        tracing::info!("Opening document store at {}", root.display());
        let store = DocumentStore::on_disk(root)
            .with_context(|| format!("Failed to open upload root {}", root.display()))?;

        let rasterizer = PdfiumRasterizer::new(config.pdfium_path.as_deref())?;

        Ok(Self::from_parts(
            Arc::new(store),
            Arc::new(rasterizer),
            config.pipeline.clone(),
        ))
    }

    pub fn from_parts(
        store: Arc<DocumentStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        pipeline: PipelineConfig,
    ) -> Self {
        let previewer = Previewer::new(rasterizer, pipeline.preview_scale);
        let ingestor = Ingestor::new(Arc::clone(&store), previewer, pipeline);
        Self { store, ingestor }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        self.ingestor.config()
    }
}
