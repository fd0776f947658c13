//! Page thumbnails
//!
//! Rasterization sits behind [`PageRasterizer`] so the pipeline does not care
//! whether pages are drawn by PDFium or by something else. [`Previewer`] turns
//! rendered bitmaps into `data:image/png;base64,...` tokens.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;

use crate::error::PageMixError;

pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Draws PDF pages into bitmaps
pub trait PageRasterizer: Send + Sync {
    /// Render page `page_index` of `pdf` at `scale` (1.0 = 72 dpi)
    fn render_page(&self, pdf: &[u8], page_index: usize, scale: f32) -> Result<DynamicImage, PageMixError>;

    /// Render pages `0..page_count` in order
    ///
    /// The first failing page aborts the whole call.
    fn render_pages(
        &self,
        pdf: &[u8],
        page_count: usize,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, PageMixError> {
        (0..page_count)
            .map(|page_index| self.render_page(pdf, page_index, scale))
            .collect()
    }
}

/// Rasterizer backed by a dynamically loaded PDFium library
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind to PDFium, looking in `library_dir` if given, then the working
    /// directory, then the system library paths
    pub fn new(library_dir: Option<&Path>) -> Result<Self, PageMixError> {
        let local = |dir: &Path| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        };

        let bindings = match library_dir {
            Some(dir) => local(dir).or_else(|_| local(Path::new("./"))),
            None => local(Path::new("./")),
        }
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| {
            PageMixError::OperationError(format!("Failed to load PDFium library: {:?}", e))
        })?;

        tracing::info!("PDFium library bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn render(page: &PdfPage, page_index: usize, scale: f32) -> Result<DynamicImage, PageMixError> {
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PageMixError::Preview {
                page: page_index,
                message: format!("{:?}", e),
            })?;
        Ok(bitmap.as_image())
    }

    fn load<'a>(&'a self, pdf: &'a [u8]) -> Result<PdfDocument<'a>, PageMixError> {
        self.pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PageMixError::Preview {
                page: 0,
                message: format!("PDFium could not open the document: {:?}", e),
            })
    }
}

/// PDFium addresses pages with a `u16`
fn page_handle(page_index: usize) -> Result<u16, PageMixError> {
    u16::try_from(page_index).map_err(|_| PageMixError::Preview {
        page: page_index,
        message: format!("page index {} exceeds what PDFium can address", page_index),
    })
}

impl PageRasterizer for PdfiumRasterizer {
    fn render_page(&self, pdf: &[u8], page_index: usize, scale: f32) -> Result<DynamicImage, PageMixError> {
        let document = self.load(pdf)?;
        let page = document
            .pages()
            .get(page_handle(page_index)?)
            .map_err(|e| PageMixError::Preview {
                page: page_index,
                message: format!("{:?}", e),
            })?;
        Self::render(&page, page_index, scale)
    }

    fn render_pages(
        &self,
        pdf: &[u8],
        page_count: usize,
        scale: f32,
    ) -> Result<Vec<DynamicImage>, PageMixError> {
        let document = self.load(pdf)?;
        let pages = document.pages();

        (0..page_count)
            .map(|page_index| {
                let page = pages
                    .get(page_handle(page_index)?)
                    .map_err(|e| PageMixError::Preview {
                        page: page_index,
                        message: format!("{:?}", e),
                    })?;
                Self::render(&page, page_index, scale)
            })
            .collect()
    }
}

/// Renders thumbnails at a fixed scale
#[derive(Clone)]
pub struct Previewer {
    rasterizer: Arc<dyn PageRasterizer>,
    scale: f32,
}

impl Previewer {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, scale: f32) -> Self {
        Self { rasterizer, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Thumbnail token for a single page
    pub fn thumbnail(&self, pdf: &[u8], page_index: usize) -> Result<String, PageMixError> {
        let image = self.rasterizer.render_page(pdf, page_index, self.scale)?;
        encode_data_url(&image, page_index)
    }

    /// Thumbnail tokens for every page, in page order
    pub fn thumbnails(&self, pdf: &[u8], page_count: usize) -> Result<Vec<String>, PageMixError> {
        let images = self.rasterizer.render_pages(pdf, page_count, self.scale)?;
        if images.len() != page_count {
            return Err(PageMixError::Preview {
                page: images.len(),
                message: format!("expected {} rendered pages, got {}", page_count, images.len()),
            });
        }

        images
            .iter()
            .enumerate()
            .map(|(page_index, image)| encode_data_url(image, page_index))
            .collect()
    }
}

/// PNG-encode `image` as a `data:` URL
pub fn encode_data_url(image: &DynamicImage, page_index: usize) -> Result<String, PageMixError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| PageMixError::Preview {
            page: page_index,
            message: format!("PNG encoding failed: {}", e),
        })?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    Ok(format!("{}{}", DATA_URL_PREFIX, encoded))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Draws page `n` as an `(n + 1) x 2` image so order is observable
    #[derive(Default)]
    pub struct StripeRasterizer {
        pub fail_on: Option<usize>,
        pub calls: AtomicUsize,
    }

    impl PageRasterizer for StripeRasterizer {
        fn render_page(&self, _pdf: &[u8], page_index: usize, scale: f32) -> Result<DynamicImage, PageMixError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(page_index) {
                return Err(PageMixError::Preview {
                    page: page_index,
                    message: "injected failure".into(),
                });
            }
            assert!(scale > 0.0);
            Ok(DynamicImage::new_rgb8(page_index as u32 + 1, 2))
        }
    }

    pub fn decode_width(token: &str) -> u32 {
        let payload = token.strip_prefix(DATA_URL_PREFIX).unwrap();
        let png = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .width()
    }

    #[test]
    fn test_thumbnails_are_png_data_urls_in_page_order() {
        let previewer = Previewer::new(Arc::new(StripeRasterizer::default()), 0.5);
        let tokens = previewer.thumbnails(b"%PDF", 3).unwrap();

        assert_eq!(tokens.len(), 3);
        let widths: Vec<u32> = tokens.iter().map(|t| decode_width(t)).collect();
        assert_eq!(widths, vec![1, 2, 3]);
    }

    #[test]
    fn test_single_page_failure_fails_the_set() {
        let rasterizer = Arc::new(StripeRasterizer {
            fail_on: Some(1),
            ..Default::default()
        });
        let previewer = Previewer::new(rasterizer.clone(), 0.5);

        let result = previewer.thumbnails(b"%PDF", 4);
        assert!(matches!(result, Err(PageMixError::Preview { page: 1, .. })));
        // Stops at the first failure
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_single_thumbnail() {
        let previewer = Previewer::new(Arc::new(StripeRasterizer::default()), 0.3);
        let token = previewer.thumbnail(b"%PDF", 4).unwrap();
        assert_eq!(decode_width(&token), 5);
        assert_eq!(previewer.scale(), 0.3);
    }

    #[test]
    fn test_page_handle_rejects_indices_past_u16() {
        assert_eq!(page_handle(0).unwrap(), 0);
        assert_eq!(page_handle(65_535).unwrap(), u16::MAX);
        assert!(matches!(
            page_handle(65_536),
            Err(PageMixError::Preview { page: 65_536, .. })
        ));
    }

    #[test]
    fn test_pdfium_rasterizer_can_be_shared_across_threads() {
        fn assert_shareable<T: Send + Sync + 'static>() {}
        assert_shareable::<PdfiumRasterizer>();
        assert_shareable::<Previewer>();
    }

    #[test]
    #[ignore = "requires libpdfium on the host"]
    fn test_pdfium_renders_fixture_pages() {
        let pdf = crate::fixtures::simple_pdf(2, "Render");
        let rasterizer = PdfiumRasterizer::new(None).unwrap();

        let small = rasterizer.render_page(&pdf, 0, 0.3).unwrap();
        let large = rasterizer.render_page(&pdf, 0, 0.6).unwrap();
        assert!(large.width() > small.width());

        let all = rasterizer.render_pages(&pdf, 2, 0.3).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].width(), small.width());
    }
}
