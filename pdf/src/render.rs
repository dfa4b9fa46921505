use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use tracing::{debug, warn};

use crate::error::{PdfError, Result};

/// Renderer configuration.
#[derive(Debug, Clone, Default)]
pub struct RendererOptions {
    /// Explicit path to the pdfium dynamic library. When unset, well-known
    /// locations and the system loader are probed in order.
    pub pdfium_library_path: Option<PathBuf>,
}

/// Rasterizes single PDF pages to RGB images.
///
/// Pdfium is bound once at construction and reused for every page. When no
/// pdfium library can be loaded, rendering falls back to the `pdftoppm`
/// tool from poppler-utils, which is slower but needs no native bindings.
pub struct PageRenderer {
    backend: Backend,
}

enum Backend {
    Pdfium(Pdfium),
    Pdftoppm,
}

impl fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.backend {
            Backend::Pdfium(_) => "pdfium",
            Backend::Pdftoppm => "pdftoppm",
        };
        f.debug_tuple("PageRenderer").field(&name).finish()
    }
}

impl PageRenderer {
    /// Probes for a usable backend.
    #[must_use]
    pub fn new(options: &RendererOptions) -> Self {
        match bind_pdfium(options) {
            Ok(pdfium) => Self { backend: Backend::Pdfium(pdfium) },
            Err(error) => {
                warn!(%error, "pdfium unavailable, falling back to pdftoppm");
                Self { backend: Backend::Pdftoppm }
            }
        }
    }

    /// Renders one page (zero-based index) of `pdf` at `dpi`.
    pub fn render_page(&self, pdf: &Path, page_index: usize, dpi: u16) -> Result<RgbImage> {
        match &self.backend {
            Backend::Pdfium(pdfium) => render_with_pdfium(pdfium, pdf, page_index, dpi),
            Backend::Pdftoppm => render_with_pdftoppm(pdf, page_index, dpi),
        }
    }
}

fn bind_pdfium(options: &RendererOptions) -> Result<Pdfium> {
    let bindings = if let Some(path) = &options.pdfium_library_path {
        Pdfium::bind_to_library(path).map_err(|e| PdfError::Render(e.to_string()))?
    } else {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib"))
            })
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    "/usr/local/lib",
                ))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::Render(e.to_string()))?
    };
    Ok(Pdfium::new(bindings))
}

fn render_with_pdfium(pdfium: &Pdfium, pdf: &Path, page_index: usize, dpi: u16) -> Result<RgbImage> {
    let doc = pdfium
        .load_pdf_from_file(pdf, None)
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    let count = doc.pages().len() as usize;
    let index = u16::try_from(page_index)
        .ok()
        .filter(|i| usize::from(*i) < count)
        .ok_or(PdfError::PageOutOfRange { index: page_index, count })?;
    let page = doc
        .pages()
        .get(index)
        .map_err(|e| PdfError::Render(e.to_string()))?;

    let scale = f32::from(dpi.max(1)) / 72.0;
    let width = (page.width().value * scale).round().max(1.0) as i32;
    let height = (page.height().value * scale).round().max(1.0) as i32;
    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height);
    let rendered = page
        .render_with_config(&config)
        .map_err(|e| PdfError::Render(e.to_string()))?;
    debug!(page = page_index, width, height, "rendered via pdfium");
    Ok(rendered.as_image().into_rgb8())
}

fn render_with_pdftoppm(pdf: &Path, page_index: usize, dpi: u16) -> Result<RgbImage> {
    let tmp = tempfile::tempdir()?;
    let prefix = tmp.path().join("page");
    let page_arg = (page_index + 1).to_string();
    let dpi_arg = dpi.to_string();
    let output = Command::new("pdftoppm")
        .args(["-png", "-r", &dpi_arg, "-f", &page_arg, "-l", &page_arg, "-singlefile"])
        .arg(pdf)
        .arg(&prefix)
        .output()
        .map_err(|e| PdfError::Render(format!("failed to run pdftoppm: {e}")))?;
    if !output.status.success() {
        return Err(PdfError::Render(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let png = prefix.with_extension("png");
    let image = image::open(&png).map_err(|e| PdfError::Render(e.to_string()))?;
    debug!(page = page_index, dpi, "rendered via pdftoppm");
    Ok(image.into_rgb8())
}
