//! PDF 逐页光栅化 - 基础设施层
//!
//! 把 PDF 的每一页渲染为固定缩放的 JPEG，交给多模态模型做 OCR。
//! pdfium 不是 async 安全的，调用方需要在 `spawn_blocking` 中使用。

use crate::error::DocumentError;

/// 渲染后的一页
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 页码（从 1 开始）
    pub number: usize,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// PDF 渲染器
pub trait PageRenderer: Send + Sync {
    fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<RenderedPage>, DocumentError>;
}

/// 当前构建可用的渲染器；未启用 `pdfium` 特性时返回 `None`
pub fn default_renderer() -> Option<std::sync::Arc<dyn PageRenderer>> {
    #[cfg(feature = "pdfium")]
    {
        Some(std::sync::Arc::new(pdfium_backend::PdfiumRenderer))
    }
    #[cfg(not(feature = "pdfium"))]
    {
        None
    }
}

#[cfg(feature = "pdfium")]
mod pdfium_backend {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};
    use pdfium_render::prelude::*;
    use tracing::debug;

    use super::{PageRenderer, RenderedPage};
    use crate::error::DocumentError;

    /// 基于系统 pdfium 动态库的渲染器
    pub struct PdfiumRenderer;

    impl PageRenderer for PdfiumRenderer {
        fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<RenderedPage>, DocumentError> {
            let render_err = |e: PdfiumError| DocumentError::RenderFailed(e.to_string());

            let bindings = Pdfium::bind_to_system_library().map_err(render_err)?;
            let pdfium = Pdfium::new(bindings);
            let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(render_err)?;
            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

            let mut pages = Vec::new();
            for (idx, page) in document.pages().iter().enumerate() {
                let bitmap = page.render_with_config(&render_config).map_err(render_err)?;
                let rgb = bitmap.as_image().to_rgb8();
                let (width, height) = (rgb.width(), rgb.height());
                let buffer = RgbImage::from_raw(width, height, rgb.into_raw()).ok_or_else(|| {
                    DocumentError::RenderFailed(format!("第 {} 页像素缓冲区大小不符", idx + 1))
                })?;

                let mut jpeg = Cursor::new(Vec::new());
                DynamicImage::ImageRgb8(buffer)
                    .write_to(&mut jpeg, ImageFormat::Jpeg)
                    .map_err(|e| DocumentError::RenderFailed(e.to_string()))?;

                debug!("第 {} 页渲染完成 ({}x{})", idx + 1, width, height);
                pages.push(RenderedPage {
                    number: idx + 1,
                    mime: "image/jpeg".to_string(),
                    bytes: jpeg.into_inner(),
                });
            }
            Ok(pages)
        }
    }
}
