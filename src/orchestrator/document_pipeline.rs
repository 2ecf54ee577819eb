//! 单个文档处理器 - 编排层
//!
//! ## 职责
//!
//! 把一份上传的文档变成分好类的题目列表，是文档级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **题目提取**：整份文档交给 `Extractor`；PDF 在可用时逐页渲染后逐页提取
//! 2. **批量分类**：委托 `BatchOrchestrator`
//! 3. **取消检查**：提取后、分类后检查取消信号，取消后丢弃已得到的结果
//!
//! 不读写科目树，也不做持久化。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppResult, DocumentError, PromptError};
use crate::infrastructure::{PageRenderer, RenderedPage};
use crate::models::{DocumentInput, Payload};
use crate::orchestrator::batch_processor::{BatchOrchestrator, BatchReport};
use crate::services::Extractor;
use crate::utils::logging::log_questions_extracted;

/// 文档处理结果
#[derive(Debug)]
pub enum PipelineOutcome {
    /// 提取并分类完成
    Classified {
        /// 提取到的题目数量
        questions_found: usize,
        report: BatchReport,
    },
    /// 文档中没有找到题目
    NoQuestionsFound,
    /// 处理过程中收到取消信号
    Cancelled,
}

/// 单个文档处理器
pub struct DocumentPipeline {
    extractor: Arc<Extractor>,
    orchestrator: BatchOrchestrator,
    renderer: Option<Arc<dyn PageRenderer>>,
    render_scale: f32,
}

impl DocumentPipeline {
    pub fn new(
        extractor: Arc<Extractor>,
        orchestrator: BatchOrchestrator,
        renderer: Option<Arc<dyn PageRenderer>>,
        render_scale: f32,
    ) -> Self {
        Self {
            extractor,
            orchestrator,
            renderer,
            render_scale,
        }
    }

    /// 处理一份文档：提取 → 分类
    pub async fn process(
        &self,
        input: &DocumentInput,
        cancel: &CancellationToken,
    ) -> AppResult<PipelineOutcome> {
        if cancel.is_cancelled() {
            return Ok(PipelineOutcome::Cancelled);
        }

        let questions = self.extract_questions(input).await?;
        if cancel.is_cancelled() {
            info!("⏹️ 提取完成后收到取消信号，丢弃结果");
            return Ok(PipelineOutcome::Cancelled);
        }
        if questions.is_empty() {
            warn!("⚠️ 文档中没有找到题目");
            return Ok(PipelineOutcome::NoQuestionsFound);
        }

        log_questions_extracted(questions.len(), self.orchestrator.chunk_size());
        let report = self.orchestrator.classify_all(&questions).await?;
        if cancel.is_cancelled() {
            info!("⏹️ 分类完成后收到取消信号，丢弃结果");
            return Ok(PipelineOutcome::Cancelled);
        }

        Ok(PipelineOutcome::Classified {
            questions_found: questions.len(),
            report,
        })
    }

    /// 提取题目；PDF 且有渲染器时逐页提取，否则整份提取
    pub async fn extract_questions(&self, input: &DocumentInput) -> AppResult<Vec<String>> {
        if let (Some(renderer), Some(payload)) = (&self.renderer, input.payload()?) {
            if payload.is_pdf() {
                match self.render(renderer.clone(), payload).await {
                    Ok(pages) if !pages.is_empty() => return self.extract_pages(&pages).await,
                    Ok(_) => warn!("⚠️ PDF 没有可渲染的页面，改为整份提取"),
                    Err(e) => warn!("⚠️ PDF 逐页渲染失败，改为整份提取: {}", e),
                }
            }
        }
        self.extractor.extract(input).await
    }

    /// 在阻塞线程池中渲染 PDF
    async fn render(
        &self,
        renderer: Arc<dyn PageRenderer>,
        payload: Payload,
    ) -> Result<Vec<RenderedPage>, DocumentError> {
        let scale = self.render_scale;
        tokio::task::spawn_blocking(move || renderer.render_pages(&payload.bytes, scale))
            .await
            .map_err(|e| DocumentError::RenderFailed(format!("渲染任务异常退出: {}", e)))?
    }

    /// 按页码顺序逐页提取，单页失败记录日志后跳过
    async fn extract_pages(&self, pages: &[RenderedPage]) -> AppResult<Vec<String>> {
        info!("📄 PDF 共 {} 页，逐页提取", pages.len());

        let mut questions = Vec::new();
        let mut unavailable: Option<PromptError> = None;
        let mut failed = 0;

        for page in pages {
            match self.extractor.extract_page(page).await {
                Ok(found) => questions.extend(found),
                Err(e) => {
                    warn!("⚠️ 第 {} 页提取失败，已跳过: {}", page.number, e);
                    failed += 1;
                    if e.is_unavailable() {
                        unavailable = Some(e);
                    }
                }
            }
        }

        // 每一页都因服务不可用失败时视为整体失败
        if failed == pages.len() {
            if let Some(e) = unavailable {
                return Err(e.into());
            }
        }

        info!("✓ 逐页提取完成，共 {} 道题目", questions.len());
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{PromptInvoker, PromptRequest};
    use crate::services::{ClassificationPolicy, Classifier};
    use async_trait::async_trait;

    /// 按提示词名称返回固定内容的假模型
    struct Scripted;

    #[async_trait]
    impl PromptInvoker for Scripted {
        async fn invoke(&self, request: &PromptRequest) -> Result<String, PromptError> {
            match request.name {
                "extract_page" if request.media[0].contains("/9j/") => {
                    Ok(r#"{"questions": ["Page question"]}"#.to_string())
                }
                "extract_page" => Err(PromptError::Transport {
                    model: "scripted".into(),
                    message: "timeout".into(),
                }),
                "extract_text" if request.user.contains("EMPTY") => {
                    Ok(r#"{"questions": []}"#.to_string())
                }
                "extract_text" | "extract_document" => {
                    Ok(r#"{"questions": ["Q1", "Q2"]}"#.to_string())
                }
                _ => Ok(r#"{"subject": "Neurology", "topic": "Migraine"}"#.to_string()),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// 两页：第一页 JPEG，第二页的数据会让假模型报错
    struct TwoPages;

    impl PageRenderer for TwoPages {
        fn render_pages(&self, _pdf: &[u8], _scale: f32) -> Result<Vec<RenderedPage>, DocumentError> {
            Ok(vec![
                RenderedPage {
                    number: 1,
                    mime: "image/jpeg".into(),
                    bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
                },
                RenderedPage {
                    number: 2,
                    mime: "image/jpeg".into(),
                    bytes: vec![0x00, 0x01],
                },
            ])
        }
    }

    fn pipeline(renderer: Option<Arc<dyn PageRenderer>>) -> DocumentPipeline {
        let invoker: Arc<dyn PromptInvoker> = Arc::new(Scripted);
        let classifier = Classifier::new(
            invoker.clone(),
            vec!["Neurology".to_string()],
            ClassificationPolicy::Open,
        );
        DocumentPipeline::new(
            Arc::new(Extractor::new(invoker)),
            BatchOrchestrator::new(Arc::new(classifier), 10),
            renderer,
            2.0,
        )
    }

    #[tokio::test]
    async fn test_text_document_end_to_end() {
        let outcome = pipeline(None)
            .process(&DocumentInput::Text("exam".into()), &CancellationToken::new())
            .await
            .unwrap();
        match outcome {
            PipelineOutcome::Classified {
                questions_found,
                report,
            } => {
                assert_eq!(questions_found, 2);
                assert_eq!(report.classified.len(), 2);
                assert!(report.classified.iter().all(|q| q.topic == "Migraine"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_questions_found() {
        let outcome = pipeline(None)
            .process(&DocumentInput::Text("EMPTY".into()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, PipelineOutcome::NoQuestionsFound));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = pipeline(None)
            .process(&DocumentInput::Text("exam".into()), &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, PipelineOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_pdf_pages_failures_skipped() {
        let input = DocumentInput::Bytes {
            mime: crate::models::document::MIME_PDF.to_string(),
            bytes: b"%PDF-1.7".to_vec(),
        };
        let questions = pipeline(Some(Arc::new(TwoPages)))
            .extract_questions(&input)
            .await
            .unwrap();
        assert_eq!(questions, vec!["Page question".to_string()]);
    }

    #[tokio::test]
    async fn test_pdf_without_renderer_sent_whole() {
        let input = DocumentInput::Bytes {
            mime: crate::models::document::MIME_PDF.to_string(),
            bytes: b"%PDF-1.7".to_vec(),
        };
        let questions = pipeline(None).extract_questions(&input).await.unwrap();
        assert_eq!(questions, vec!["Q1".to_string(), "Q2".to_string()]);
    }
}
