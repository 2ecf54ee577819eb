//! 题目提取服务 - 业务能力层
//!
//! 只负责"从一份文档 / 一页图片里拿出题目文本"，不关心分类和存储。

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AppResult, PromptError};
use crate::infrastructure::{invoke_json, PromptInvoker, PromptRequest, RenderedPage, ResponseSchema};
use crate::models::DocumentInput;

const EXTRACT_SYSTEM: &str = "You are an expert AI assistant specializing in parsing medical exam documents. \
You extract questions faithfully and never reveal or copy answers.";

const EXTRACTION_RULES: &str = r#"**Question Formatting Rules:**

*   **For Multiple-Choice Questions (MCQs):** A complete question includes the question stem and all of its associated options (e.g., a, b, c, d, e).
*   **For Short-Essay Questions (SEQs):** If a clinical scenario is followed by sub-questions (e.g., 1.1, 1.2), you MUST combine the main scenario text with *each* sub-question. This ensures every extracted question is a standalone item with full context.

**Crucial Extraction Instructions:**

1.  **IGNORE ALL ANSWERS:** Do not include any text that is an answer, a rationale, or a principle of management. This is the most important rule. For example, if you see "1. Full blood count" or "A. The correct answer is..." following a question, you must ignore it completely.
2.  **IGNORE METADATA & NOISE:** Ignore all non-question text. This includes page headers, footers, page numbers, compiler names, timestamps, and watermarks such as "Scanned with CamScanner".
3.  **POLISH THE TEXT:** After extracting a question, correct any grammatical errors, spelling mistakes, or OCR artifacts so the final text is clean and easy to read. Preserve the original medical terminology.
4.  **OUTPUT FORMAT:** You MUST return a valid JSON object with a single key "questions" containing an array of strings. Each string must be a full, complete question. If you cannot find any questions, return {"questions": []}. Do not return any other format."#;

/// 模型返回的提取结果
#[derive(Debug, Deserialize)]
struct ExtractedQuestions {
    questions: Vec<String>,
}

impl ResponseSchema for ExtractedQuestions {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// 题目提取服务
///
/// 职责：
/// - 为整份文档 / 单页图片 / 纯文本构建提取提示词
/// - 规范化提取出的题目文本
/// - 模型输出无法解析时返回空列表，而不是报错
pub struct Extractor {
    invoker: Arc<dyn PromptInvoker>,
}

impl Extractor {
    pub fn new(invoker: Arc<dyn PromptInvoker>) -> Self {
        Self { invoker }
    }

    /// 从整份文档中提取题目
    ///
    /// # 返回
    /// - `Ok(vec![])`：没有找到题目（不是错误）
    /// - `Err`：文档不合法，或模型服务不可用
    pub async fn extract(&self, input: &DocumentInput) -> AppResult<Vec<String>> {
        let payload = input.payload()?;
        // 已渲染好的单页按单页规则提取
        if let (DocumentInput::PageImage { .. }, Some(payload)) = (input, &payload) {
            let page = RenderedPage {
                number: 1,
                mime: payload.mime.clone(),
                bytes: payload.bytes.clone(),
            };
            let questions = self.extract_page(&page).await?;
            info!("✓ 单页提取完成，共 {} 道题目", questions.len());
            return Ok(questions);
        }

        let request = match payload {
            Some(payload) => {
                debug!("整份文档提取，MIME: {}，{} 字节", payload.mime, payload.bytes.len());
                PromptRequest::new(
                    "extract_document",
                    EXTRACT_SYSTEM,
                    format!(
                        "Your task is to meticulously extract all questions from the provided document. \
Analyze its visual layout across all pages and perform OCR as needed to extract the text.\n\n\
Your goal is to identify and list every complete question in the entire document.\n\n{}",
                        EXTRACTION_RULES
                    ),
                )
                .with_media(payload.to_data_uri())
            }
            None => {
                let text = match input {
                    DocumentInput::Text(text) => text.as_str(),
                    _ => "",
                };
                PromptRequest::new(
                    "extract_text",
                    EXTRACT_SYSTEM,
                    format!(
                        "Your task is to meticulously extract all questions from the exam text below.\n\n\
<document>\n{}\n</document>\n\n{}",
                        text, EXTRACTION_RULES
                    ),
                )
            }
        };

        let questions = self.run(&request).await?;
        info!("✓ 提取完成，共 {} 道题目", questions.len());
        Ok(questions)
    }

    /// 从单页图片中提取题目
    pub async fn extract_page(&self, page: &RenderedPage) -> Result<Vec<String>, PromptError> {
        let payload = crate::models::Payload {
            mime: page.mime.clone(),
            bytes: page.bytes.clone(),
        };
        let request = PromptRequest::new(
            "extract_page",
            EXTRACT_SYSTEM,
            format!(
                "Your task is to meticulously extract all questions from the provided image of a document page. \
Analyze its visual layout and perform OCR as needed to extract the text.\n\n\
Your goal is to identify and list every complete question on this single page.\n\n{}",
                EXTRACTION_RULES
            ),
        )
        .with_media(payload.to_data_uri());

        let questions = self.run(&request).await?;
        debug!("第 {} 页提取到 {} 道题目", page.number, questions.len());
        Ok(questions)
    }

    /// 调用模型；结构不合法或内容为空时降级为空列表
    async fn run(&self, request: &PromptRequest) -> Result<Vec<String>, PromptError> {
        match invoke_json::<ExtractedQuestions>(self.invoker.as_ref(), request).await {
            Ok(extracted) => Ok(normalize_questions(extracted.questions)),
            Err(e @ (PromptError::Schema { .. } | PromptError::EmptyResponse { .. })) => {
                warn!("⚠️ [{}] 模型输出无法解析，按未找到题目处理: {}", request.name, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// 规范化题目文本：统一换行、去掉首尾空白、丢弃空字符串
pub fn normalize_questions(questions: Vec<String>) -> Vec<String> {
    questions
        .into_iter()
        .map(|q| q.replace("\r\n", "\n").trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}
