//! 题目分类服务 - 业务能力层
//!
//! 只负责"给一道题判定科目和主题"：
//! - 不出现 Vec<Question>
//! - 不关心批次和并发
//! - 不修改科目树

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::PromptError;
use crate::infrastructure::{invoke_json, PromptInvoker, PromptRequest, ResponseSchema};
use crate::models::{topic_key, ClassifiedQuestion};

/// 封闭式分类中表示"没有合适主题"的哨兵值
pub const OTHER_TOPIC: &str = "Other";

const DEFAULT_RATIONALE: &str = "No rationale provided by AI.";

const CLASSIFY_SYSTEM: &str = "You are an expert medical exam question classifier. \
You always answer with a single JSON object.";

/// 分类策略
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationPolicy {
    /// 科目受限，主题由模型归纳（同一疾病的不同方面合并为一个主题）
    Open,
    /// 主题必须来自给定列表，无法匹配时返回 "Other"
    Closed { topics: Vec<String> },
}

/// 单题分类失败
#[derive(Debug, Error, Clone)]
pub enum ClassifyError {
    /// 模型返回了内容，但缺少科目 / 主题或结构不合法
    #[error("分类结果不合法: {0}")]
    Schema(String),
    /// 模型调用本身失败
    #[error("分类调用失败: {0}")]
    Model(PromptError),
    /// 封闭式分类没有匹配到任何主题
    #[error("没有匹配的主题 (模型返回: {0})")]
    Unmatched(String),
}

impl From<PromptError> for ClassifyError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Schema { reason, .. } => ClassifyError::Schema(reason),
            other => ClassifyError::Model(other),
        }
    }
}

/// 模型返回的分类结果
#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
}

impl ResponseSchema for ClassificationResponse {
    fn validate(&self) -> Result<(), String> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&self.subject) || blank(&self.topic) {
            return Err("AI failed to return a valid classification for the question.".to_string());
        }
        Ok(())
    }
}

/// 题目分类服务
pub struct Classifier {
    invoker: Arc<dyn PromptInvoker>,
    subjects: Vec<String>,
    policy: ClassificationPolicy,
}

impl Classifier {
    pub fn new(
        invoker: Arc<dyn PromptInvoker>,
        subjects: Vec<String>,
        policy: ClassificationPolicy,
    ) -> Self {
        Self {
            invoker,
            subjects,
            policy,
        }
    }

    pub fn policy(&self) -> &ClassificationPolicy {
        &self.policy
    }

    /// 对单道题分类
    pub async fn classify(&self, question: &str) -> Result<ClassifiedQuestion, ClassifyError> {
        let request = PromptRequest::new("classify", CLASSIFY_SYSTEM, self.build_prompt(question));
        let response: ClassificationResponse =
            invoke_json(self.invoker.as_ref(), &request).await?;

        // validate() 已保证两者非空
        let subject = response.subject.unwrap_or_default();
        let topic = response.topic.unwrap_or_default();

        let subject = self.canonical_subject(&subject);
        let topic = match &self.policy {
            ClassificationPolicy::Open => topic.trim().to_string(),
            ClassificationPolicy::Closed { topics } => {
                if topic_key(&topic) == topic_key(OTHER_TOPIC) {
                    return Err(ClassifyError::Unmatched(topic));
                }
                topics
                    .iter()
                    .find(|t| topic_key(t) == topic_key(&topic))
                    .cloned()
                    .ok_or(ClassifyError::Unmatched(topic))?
            }
        };

        debug!("分类结果: {} / {}", subject, topic);

        Ok(ClassifiedQuestion {
            question: question.to_string(),
            subject,
            topic,
            rationale: Some(
                response
                    .rationale
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_RATIONALE.to_string()),
            ),
        })
    }

    /// 大小写 / 空白不同的科目名称对齐到词表；词表外的科目原样返回
    fn canonical_subject(&self, subject: &str) -> String {
        let wanted = subject.trim().to_lowercase();
        self.subjects
            .iter()
            .find(|s| s.to_lowercase() == wanted)
            .cloned()
            .unwrap_or_else(|| subject.trim().to_string())
    }

    fn build_prompt(&self, question: &str) -> String {
        let subject_list = self
            .subjects
            .iter()
            .map(|s| format!("    - {}", s))
            .collect::<Vec<_>>()
            .join("\n");

        let topic_guideline = match &self.policy {
            ClassificationPolicy::Open => "2.  **Topic Generalization:** Identify the core medical topic. It must be a general, high-level concept.\n    \
*   **Guideline:** Consolidate specific variations into a single, core topic. For example, a question about 'management of inflammatory bowel disease' and a question about 'pathology of inflammatory bowel disease' should both be assigned the topic 'Inflammatory Bowel Disease'. Similarly, 'treatment of myocardial infarction' should be assigned the topic 'Myocardial Infarction'. Use this principle to create generalized topics for other questions.".to_string(),
            ClassificationPolicy::Closed { topics } => format!(
                "2.  **Topic Selection:** Choose the single best matching topic from this master list, copying its name exactly:\n{}\n    \
If no topic in the list is a confident match, use the topic \"{}\".",
                topics
                    .iter()
                    .map(|t| format!("    - {}", t))
                    .collect::<Vec<_>>()
                    .join("\n"),
                OTHER_TOPIC
            ),
        };

        format!(
            r#"Your task is to analyze a given medical question and assign it to a single subject and a single topic. You should also provide a brief rationale for your choice.

**Input Question:**
{}

**Guidelines for Analysis:**

1.  **Subject Classification:** Classify the question into one, and only one, of the following subjects:
{}
    Choose the single best fit.

{}

3.  **Rationale:** Briefly explain your reasoning in the 'rationale' field, especially if the topic is newly improvised or the question was ambiguous.

4.  **Output Format:** Your response MUST be a JSON object with three keys: "subject", "topic", and "rationale"."#,
            question, subject_list, topic_guideline
        )
    }
}
