//! 学习会话 - 应用层
//!
//! 面向界面 / 命令行的全部操作都在这里：上传文档、作答、删除文件、清空数据。
//! 会话独占科目树和作答统计；每次修改先生成新值并持久化，成功后再替换旧值，
//! 任何一步失败时内存和存储中的数据都保持不变。

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ClassificationMode, Config, UnmatchedSubjectPolicy};
use crate::error::{AppResult, ConfigError};
use crate::infrastructure::{
    default_renderer, FileStore, KeyValueStore, OpenAiInvoker, PageRenderer, PromptInvoker,
};
use crate::models::subject::subject_names;
use crate::models::{
    load_master_topics, load_vocabulary, DocumentInput, Explanation, PerformanceData,
    QuestionRecord, Subject, MISCELLANEOUS,
};
use crate::orchestrator::{BatchOrchestrator, BatchReport, DocumentPipeline, PipelineOutcome};
use crate::services::{is_correct_answer, ClassificationPolicy, Classifier, Explainer, Extractor};
use crate::taxonomy::{self, PerformanceRow, PersistenceAdapter};
use crate::utils::logging::log_upload_start;

/// 上传结果
#[derive(Debug)]
pub enum UploadOutcome {
    /// 分类完成并已保存
    Classified {
        /// 提取到的题目数量
        questions: usize,
        report: BatchReport,
    },
    /// 文档中没有找到题目（不是错误）
    NoQuestionsFound,
    /// 用户取消，没有写入任何数据
    Cancelled,
}

/// 作答结果
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub explanation: Explanation,
    pub is_correct: bool,
}

/// 调用模型所需的部件；只有上传和作答用到
struct ModelParts {
    model_name: String,
    pipeline: DocumentPipeline,
    explainer: Explainer,
}

/// 学习会话
pub struct StudySession {
    models: Option<ModelParts>,
    persistence: PersistenceAdapter,
    unmatched_policy: UnmatchedSubjectPolicy,
    subjects: Vec<Subject>,
    performance: PerformanceData,
}

impl StudySession {
    /// 按配置创建会话：校验配置 → 加载词表 → 连接模型 → 读取本地数据
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        config.validate()?;
        let invoker: Arc<dyn PromptInvoker> = Arc::new(OpenAiInvoker::new(config)?);
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_dir.clone()));
        Self::with_parts(config, invoker, store, default_renderer()).await
    }

    /// 只访问本地数据的会话：不校验模型凭证，不连接模型
    ///
    /// 用于查看报表、列出文件、删除文件和清空数据；上传和作答会返回缺少凭证的错误。
    pub async fn open_local(config: &Config) -> AppResult<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_dir.clone()));
        Self::build(config, None, store, None).await
    }

    /// 使用给定的模型、存储和渲染器创建会话
    pub async fn with_parts(
        config: &Config,
        invoker: Arc<dyn PromptInvoker>,
        store: Arc<dyn KeyValueStore>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> AppResult<Self> {
        Self::build(config, Some(invoker), store, renderer).await
    }

    async fn build(
        config: &Config,
        invoker: Option<Arc<dyn PromptInvoker>>,
        store: Arc<dyn KeyValueStore>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> AppResult<Self> {
        let vocabulary_error = |e: anyhow::Error| ConfigError::VocabularyLoadFailed {
            path: config
                .vocabulary_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<内置词表>".to_string()),
            reason: format!("{:#}", e),
        };
        let mut vocabulary = load_vocabulary(config).await.map_err(vocabulary_error)?;

        let subjects_for_model = subject_names(&vocabulary);
        if config.unmatched_subject_policy == UnmatchedSubjectPolicy::Miscellaneous
            && !vocabulary.iter().any(|s| s.name == MISCELLANEOUS)
        {
            vocabulary.push(Subject::new(MISCELLANEOUS));
        }

        let models = match invoker {
            Some(invoker) => Some(
                Self::model_parts(config, invoker, subjects_for_model, &vocabulary, renderer)
                    .await?,
            ),
            None => None,
        };

        let persistence = PersistenceAdapter::new(store, vocabulary);
        let subjects = persistence.load_subjects();
        let performance = persistence.load_performance();
        info!(
            "✓ 会话已就绪: {} 个科目，{} 个已上传文件",
            subjects.len(),
            taxonomy::uploaded_files(&subjects).len()
        );

        Ok(Self {
            models,
            persistence,
            unmatched_policy: config.unmatched_subject_policy,
            subjects,
            performance,
        })
    }

    /// 按分类模式组装提取、分类和解析服务
    async fn model_parts(
        config: &Config,
        invoker: Arc<dyn PromptInvoker>,
        subjects_for_model: Vec<String>,
        vocabulary: &[Subject],
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> AppResult<ModelParts> {
        let policy = match config.classification_mode {
            ClassificationMode::Open => ClassificationPolicy::Open,
            ClassificationMode::Closed => {
                let topics = match &config.master_topics_file {
                    Some(path) => load_master_topics(path).await.map_err(|e| {
                        ConfigError::VocabularyLoadFailed {
                            path: path.display().to_string(),
                            reason: format!("{:#}", e),
                        }
                    })?,
                    None => vocabulary
                        .iter()
                        .flat_map(|s| s.topics.iter().map(|t| t.name.clone()))
                        .collect(),
                };
                ClassificationPolicy::Closed { topics }
            }
        };

        let classifier = Classifier::new(invoker.clone(), subjects_for_model, policy);
        let pipeline = DocumentPipeline::new(
            Arc::new(Extractor::new(invoker.clone())),
            BatchOrchestrator::new(Arc::new(classifier), config.classify_chunk_size),
            renderer,
            config.render_scale,
        );

        Ok(ModelParts {
            model_name: invoker.model_name().to_string(),
            pipeline,
            explainer: Explainer::new(invoker),
        })
    }

    fn models(&self) -> Result<&ModelParts, ConfigError> {
        self.models
            .as_ref()
            .ok_or_else(|| ConfigError::MissingCredentials {
                var_name: "LLM_API_KEY".to_string(),
            })
    }

    /// 上传一份文档：提取 → 分类 → 合并 → 保存
    pub async fn upload_document(
        &mut self,
        file_name: &str,
        input: &DocumentInput,
        cancel: &CancellationToken,
    ) -> AppResult<UploadOutcome> {
        let models = self.models()?;
        log_upload_start(file_name, &models.model_name);

        let (questions, report) = match models.pipeline.process(input, cancel).await? {
            PipelineOutcome::Classified {
                questions_found,
                report,
            } => (questions_found, report),
            PipelineOutcome::NoQuestionsFound => return Ok(UploadOutcome::NoQuestionsFound),
            PipelineOutcome::Cancelled => return Ok(UploadOutcome::Cancelled),
        };

        let next = taxonomy::reconcile(
            &self.subjects,
            &report.classified,
            file_name,
            self.unmatched_policy,
        );
        self.persistence.save_subjects(&next)?;
        self.subjects = next;

        Ok(UploadOutcome::Classified { questions, report })
    }

    /// 作答一道题：生成解析、判断对错并记录
    pub async fn answer_question(
        &mut self,
        subject: &str,
        topic: &str,
        question: &str,
        selected_option: &str,
    ) -> AppResult<AnswerOutcome> {
        let explanation = self.models()?.explainer.explain(question).await?;
        let is_correct = is_correct_answer(selected_option, &explanation.correct_answer);

        let entry = QuestionRecord {
            question: question.to_string(),
            selected_option: selected_option.to_string(),
            correct_answer: explanation.correct_answer.clone(),
            is_correct,
            answered_at: Utc::now(),
        };
        let next = taxonomy::record(&self.performance, subject, topic, entry);
        self.persistence.save_performance(&next)?;
        self.performance = next;

        info!(
            "{} 作答已记录: {} / {}",
            if is_correct { "✅" } else { "❌" },
            subject,
            topic
        );
        Ok(AnswerOutcome {
            explanation,
            is_correct,
        })
    }

    /// 删除某个文件带来的全部题目；作答统计不受影响
    pub fn delete_source_file(&mut self, file_name: &str) -> AppResult<()> {
        let next = taxonomy::remove_source_file(&self.subjects, file_name);
        self.persistence.save_subjects(&next)?;
        self.subjects = next;
        Ok(())
    }

    /// 清空全部本地数据，恢复默认词表
    pub fn clear_all_data(&mut self) -> AppResult<()> {
        self.persistence.clear()?;
        self.subjects = self.persistence.master().to_vec();
        self.performance = PerformanceData::new();
        Ok(())
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn performance(&self) -> &PerformanceData {
        &self.performance
    }

    /// 作答报表
    pub fn performance_summary(&self) -> Vec<PerformanceRow> {
        taxonomy::summary(&self.performance)
    }

    /// 已上传的文件（按首次出现顺序）
    pub fn uploaded_files(&self) -> Vec<String> {
        taxonomy::uploaded_files(&self.subjects)
    }
}
