//! 批量分类处理器 - 编排层
//!
//! ## 职责
//!
//! 把一份文档提取出的全部题目分批交给 `Classifier`，汇总结果。
//!
//! ## 核心功能
//!
//! 1. **分批处理**：每批 `chunk_size` 道题，本批全部完成后再开始下一批
//! 2. **批内并发**：同一批的分类请求用 `join_all` 同时发出
//! 3. **失败隔离**：单题失败只记录日志并排除，不影响其他题目
//! 4. **整批失败**：连续至少 `MIN_OUTAGE_FAILURES` 次因服务不可用失败，且最近一批全部失败时中止整个任务
//! 5. **保持顺序**：结果按题目原始顺序返回
//!
//! ## 设计特点
//!
//! - **不持有状态**：不读写科目树，不做持久化
//! - **向下委托**：单题分类完全交给 `services::Classifier`

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{AppResult, BatchError, PromptError};
use crate::models::ClassifiedQuestion;
use crate::orchestrator::question_ctx::QuestionCtx;
use crate::services::{Classifier, ClassifyError};
use crate::utils::logging::{log_batch_complete, log_batch_start, print_final_stats};

/// 判定服务中断所需的最少连续不可用失败数；低于它时只算单题失败
const MIN_OUTAGE_FAILURES: usize = 2;

/// 分类汇总结果
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// 成功分类的题目（按原始顺序）
    pub classified: Vec<ClassifiedQuestion>,
    /// 分类失败而被排除的数量
    pub failed: usize,
    /// 没有匹配主题而被跳过的数量（封闭式分类）
    pub skipped: usize,
}

impl BatchReport {
    /// 参与分类的题目总数
    pub fn total(&self) -> usize {
        self.classified.len() + self.failed + self.skipped
    }
}

/// 单批的统计
#[derive(Debug, Default)]
struct ChunkOutcome {
    classified: Vec<(usize, ClassifiedQuestion)>,
    failed: usize,
    skipped: usize,
    /// 因服务不可用而失败的数量及最后一个错误
    unavailable: usize,
    last_unavailable: Option<PromptError>,
}

/// 批量分类处理器
pub struct BatchOrchestrator {
    classifier: Arc<Classifier>,
    chunk_size: usize,
}

impl BatchOrchestrator {
    /// 创建处理器；`chunk_size` 最小为 1
    pub fn new(classifier: Arc<Classifier>, chunk_size: usize) -> Self {
        Self {
            classifier,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 对全部题目分类
    ///
    /// # 返回
    /// - `Ok(report)`：部分题目失败也返回成功，失败数量记录在 report 中
    /// - `Err(AppError::Batch)`：某一批题目全部因服务不可用失败，且连续失败数达到阈值
    pub async fn classify_all(&self, questions: &[String]) -> AppResult<BatchReport> {
        let total = questions.len();
        let mut report = BatchReport::default();
        if total == 0 {
            return Ok(report);
        }

        let total_batches = total.div_ceil(self.chunk_size);
        let mut classified: Vec<(usize, ClassifiedQuestion)> = Vec::with_capacity(total);
        // 跨批次累计的连续不可用失败数；任何一批出现其他结果即清零
        let mut unavailable_streak = 0;

        for (chunk_idx, chunk) in questions.chunks(self.chunk_size).enumerate() {
            let batch_num = chunk_idx + 1;
            let batch_start = chunk_idx * self.chunk_size;
            log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + chunk.len(),
                total,
            );

            let outcome = self.process_chunk(batch_num, batch_start, chunk).await;

            if outcome.unavailable == chunk.len() {
                unavailable_streak += outcome.unavailable;
            } else {
                unavailable_streak = 0;
            }
            if unavailable_streak >= MIN_OUTAGE_FAILURES {
                if let Some(last_error) = outcome.last_unavailable {
                    return Err(BatchError::Unavailable {
                        chunk: batch_num,
                        failed: unavailable_streak,
                        last_error,
                    }
                    .into());
                }
            }

            log_batch_complete(batch_num, outcome.classified.len(), chunk.len());
            report.failed += outcome.failed;
            report.skipped += outcome.skipped;
            classified.extend(outcome.classified);
        }

        // 批次按顺序执行，这里只是保证结果严格按原始索引排列
        classified.sort_by_key(|(index, _)| *index);
        report.classified = classified.into_iter().map(|(_, q)| q).collect();

        print_final_stats(report.classified.len(), report.failed, report.skipped, total);
        Ok(report)
    }

    /// 并发处理单批题目，等待本批全部完成
    async fn process_chunk(
        &self,
        batch_num: usize,
        batch_start: usize,
        chunk: &[String],
    ) -> ChunkOutcome {
        let classifier = self.classifier.as_ref();
        let futures = chunk.iter().enumerate().map(|(offset, question)| {
            let ctx = QuestionCtx::new(batch_num, batch_start + offset, question);
            async move {
                let result = classifier.classify(question).await;
                (ctx, result)
            }
        });

        let mut outcome = ChunkOutcome::default();
        for (ctx, result) in join_all(futures).await {
            match result {
                Ok(question) if question.is_complete() => {
                    debug!("{} ✓ {} / {}", ctx, question.subject, question.topic);
                    outcome.classified.push((ctx.index, question));
                }
                Ok(_) => {
                    warn!("⚠️ {} 分类结果缺少科目或主题，已排除", ctx);
                    outcome.failed += 1;
                }
                Err(ClassifyError::Unmatched(topic)) => {
                    debug!("{} 没有匹配的主题 (模型返回: {})，跳过", ctx, topic);
                    outcome.skipped += 1;
                }
                Err(ClassifyError::Model(e)) if e.is_unavailable() => {
                    warn!("⚠️ {} 分类失败，模型服务不可用: {}", ctx, e);
                    outcome.failed += 1;
                    outcome.unavailable += 1;
                    outcome.last_unavailable = Some(e);
                }
                Err(e) => {
                    warn!("⚠️ {} 分类失败，已排除: {}", ctx, e);
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}
