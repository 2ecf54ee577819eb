//! 作答统计
//!
//! 与科目树相互独立：删除文件不会影响已有的作答记录。

use tracing::debug;

use crate::models::performance::accuracy;
use crate::models::{topic_key, PerformanceData, QuestionRecord};

/// 报表中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceRow {
    pub subject: String,
    /// `None` 表示科目汇总行
    pub topic: Option<String>,
    pub correct: u32,
    pub total: u32,
    /// 正确率（百分比）
    pub accuracy: u32,
}

/// 记录一次作答，返回新的统计数据
///
/// 主题按归一化键对齐到已有记录，避免同一主题因大小写不同被拆开统计。
pub fn record(
    performance: &PerformanceData,
    subject: &str,
    topic: &str,
    entry: QuestionRecord,
) -> PerformanceData {
    let mut next = performance.clone();
    let subject_stats = next.entry(subject.trim().to_string()).or_default();

    let key = topic_key(topic);
    let topic_name = subject_stats
        .topics
        .keys()
        .find(|name| topic_key(name) == key)
        .cloned()
        .unwrap_or_else(|| topic.trim().to_string());

    let correct = u32::from(entry.is_correct);
    subject_stats.correct += correct;
    subject_stats.total += 1;

    let topic_stats = subject_stats.topics.entry(topic_name).or_default();
    topic_stats.correct += correct;
    topic_stats.total += 1;
    topic_stats.questions.push(entry);

    debug!(
        "作答已记录: {} / {} ({}/{})",
        subject, topic, topic_stats.correct, topic_stats.total
    );
    next
}

/// 生成报表：按科目名称排序，每个科目一行汇总，后跟各主题
pub fn summary(performance: &PerformanceData) -> Vec<PerformanceRow> {
    let mut rows = Vec::new();
    for (subject, stats) in performance {
        rows.push(PerformanceRow {
            subject: subject.clone(),
            topic: None,
            correct: stats.correct,
            total: stats.total,
            accuracy: accuracy(stats.correct, stats.total),
        });
        for (topic, t) in &stats.topics {
            rows.push(PerformanceRow {
                subject: subject.clone(),
                topic: Some(topic.clone()),
                correct: t.correct,
                total: t.total,
                accuracy: accuracy(t.correct, t.total),
            });
        }
    }
    rows
}
