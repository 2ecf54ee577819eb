use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次作答记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub question: String,
    pub selected_option: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// 主题维度的作答统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicPerformance {
    pub correct: u32,
    pub total: u32,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
}

/// 科目维度的作答统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectPerformance {
    pub correct: u32,
    pub total: u32,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicPerformance>,
}

/// 科目 → 统计
pub type PerformanceData = BTreeMap<String, SubjectPerformance>;

/// 正确率（百分比，四舍五入）；没有作答时为 0
pub fn accuracy(correct: u32, total: u32) -> u32 {
    if total == 0 {
        0
    } else {
        ((correct as f64 / total as f64) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(0, 0), 0);
        assert_eq!(accuracy(1, 3), 33);
        assert_eq!(accuracy(2, 3), 67);
        assert_eq!(accuracy(5, 5), 100);
    }
}
