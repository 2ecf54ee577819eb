use serde::{Deserialize, Serialize};

/// 已分类的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedQuestion {
    pub question: String,
    pub subject: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ClassifiedQuestion {
    /// 科目和主题都不为空
    pub fn is_complete(&self) -> bool {
        !self.subject.trim().is_empty() && !self.topic.trim().is_empty()
    }
}

impl std::fmt::Display for ClassifiedQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 截断题目内容以便显示（最多80个字符）
        let preview = if self.question.chars().count() > 80 {
            self.question.chars().take(80).collect::<String>() + "..."
        } else {
            self.question.clone()
        };
        write!(f, "{} [{} / {}]", preview, self.subject, self.topic)
    }
}

/// 干扰项解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractorExplanation {
    pub option: String,
    pub explanation: String,
}

/// 题目解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub correct_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub distractor_explanations: Vec<DistractorExplanation>,
    #[serde(default)]
    pub citations: Vec<String>,
}
