//! 题目解析服务 - 业务能力层
//!
//! 给一道选择题生成正确答案、解析、干扰项说明和参考文献。

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::PromptError;
use crate::infrastructure::{invoke_json, PromptInvoker, PromptRequest, ResponseSchema};
use crate::models::Explanation;

const EXPLAIN_SYSTEM: &str = "You are an expert medical educator and AI assistant. \
You answer with a single JSON object that strictly follows the requested schema.";

impl ResponseSchema for Explanation {
    fn validate(&self) -> Result<(), String> {
        if self.correct_answer.trim().is_empty() {
            return Err("correctAnswer 为空".to_string());
        }
        if self.explanation.trim().is_empty() {
            return Err("explanation 为空".to_string());
        }
        if self.citations.is_empty() {
            return Err("citations 为空".to_string());
        }
        Ok(())
    }
}

/// 题目解析服务
pub struct Explainer {
    invoker: Arc<dyn PromptInvoker>,
}

impl Explainer {
    pub fn new(invoker: Arc<dyn PromptInvoker>) -> Self {
        Self { invoker }
    }

    /// 生成解析
    pub async fn explain(&self, question: &str) -> Result<Explanation, PromptError> {
        let request = PromptRequest::new("explain", EXPLAIN_SYSTEM, build_prompt(question));
        invoke_json(self.invoker.as_ref(), &request).await
    }
}

fn build_prompt(question: &str) -> String {
    format!(
        r#"Your task is to analyze a given multiple-choice question (MCQ) and provide a comprehensive, clear, and well-cited explanation.

**Input Question:**
{}

**Your Task:**

1.  **Identify the Correct Answer:** Determine which of the provided options is correct. Put only its letter (e.g. "A") in "correctAnswer".
2.  **Explain the Correct Answer:** Provide a detailed rationale in "explanation", covering the underlying medical principles, pathology, or clinical reasoning.
3.  **Explain the Distractors:** For each incorrect option add an entry to "distractorExplanations" with keys "option" and "explanation". Explain the concept behind the distractor and why it does not apply to this scenario.
4.  **Cite Your Sources:** Provide at least two credible medical sources (e.g. Harrison's Principles of Internal Medicine, Kumar & Clark's Clinical Medicine, NICE guidelines) in the "citations" array.
5.  **Output Format:** Return a JSON object with keys "correctAnswer", "explanation", "distractorExplanations" and "citations"."#,
        question
    )
}

fn option_label_regex() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| Regex::new(r"^\s*\(?([A-Ea-e])[\.\):]").expect("静态正则"))
}

/// 取出选项前的字母标签（"B. Asthma" → 'B'）
pub fn option_label(option: &str) -> Option<char> {
    option_label_regex()
        .captures(option)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

/// 判断所选选项是否为正确答案
///
/// 优先比较字母标签；无法识别标签时退化为前缀比较。
pub fn is_correct_answer(selected: &str, correct_answer: &str) -> bool {
    let correct = correct_answer.trim();
    if correct.is_empty() {
        return false;
    }

    let correct_letter = option_label(correct).or_else(|| {
        let mut chars = correct.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
            _ => None,
        }
    });

    let selected_letter = option_label(selected).or_else(|| {
        let trimmed = selected.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
            _ => None,
        }
    });

    match (selected_letter, correct_letter) {
        (Some(s), Some(c)) => s == c,
        // 答案是选项字母，而所选内容不带字母，无法比较
        (None, Some(_)) => false,
        _ => selected.trim().to_lowercase().starts_with(&correct.to_lowercase()),
    }
}
