//! 题目分类上下文
//!
//! 封装"我正在处理第几批的第几题"这一信息，只用于日志。

use std::fmt::Display;

use crate::utils::logging::truncate_text;

/// 日志中题目预览的最大字符数
const PREVIEW_CHARS: usize = 50;

/// 题目分类上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 批次编号（从 1 开始）
    pub chunk: usize,

    /// 题目在整份文档中的原始索引（从 0 开始）
    pub index: usize,

    /// 题目预览
    pub preview: String,
}

impl QuestionCtx {
    pub fn new(chunk: usize, index: usize, question: &str) -> Self {
        Self {
            chunk,
            index,
            preview: truncate_text(&question.replace('\n', " "), PREVIEW_CHARS),
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次#{} 题目#{} \"{}\"]",
            self.chunk,
            self.index + 1,
            self.preview
        )
    }
}
