//! 业务能力层（Services）
//!
//! 每个服务只描述"我能对一道题 / 一份文档做什么"，不持有状态，
//! 也不关心批次、并发和持久化。

pub mod classifier;
pub mod explainer;
pub mod extractor;

pub use classifier::{ClassificationPolicy, Classifier, ClassifyError, OTHER_TOPIC};
pub use explainer::{is_correct_answer, option_label, Explainer};
pub use extractor::{normalize_questions, Extractor};
