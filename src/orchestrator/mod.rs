//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `document_pipeline` - 单个文档处理器
//! - 整份 / 逐页提取题目
//! - 提取后、分类后检查取消信号
//! - 委托 batch_processor 分类
//!
//! ### `batch_processor` - 批量分类处理器
//! - 按 chunk_size 分批
//! - 批内并发（join_all），批间串行
//! - 单题失败隔离，整批不可用时中止
//! - 输出分类统计
//!
//! ## 层次关系
//!
//! ```text
//! app::StudySession (上传 / 作答 / 删除 / 清空)
//!     ↓
//! document_pipeline (处理一份文档)
//!     ↓
//! batch_processor (处理 Vec<String>)
//!     ↓
//! services (能力层：extract / classify / explain)
//!     ↓
//! infrastructure (基础设施：PromptInvoker / PageRenderer)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：document_pipeline 管单个文档，batch_processor 管批量
//! 2. **向下依赖**：编排层 → services → infrastructure
//! 3. **无状态**：不持有科目树，不做持久化

pub mod batch_processor;
pub mod document_pipeline;
pub mod question_ctx;

// 重新导出主要类型
pub use batch_processor::{BatchOrchestrator, BatchReport};
pub use document_pipeline::{DocumentPipeline, PipelineOutcome};
pub use question_ctx::QuestionCtx;
