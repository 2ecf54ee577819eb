//! # Exam Hotspot
//!
//! 从医学考试试卷中提取题目、按科目 / 主题分类，统计高频考点并记录练习结果
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `PromptInvoker` - 调用多模态模型，返回原始文本
//! - `KeyValueStore` - 本地键值存储（文件 / 内存）
//! - `PageRenderer` - PDF 逐页渲染（`pdfium` 特性）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文档或单道题
//! - `Extractor` - 提取题目
//! - `Classifier` - 判定科目和主题
//! - `Explainer` - 生成解析
//!
//! ### ③ 状态层（Taxonomy）
//! - `taxonomy/` - 科目树合并、作答统计、持久化
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/document_pipeline` - 单个文档：提取 → 分类，处理取消
//! - `orchestrator/batch_processor` - 分批并发分类，失败隔离
//!
//! ### ⑤ 应用层
//! - `app::StudySession` - 上传、作答、删除、清空等全部对外操作
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod taxonomy;
pub mod utils;

// 重新导出常用类型
pub use app::{AnswerOutcome, StudySession, UploadOutcome};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{KeyValueStore, PromptInvoker, PromptRequest};
pub use models::{ClassifiedQuestion, DocumentInput, Subject, Topic};
pub use orchestrator::{BatchOrchestrator, BatchReport, DocumentPipeline, PipelineOutcome};
