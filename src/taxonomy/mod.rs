//! 状态层（Taxonomy）
//!
//! 科目树、作答统计以及它们的持久化。这里的函数都是"旧值 → 新值"，
//! 不直接修改调用方持有的数据。

pub mod performance;
pub mod persistence;
pub mod reconciler;

pub use performance::{record, summary, PerformanceRow};
pub use persistence::{PersistenceAdapter, PERFORMANCE_KEY, SUBJECTS_KEY};
pub use reconciler::{reconcile, remove_source_file, uploaded_files};
