//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`；未设置时默认 `info`，`verbose` 为真时为 `debug`。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录上传开始信息
///
/// # 参数
/// - `file_name`: 文件名
/// - `model`: 使用的模型
pub fn log_upload_start(file_name: &str, model: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始处理文档: {}", file_name);
    info!("🤖 使用模型: {}", model);
    info!("{}", "=".repeat(60));
}

/// 记录题目提取结果
///
/// # 参数
/// - `total`: 题目总数
/// - `chunk_size`: 每批数量
pub fn log_questions_extracted(total: usize, chunk_size: usize) {
    info!("✓ 提取到 {} 道题目", total);
    info!("📋 将以每批 {} 道的方式分类", chunk_size);
    info!("💡 每批完成后再开始下一批");
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始题目编号
/// - `end`: 结束题目编号
/// - `total`: 题目总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("{}", "─".repeat(60));
    info!("📦 开始分类第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批题目: {}-{} / 共 {} 道", start, end, total);
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `success`: 成功数量
/// - `total`: 本批数量
pub fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, success, total);
}

/// 打印分类统计信息
///
/// # 参数
/// - `classified`: 成功分类数量
/// - `failed`: 失败数量
/// - `skipped`: 未匹配主题而跳过的数量
/// - `total`: 总数
pub fn print_final_stats(classified: usize, failed: usize, skipped: usize, total: usize) {
    info!("{}", "=".repeat(60));
    info!("📊 分类完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 成功: {}/{}", classified, total);
    info!("❌ 失败: {}", failed);
    if skipped > 0 {
        info!("⏭️ 跳过: {}", skipped);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("心肌梗死的处理原则", 4), "心肌梗死...");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
    }

    #[test]
    fn test_init_is_idempotent() {
        init(false);
        init(true);
    }
}
