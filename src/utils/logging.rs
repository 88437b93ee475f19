//! 日志工具模块
//!
//! 初始化 tracing 订阅器，并提供各阶段日志的格式化输出

use crate::config::Config;
use crate::models::RankedReport;
use crate::utils::text::truncate_text;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志（默认 info，可用 `RUST_LOG` 覆盖），重复调用无副作用
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息（不包含任何密钥）
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 职位发现与 AI 评分");
    info!("📄 搜索条件文件: {}", config.config_file.display());
    info!(
        "📊 职位上限: {} | 每批: {} | 并发批次: {}",
        config.jobs_number, config.batch_size, config.max_concurrent_batches
    );
    info!("🤖 评分模型: {}", config.llm_model_name);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
pub fn log_batch_start(batch_num: usize, total_batches: usize, job_count: usize) {
    info!("📦 正在评分第 {}/{} 批，共 {} 个职位", batch_num, total_batches, job_count);
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, scored: usize, submitted: usize) {
    info!("✓ 第 {} 批完成: 评分 {}/{}", batch_num, scored, submitted);
}

/// 打印前 `top` 个最佳匹配
pub fn log_top_matches(report: &RankedReport, top: usize) {
    if report.is_empty() {
        return;
    }

    info!("\n*** 前 {} 个最佳匹配 ***", top.min(report.len()));
    for scored in report.top(top) {
        info!("URL: {}", scored.job.url.as_deref().unwrap_or("N/A"));
        info!("职位: {}", scored.job.title);
        info!("AI 评分: {}", scored.score);
        info!("AI 点评: {}", truncate_text(&scored.comment, 200));
        info!("{}", "-".repeat(40));
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `requested`: 提交评分的职位数量
/// - `scored`: 进入报告的职位数量
/// - `failed_batches`: 重试耗尽后被丢弃的批次编号
/// - `output`: 报告路径
pub fn print_final_stats(requested: usize, scored: usize, failed_batches: &[usize], output: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已评分: {}/{}", scored, requested);
    if failed_batches.is_empty() {
        info!("❌ 失败批次: 0");
    } else {
        tracing::warn!(
            "⚠️ 失败批次: {:?}，报告只覆盖 {}/{} 个职位",
            failed_batches,
            scored,
            requested
        );
    }
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", output);
}
