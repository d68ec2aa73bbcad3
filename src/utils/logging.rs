//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::blueprint::SectionPlan;
use crate::services::scoring::SectionScore;

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复初始化时静默忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n考试会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(student_id: &str, blueprint_path: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多阶段自适应考试");
    info!("👤 考生: {}", student_id);
    info!("📋 蓝图: {}", blueprint_path);
    info!("{}", "=".repeat(60));
}

/// 记录分段开始信息
pub fn log_section_start(plan: &SectionPlan, entries: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 进入分段 {}", plan.section);
    match plan.time_limit_secs {
        Some(secs) => info!("⏱ 限时 {} 秒，当前 {} 个条目", secs, entries),
        None => info!("📄 不限时，当前 {} 个条目", entries),
    }
    if plan.is_adaptive() {
        info!("🔀 自适应分段：答完分流题后选择分支");
    }
    info!("{}", "=".repeat(60));
}

/// 打印最终成绩
///
/// # 参数
/// - `report`: 各分段成绩
/// - `submitted`: 是否已成功提交
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(report: &[SectionScore], submitted: bool, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 考试完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for section in report {
        let branch = section
            .branch
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "{:<10} {:>3}/{:<3} ({:.0}%)  分支: {}",
            section.section.to_string(),
            section.score.correct,
            section.score.total,
            section.score.ratio() * 100.0,
            branch
        );
    }
    info!("{}", "=".repeat(60));
    if submitted {
        info!("✅ 作答已提交");
    } else {
        info!("❌ 作答未提交");
    }
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
