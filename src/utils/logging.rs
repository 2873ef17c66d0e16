use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;

use crate::config::Config;
use crate::orchestrator::AnalysisReport;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n图片分析日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量图片分析模式");
    info!("📊 最大并发上传数: {}", config.max_concurrent_uploads);
    info!("🖼️ 单批最多图片数: {}", config.max_images);
    info!("🗜️ JPEG 质量: {}", config.jpeg_quality);
    info!(
        "🔁 上传重试: {} 次 / 间隔 {} 毫秒",
        config.upload_max_attempts, config.upload_retry_delay_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录图片扫描结果
///
/// # 参数
/// - `found`: 目录中的图片总数
/// - `selected`: 本批实际处理的数量
pub fn log_images_found(found: usize, selected: usize) {
    info!("✓ 找到 {} 张待处理的图片", found);
    if selected < found {
        info!("📋 本批处理 {} 张", selected);
    }
}

/// 记录上传汇总
pub fn log_upload_summary(success: usize, failed: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 上传完成: 成功 {}/{}", success, success + failed);
    if failed > 0 {
        info!("❌ 上传失败: {}", failed);
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `report`: 本次运行报告
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(report: &AnalysisReport, log_file_path: &str) {
    use crate::models::Classification;

    info!("\n{}", "=".repeat(60));
    info!("📊 分析完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("结论: {}", report.outcome);
    info!("🖼️ 图片: 找到 {} / 处理 {} / 上传 {}", report.images_found, report.images_selected, report.uploaded);
    info!("✅ yes: {}", report.results.count(Classification::Yes));
    info!("⬜ no: {}", report.results.count(Classification::No));
    info!("❓ unknown: {}", report.results.count(Classification::Unknown));
    info!("❌ 上传失败: {}", report.failed_uploads.len());
    info!("⏱️ 总耗时: {:.2} 秒", report.elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 把每张图片的结论追加到日志文件
pub fn append_results(log_file_path: &str, report: &AnalysisReport) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(file, "结论: {}", report.outcome)?;
    for verdict in report.results.iter() {
        let source = verdict
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            file,
            "{} | {} | {} | {}",
            verdict.image_id,
            verdict.classification,
            source,
            verdict.explanation.replace('\n', " ")
        )?;
    }
    for failed in &report.failed_uploads {
        writeln!(
            file,
            "上传失败 | {} | 尝试 {} 次 | {}",
            failed.source_path.display(),
            failed.attempts,
            failed.reason
        )?;
    }
    writeln!(file, "耗时: {:.2} 秒\n", report.elapsed.as_secs_f64())?;
    Ok(())
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
