/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先于配置中的日志级别；重复调用不会报错
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 作文流式批改启动");
    info!(
        "🧠 模型版本: {} {}",
        config.model_version.name, config.model_version.version
    );
    info!(
        "🔁 单步最大重试: {} 次 | 事件缓冲: {}",
        config.retry.max_retries, config.event_buffer
    );
    info!("{}", "=".repeat(60));
}

/// 记录批改开始信息
pub fn log_evaluation_start(title: &str, content: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📝 开始批改: {}", title);
    info!("📄 清理后作文: {}", truncate_text(content, 80));
}

/// 打印最终统计信息
///
/// # 参数
/// - `succeeded`: 成功的评估步骤数
/// - `failed`: 失败的评估步骤数
/// - `total`: 评估步骤总数
pub fn print_final_stats(succeeded: usize, failed: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批改完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 成功: {}/{}", succeeded, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
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
