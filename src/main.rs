use anyhow::{Context, Result};
use essay_stream::utils::logging;
use essay_stream::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志
    logging::init(&config.log_level);

    let request_path = std::env::args()
        .nth(1)
        .context("用法: essay_stream <request.json>")?;

    // 初始化并运行应用
    let summary = App::initialize(config)?.run(&request_path).await?;

    if !summary.completed {
        std::process::exit(1);
    }
    Ok(())
}
