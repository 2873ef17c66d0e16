use anyhow::Result;
use batch_image_analyzer::{logger, App, Config};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_toml_file(Path::new(&path))?,
        Err(_) => Config::from_env(),
    };

    // 初始化日志
    logger::init_with_verbose(config.verbose_logging);

    // 初始化并运行应用
    let report = App::initialize(config)?.run().await?;

    println!("{}", serde_json::to_string_pretty(&report.results)?);

    Ok(())
}
