//! 资产清单主入口
//! 加载配置、初始化日志、打开存储并执行维护命令

use asset_inventory::{config::AppConfig, db, error::AppError, services::Services, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        None | Some("stats") => Command::Stats,
        Some("migrate") => Command::Migrate,
        Some("--version") => {
            println!("asset-inventory {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(env) = std::env::var("INVENTORY_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Asset inventory starting...");

    // 3. 打开存储（确保 schema 存在），无论命令成功与否都只关闭一次
    db::scoped(&config.database, |store| async move {
        match command {
            Command::Migrate => {
                tracing::info!("Schema is up to date");
                println!("schema ready");
            }
            Command::Stats => {
                let services = Services::from_store(&store);
                let stats = services.stats().await?;
                db::record_pool_metrics(store.pool());
                println!(
                    "{}",
                    serde_json::to_string_pretty(&stats)
                        .map_err(|e| AppError::Internal(e.to_string()))?
                );
            }
        }
        Ok::<(), AppError>(())
    })
    .await?;

    tracing::info!("Asset inventory shutdown complete");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Migrate,
    Stats,
}

/// 打印帮助信息
fn print_help() {
    println!("asset-inventory {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: asset-inventory [命令|选项]");
    println!();
    println!("命令:");
    println!("  migrate       创建或升级数据库 schema");
    println!("  stats         打印资产、资产组、凭据与会话数量（默认）");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 INVENTORY_ 前缀的环境变量完成");
    println!("  例如 INVENTORY_DATABASE__URL=sqlite://inventory.db");
}
