use abnb_revenue::core::ConfigProvider;
use abnb_revenue::utils::error::ErrorSeverity;
use abnb_revenue::utils::{logger, validation::Validate};
use abnb_revenue::{CliConfig, EtlEngine, LocalStorage, RevenuePipeline, TomlConfig};
use anyhow::Context;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    match cli.config.clone() {
        Some(path) => {
            let mut config = TomlConfig::from_file(&path)
                .with_context(|| format!("Failed to load config file '{}'", path))?;

            // 命令列參數優先於 TOML 設定
            if let Some(data_path) = &cli.data_path {
                config.source.data_path = data_path.clone();
            }
            if let Some(output_path) = &cli.output_path {
                config.load.output_path = output_path.clone();
            }
            cli.apply_model_overrides(&mut config.model);

            init_logger(cli.verbose, cli.json_logs || config.json_logs());
            tracing::info!("📁 Loaded configuration '{}' from {}", config.pipeline.name, path);

            let monitor = cli.monitor || config.monitoring_enabled();
            run(config, monitor).await
        }
        None => {
            init_logger(cli.verbose, cli.json_logs);
            let monitor = cli.monitor;
            run(cli, monitor).await
        }
    }

    Ok(())
}

fn init_logger(verbose: bool, json: bool) {
    if json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(verbose);
    }
}

async fn run<C>(config: C, monitor_enabled: bool)
where
    C: ConfigProvider + Validate + std::fmt::Debug,
{
    tracing::debug!("Config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let source = LocalStorage::new(config.data_path());
    let sink = LocalStorage::new(config.output_path());
    let pipeline = RevenuePipeline::new(source, sink, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Revenue analysis completed successfully!");
            tracing::info!("📁 Report saved to: {}", output_path);
            println!("✅ Revenue analysis completed successfully!");
            println!("📁 Report saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Revenue analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 依錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }
}
