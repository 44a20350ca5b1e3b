use clap::Parser;
use wound_care_hub::config::Command;
use wound_care_hub::domain::model::{Actor, EligibilityRequest};
use wound_care_hub::utils::error::ErrorSeverity;
use wound_care_hub::utils::{logger, validation::Validate};
use wound_care_hub::{AppConfig, CliConfig, HubApp, HubError, Result};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting wound-care-hub");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        // 記錄詳細錯誤信息
        tracing::error!("❌ Command failed: {} (Severity: {:?})", e, e.severity());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let mut config = AppConfig::from_file(&cli.config)?;

    match cli.command {
        Command::ValidateConfig => {
            config.validate()?;
            let warnings = config.warnings();
            for warning in &warnings {
                println!("⚠️ {}", warning);
            }
            println!(
                "✅ {} is valid ({} warnings)",
                cli.config.display(),
                warnings.len()
            );
            Ok(())
        }
        Command::Serve {
            host,
            port,
            no_scheduler,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            for warning in config.warnings() {
                tracing::warn!("⚠️ {}", warning);
            }

            let address = config.bind_address();
            let app = HubApp::from_config(config)?;
            app.serve(&address, !no_scheduler).await
        }
        Command::SyncTemplates { force } => {
            config.validate()?;
            let app = HubApp::from_config(config)?;
            let summary = app.sync_templates(force).await?;
            println!("✅ Template sync finished: {}", summary);
            if summary.errors > 0 {
                return Err(HubError::provider(
                    "docuseal",
                    format!("{} templates failed to sync", summary.errors),
                ));
            }
            Ok(())
        }
        Command::CheckEligibility {
            request,
            organization,
        } => {
            config.validate()?;
            let content = tokio::fs::read_to_string(&request).await?;
            let request: EligibilityRequest = serde_json::from_str(&content)?;

            let app = HubApp::from_config(config)?;
            let actor = Actor {
                organization_id: organization,
                ..Actor::system()
            };
            let outcome = app.state().dispatcher.check(&actor, &request).await?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.success {
                Ok(())
            } else {
                Err(HubError::provider(
                    "eligibility",
                    "no eligibility provider returned a result",
                ))
            }
        }
    }
}
