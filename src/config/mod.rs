pub mod toml_config;

pub use toml_config::{
    AppConfig, DocusealConfig, EligibilityConfig, FhirConfig, MailgunConfig, PhiConfig,
    ProviderConfig, ProviderKind, SchedulerConfig, ServerConfig, StorageBackend, StorageConfig,
};

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "wound-care-hub")]
#[command(about = "Eligibility, FHIR and e-signature integration service for wound-care ordering")]
pub struct CliConfig {
    #[arg(short, long, default_value = "config/wound-care-hub.toml")]
    pub config: PathBuf,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON logs")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API and the scheduler
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, help = "Do not start scheduled jobs")]
        no_scheduler: bool,
    },
    /// Sync DocuSeal templates into the local store
    SyncTemplates {
        #[arg(long, help = "Re-sync templates even when unchanged")]
        force: bool,
    },
    /// Validate the configuration file and print warnings
    ValidateConfig,
    /// Run one eligibility check from a JSON request file
    CheckEligibility {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        organization: Option<String>,
    },
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_command() {
        let cli = CliConfig::parse_from([
            "wound-care-hub",
            "--config",
            "hub.toml",
            "serve",
            "--port",
            "9001",
        ]);

        assert_eq!(cli.config, PathBuf::from("hub.toml"));
        match cli.command {
            Command::Serve { port, host, no_scheduler } => {
                assert_eq!(port, Some(9001));
                assert!(host.is_none());
                assert!(!no_scheduler);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_check_eligibility() {
        let cli = CliConfig::parse_from([
            "wound-care-hub",
            "check-eligibility",
            "--request",
            "req.json",
            "--organization",
            "org-1",
        ]);

        assert!(matches!(
            cli.command,
            Command::CheckEligibility { organization: Some(ref org), .. } if org == "org-1"
        ));
    }
}
