//! CAS ticket validation CLI
//!
//! Validates a single CAS service ticket and prints the outcome as JSON.
//! Exit status: 0 accepted, 1 rejected, 2 no definitive answer.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use cas_validator::{ValidationOutcome, Validator, ValidatorConfig, ValidatorConfigJson};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "cas-validate")]
#[command(about = "Validate a CAS service ticket")]
struct Args {
    /// Service ticket to validate
    ticket: String,

    /// CAS server base URL (must be https)
    #[arg(long, env = "CAS_BASE_URL")]
    base_url: Option<String>,

    /// Service URL the ticket was issued for
    #[arg(long, env = "CAS_SERVICE")]
    service: Option<String>,

    /// CAS protocol version (1.0 or 2.0)
    #[arg(long, env = "CAS_PROTOCOL_VERSION")]
    protocol_version: Option<f32>,

    /// Accept self-signed server certificates
    #[arg(long, env = "CAS_SKIP_TLS_VERIFY")]
    skip_tls_verify: bool,

    /// Request timeout in seconds (0 disables)
    #[arg(long, env = "CAS_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// JSON config file, applied before command line flags
    #[arg(long, env = "CAS_CONFIG")]
    config: Option<PathBuf>,

    /// Ask the CAS server to require fresh credentials
    #[arg(long)]
    renew: bool,

    /// Enable verbose logging
    #[arg(short, long, env = "CAS_VERBOSE")]
    verbose: bool,
}

impl Args {
    /// Layer the config file (if any) and then the flags over the defaults.
    fn to_config(&self) -> Result<ValidatorConfig> {
        let mut config = ValidatorConfig::default();

        if let Some(ref path) = self.config {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let file: ValidatorConfigJson = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            file.apply_to(&mut config);
        }

        let flags = ValidatorConfigJson {
            base_url: self.base_url.clone(),
            protocol_version: self.protocol_version,
            service: self.service.clone(),
            skip_tls_verify: self.skip_tls_verify.then_some(true),
            request_timeout_secs: self.timeout_secs,
        };
        flags.apply_to(&mut config);

        Ok(config)
    }
}

/// Outcome category, also selecting the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ReportStatus {
    Success,
    Failure,
    TransportError,
}

/// JSON report printed to stdout.
#[derive(Debug, Serialize)]
struct Report<'a> {
    status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> Report<'a> {
    fn from_outcome(outcome: &'a ValidationOutcome) -> Self {
        let empty = Report {
            status: ReportStatus::Success,
            username: None,
            attributes: None,
            code: None,
            message: None,
            error: None,
        };

        match outcome {
            ValidationOutcome::Success(principal) => Report {
                status: ReportStatus::Success,
                username: Some(&principal.username),
                attributes: (!principal.attributes.is_empty()).then_some(&principal.attributes),
                ..empty
            },
            ValidationOutcome::Failure { code, message } => Report {
                status: ReportStatus::Failure,
                code: code.as_deref(),
                message: message.as_deref(),
                ..empty
            },
            ValidationOutcome::TransportError(e) => Report {
                status: ReportStatus::TransportError,
                error: Some(e.to_string()),
                ..empty
            },
        }
    }

    fn exit_code(&self) -> ExitCode {
        match self.status {
            ReportStatus::Success => ExitCode::SUCCESS,
            ReportStatus::Failure => ExitCode::from(1),
            ReportStatus::TransportError => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("cas_validator={0},cas_validate={0}", log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = args.to_config()?;
    debug!(
        base_url = %config.base_url,
        protocol_version = config.protocol_version,
        service_configured = config.service.is_some(),
        skip_tls_verify = config.skip_tls_verify,
        "Configuration loaded"
    );

    let validator = Validator::new(config).context("Invalid CAS configuration")?;
    info!(base_url = %validator.base_url(), protocol = %validator.protocol(), "Validator ready");

    let outcome = validator
        .validate(&args.ticket, None, args.renew)
        .await
        .context("Invalid validation request")?;

    let report = Report::from_outcome(&outcome);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(report.exit_code())
}
