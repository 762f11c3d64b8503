//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BeatcastConfig, DeviceRetryPolicy, RestartPolicy, TransportMode};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Step timeouts below this rarely leave time for a BLE connection
const SHORT_STEP_TIMEOUT_MS: u64 = 100;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    transport: String,
    app_service_id: String,
    restart_policy: String,
    max_concurrency: usize,
    step_timeout_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    transport: format!("{:?}", config.coordinator.transport),
                    app_service_id: config.advertise.app_service_id.clone(),
                    restart_policy: format!("{:?}", config.advertise.restart_policy),
                    max_concurrency: config.connect.max_concurrency,
                    step_timeout_ms: config.connect.step_timeout_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &BeatcastConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let advertise = &config.advertise;
    if advertise.restart_policy == RestartPolicy::Eager && advertise.restart_tick_ms == 0 {
        warnings.push(
            "advertise.restart_policy is eager with restart_tick_ms = 0 - start may race the previous stop"
                .to_string(),
        );
    }
    if config.coordinator.transport == TransportMode::Connect && advertise.local_name.is_some() {
        warnings.push("advertise.local_name is unused with the connect transport".to_string());
    }

    let connect = &config.connect;
    if connect.step_timeout_ms < SHORT_STEP_TIMEOUT_MS {
        warnings.push(format!(
            "connect.step_timeout_ms = {} is short - most connects will time out",
            connect.step_timeout_ms
        ));
    }
    if config.coordinator.transport == TransportMode::Advertise
        && connect.retry_policy != DeviceRetryPolicy::Always
    {
        warnings.push("connect.retry_policy is unused with the advertise transport".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Transport: {}", summary.transport);
            println!("  App service id: {}", summary.app_service_id);
            println!("  Restart policy: {}", summary.restart_policy);
            println!("  Max concurrency: {}", summary.max_concurrency);
            println!("  Step timeout: {} ms", summary.step_timeout_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: true,
        }
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/beatcast.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_valid_file_with_warnings() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[advertise]\nrestart_policy = \"eager\"\n\n[connect]\nstep_timeout_ms = 50"
        )
        .unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid);
        assert_eq!(result.warnings.unwrap().len(), 2);
        assert_eq!(result.summary.unwrap().restart_policy, "Eager");
    }

    #[test]
    fn test_invalid_value_reports_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[connect]\nmax_concurrency = 0").unwrap();

        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("max_concurrency"));
    }
}
