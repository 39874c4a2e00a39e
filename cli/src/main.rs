//! Licensify command-line client
//!
//! Validates and activates license keys against a Licensify server and
//! inspects the local offline cache.
//!
//! Usage:
//!   licensify --server https://licenses.example.com/api/v1/licenses --key ABCD-0001 validate
//!   licensify --config licensify.json watch --interval 600

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use licensify_cli::{Cli, Command, build_config, render_cache, render_error, render_result, to_json};
use licensify_client::{
    BackgroundChecker, DeviceIdentity, DeviceInfo, LicenseError, LicenseResult, LicenseValidator,
};
use licensify_types::ValidationResult;
use serde_json::json;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    if cli.command == Command::Device {
        return show_device(cli.json);
    }

    let config = build_config(&cli)?.validate().context("Invalid configuration")?;
    let validator = Arc::new(LicenseValidator::new(config).context("Failed to create validator")?);

    match cli.command.clone() {
        Command::Validate { online } => {
            let outcome = if online {
                validator.validate_online().await
            } else {
                validator.validate().await
            };
            report(&outcome, cli.json)
        }
        Command::Check => {
            let valid = validator.is_valid().await;
            if cli.json {
                println!("{}", to_json(&json!({ "valid": valid }))?);
            } else {
                println!("{}", if valid { "valid" } else { "invalid" });
            }
            Ok(exit_code(valid))
        }
        Command::Activate { key } => report(&validator.activate(&key).await, cli.json),
        Command::Deactivate => match validator.deactivate().await {
            Ok(()) => {
                println!("deactivated");
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                eprintln!("{}", render_error(&err));
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Watch { .. } => watch(validator, cli.json).await,
        Command::Cache { clear } => {
            if clear {
                validator.clear_cache().context("Failed to clear cache")?;
                println!("cache cleared");
            } else if cli.json {
                println!("{}", to_json(&validator.cache_info())?);
            } else {
                println!("{}", render_cache(validator.cache_info().as_ref()));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Device => show_device(cli.json),
    }
}

fn show_device(as_json: bool) -> Result<ExitCode> {
    let fingerprint = DeviceIdentity::system()
        .fingerprint()
        .context("Failed to fingerprint this device")?;
    let info = DeviceInfo::collect();

    if as_json {
        println!(
            "{}",
            to_json(&json!({ "device_id": fingerprint, "device": info }))?
        );
    } else {
        println!("Device ID:   {fingerprint}");
        println!("Device name: {}", info.device_name);
        println!("OS:          {}", info.os_label());
        println!("Arch:        {}", info.arch);
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(validator: Arc<LicenseValidator>, as_json: bool) -> Result<ExitCode> {
    let interval = validator.config().check_interval();
    let checker = BackgroundChecker::new(validator).on_outcome(move |outcome| {
        let _ = print_outcome(outcome, as_json);
    });

    checker.start(interval).await;
    info!(interval_secs = interval.as_secs(), "watching license, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    checker.stop().await;

    let status = checker.status();
    info!(runs = status.runs, "watch finished");
    Ok(exit_code(matches!(status.last_outcome, Some(Ok(_)))))
}

fn report(outcome: &LicenseResult<ValidationResult>, as_json: bool) -> Result<ExitCode> {
    print_outcome(outcome, as_json)?;
    Ok(exit_code(outcome.is_ok()))
}

fn print_outcome(outcome: &LicenseResult<ValidationResult>, as_json: bool) -> Result<()> {
    match (outcome, as_json) {
        (Ok(result), true) => println!("{}", to_json(result)?),
        (Ok(result), false) => println!("{}", render_result(result)),
        (Err(err), true) => println!("{}", to_json(&error_json(err))?),
        (Err(err), false) => eprintln!("{}", render_error(err)),
    }
    Ok(())
}

fn error_json(err: &LicenseError) -> serde_json::Value {
    json!({
        "valid": false,
        "state": err.state(),
        "error": err.to_string(),
        "retryable": err.is_retryable(),
    })
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
