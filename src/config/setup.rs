//! Interactive setup for the CIMC connection, plus the poll interval options flow.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::persistence::{load_config, resolve_config_path, save_config};
use crate::config::types::*;
use crate::redfish::validate::{validate_connection, ValidationError};
use crate::redfish::{HttpsTransport, RedfishClient, TlsVersion};

fn ask(label: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        print!("{}: ", label);
    } else {
        print!("{} [{}]: ", label, default);
    }
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(or_default(&input, default))
}

fn or_default(input: &str, default: &str) -> String {
    let input = input.trim();
    if input.is_empty() { default.to_string() } else { input.to_string() }
}

/// "y"/"n" answer; anything else keeps `default`.
fn parse_yes_no(input: &str, default: bool) -> bool {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

fn parse_tls_version(input: &str, default: TlsVersion) -> TlsVersion {
    let input = input.trim();
    if input.is_empty() {
        return default;
    }
    input.parse().unwrap_or_else(|e| {
        println!("   ⚠ {}; using {}", e, default);
        default
    })
}

/// Overwriting the saved host is confirmed once per wizard run.
fn needs_replace_prompt(existing: Option<&AgentConfig>, host: &str, confirmed: bool) -> bool {
    !confirmed && existing.is_some_and(|prev| prev.connection.host == host)
}

/// Probe the CIMC with the entered settings. One fan fetch, no retries.
async fn check_connection(connection: &ConnectionSettings) -> Result<(), ValidationError> {
    let transport = HttpsTransport::new(
        &connection.host,
        &connection.username,
        &connection.password,
        connection.tls(),
    )
    .map_err(|e| ValidationError::from(&e))?;
    let client = RedfishClient::new(connection.host.clone(), Arc::new(transport));
    validate_connection(&client).await
}

pub async fn run_setup_wizard(config_path: Option<&str>) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;

    println!("\n╔══════════════════════════════════════════╗");
    println!("║     Cisco CIMC Redfish Agent Setup       ║");
    println!("╚══════════════════════════════════════════╝");
    println!("Build: \x1b[32mcimc-redfish-agent v{} ({})\x1b[0m\n", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);

    let existing = if config_file.exists() {
        load_config(config_file.to_str()).await.ok()
    } else {
        None
    };
    let mut config = existing.clone().unwrap_or_default();

    println!("📋 Connection:\n");
    println!("Values in [brackets] are defaults - press Enter to use them.\n");

    let mut replace_confirmed = false;
    loop {
        let c = &mut config.connection;
        c.host = ask("CIMC host or IP", &c.host)?;
        if c.host.is_empty() {
            println!("   ⚠ Host is required.");
            continue;
        }
        if needs_replace_prompt(existing.as_ref(), &c.host, replace_confirmed) {
            println!("⚠️  {} is already configured in {:?}", c.host, config_file);
            let answer = ask("Replace its settings? (y/N)", "")?;
            if !parse_yes_no(&answer, false) {
                println!("Config unchanged.");
                return Ok(());
            }
            replace_confirmed = true;
        }

        c.username = ask("Username", &c.username)?;
        let password = ask("Password (Enter keeps current)", "")?;
        if !password.is_empty() {
            c.password = password;
        }

        let default_verify = if c.verify_certificates { "y" } else { "n" };
        let verify = ask("Verify TLS certificates? (y/n)", default_verify)?;
        c.verify_certificates = parse_yes_no(&verify, c.verify_certificates);

        let choices = TlsVersion::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join("/");
        let tls = ask(&format!("Minimum TLS version ({})", choices), c.minimum_tls_version.as_str())?;
        c.minimum_tls_version = parse_tls_version(&tls, c.minimum_tls_version);

        println!("\n🔍 Validating Redfish access to {}...", c.host);
        match check_connection(c).await {
            Ok(()) => {
                println!("✅ Connected to CIMC {}", c.host);
                break;
            }
            Err(reason) => {
                println!("❌ {}", reason);
                let retry = ask("Edit settings and retry? (Y/n)", "")?;
                if !parse_yes_no(&retry, true) {
                    println!("Config unchanged.");
                    return Ok(());
                }
                println!();
            }
        }
    }

    save_config(&config, &config_file).await?;
    println!("\n✅ Configuration saved to: {:?}", config_file);
    println!("   Poll interval: {}s (change with --options <SECONDS>)", config.options.poll_interval_seconds);
    println!("\n✨ Setup complete! Start polling with: ./cimc-redfish-agent --run");
    Ok(())
}

/// Options flow: validate and persist a new poll interval. A running agent
/// picks it up on SIGHUP.
pub async fn run_options_flow(config_path: Option<&str>, seconds: u64) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    let seconds = validate_poll_interval(seconds)?;
    let previous = apply_poll_interval(&config_file, seconds).await?;

    println!("✅ Poll interval: {}s → {}s", previous, seconds);
    println!("   A running agent applies it on SIGHUP (kill -HUP <pid>) or restart.");
    Ok(())
}

/// Store `seconds` as the poll interval; returns the previous value.
pub(crate) async fn apply_poll_interval(config_file: &Path, seconds: u64) -> Result<u64> {
    if !config_file.exists() {
        anyhow::bail!("Configuration file not found: {:?}. Run --setup first.", config_file);
    }
    let mut config = load_config(config_file.to_str())
        .await
        .context("Failed to load configuration")?;
    let previous = config.options.poll_interval_seconds;
    config.options.poll_interval_seconds = seconds;
    save_config(&config, config_file).await?;
    Ok(previous)
}
