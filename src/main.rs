//! CIMC Redfish agent entry point: CLI dispatch, signal handlers, async runtime.

mod app;
mod config;
mod coordinator;
mod entities;
mod redfish;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use app::cli::{Args, HELP_TEXT};
use app::logging::{init_tracing, reload_level, resolve_level};
use config::persistence::{load_config, resolve_config_path};
use config::setup::{run_options_flow, run_setup_wizard};
use config::types::AgentConfig;
use coordinator::Coordinator;
use entities::{build_entities, SensorEntity};
use redfish::validate::validate_connection;
use redfish::{HttpsTransport, RedfishClient};
use telemetry::types::Snapshot;

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp {
                print!("{}", HELP_TEXT);
                std::process::exit(0);
            }
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!("\x1b[32mcimc-redfish-agent {} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                std::process::exit(0);
            }

            eprintln!("{}", err);
            eprintln!();
            print!("{}", HELP_TEXT);
            eprintln!("\nFor more information, try '--help'.");
            std::process::exit(1);
        }
    };

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let env_level = std::env::var("LOG_LEVEL").ok();
    let explicit_level = args.log_level.clone().or(env_level);
    init_tracing(resolve_level(explicit_level.as_deref(), None, None));

    let config_path = args.config.as_deref();

    if args.setup {
        return run_setup_wizard(config_path).await;
    }

    if let Some(seconds) = args.options {
        return run_options_flow(config_path, seconds).await;
    }

    let config_file = resolve_config_path(config_path)?;
    if !config_file.exists() {
        eprintln!("ERROR: Configuration file not found: {:?}", config_file);
        eprintln!("\nPlease run the setup wizard first:");
        eprintln!("  ./cimc-redfish-agent --setup");
        std::process::exit(1);
    }

    let config = load_config(config_path).await?;
    if explicit_level.is_none() {
        if let Err(e) = reload_level(&config.logging.log_level) {
            warn!("Could not apply configured log level: {}", e);
        }
    }

    if args.show_config {
        let mut shown = config.clone();
        if !shown.connection.password.is_empty() {
            shown.connection.password = "********".to_string();
        }
        println!("\n{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    info!("CIMC Redfish Agent v{} starting ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS);

    let client = Arc::new(build_client(&config)?);

    if args.test {
        return run_test(&client).await;
    }

    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&client),
        config.options.poll_interval_seconds,
    )?);

    // Initial fetch validates the connection and seeds the entities.
    let snapshot = coordinator
        .first_refresh()
        .await
        .with_context(|| format!("CIMC {} is not ready", client.host()))?;

    if args.once {
        return print_once(&snapshot);
    }

    run_foreground(coordinator, snapshot, config_path.map(str::to_string)).await
}

fn build_client(config: &AgentConfig) -> Result<RedfishClient> {
    let c = &config.connection;
    if !c.is_configured() {
        anyhow::bail!("CIMC host and username are required; run --setup");
    }
    let transport = HttpsTransport::new(&c.host, &c.username, &c.password, c.tls())
        .with_context(|| format!("Failed to create Redfish transport for {}", c.host))?;
    Ok(RedfishClient::new(c.host.clone(), Arc::new(transport)))
}

async fn run_test(client: &RedfishClient) -> Result<()> {
    info!("Running in test mode");
    if let Err(reason) = validate_connection(client).await {
        error!("Validation failed: {}", reason);
        std::process::exit(1);
    }

    let snapshot = client.fetch_all().await?;
    let entities = build_entities(&snapshot);
    info!(
        "Discovered {} fans, {} PSUs, {} temperature sensors ({} entities)",
        snapshot.fans.len(),
        snapshot.psus().len(),
        snapshot.temperatures().len(),
        entities.len()
    );
    if let Some(device) = entities.first().map(|e| e.device_info()) {
        info!(
            "Device: {} ({} {}, serial {})",
            device.name,
            device.manufacturer,
            device.model,
            device.serial_number.as_deref().unwrap_or("unknown")
        );
    }
    for entity in &entities {
        info!("  • {} ({})", entity.name(), entity.unique_id());
    }
    Ok(())
}

fn print_once(snapshot: &Snapshot) -> Result<()> {
    let states = build_entities(snapshot)
        .iter()
        .map(|e| e.state(snapshot))
        .collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&states)?);
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}

fn log_states(entities: &[Box<dyn SensorEntity>], snapshot: &Snapshot) {
    let unavailable = entities
        .iter()
        .filter(|e| e.native_value(snapshot).is_none())
        .count();
    let fastest_fan = snapshot
        .fans
        .iter()
        .filter_map(|f| f.rpm.as_ref()?.numeric())
        .map(|rpm| rpm.as_f64())
        .fold(None, |max: Option<f64>, rpm| Some(max.map_or(rpm, |m| m.max(rpm))));
    info!(
        "Snapshot: {} entities ({} unavailable), fastest fan {} RPM, power {}",
        entities.len(),
        unavailable,
        fastest_fan.map_or_else(|| "n/a".to_string(), |rpm| rpm.to_string()),
        if snapshot.power.is_some() { "ok" } else { "missing" }
    );
    for entity in entities {
        let state = entity.state(snapshot);
        match &state.value {
            Some(value) => debug!("{} = {} {}", state.name, value, state.unit),
            None => debug!("{} unavailable", state.name),
        }
    }
}

async fn run_foreground(
    coordinator: Arc<Coordinator>,
    first: Arc<Snapshot>,
    config_path: Option<String>,
) -> Result<()> {
    // Entities are created once from the first snapshot and re-resolve on every update.
    let entities = build_entities(&first);
    log_states(&entities, &first);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut updates = coordinator.subscribe();
    let mut update_shutdown = shutdown_rx.clone();
    let reporter = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest = updates.borrow_and_update().clone();
                    if let Some(snapshot) = latest {
                        log_states(&entities, &snapshot);
                    }
                }
                _ = update_shutdown.changed() => break,
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            while sighup.recv().await.is_some() {
                info!("SIGHUP received, reloading configuration");
                match load_config(config_path.as_deref()).await {
                    Ok(new_config) => {
                        if let Err(e) = coordinator.set_poll_interval(new_config.options.poll_interval_seconds) {
                            warn!("Ignoring poll interval from config: {}", e);
                        }
                        if let Err(e) = reload_level(&new_config.logging.log_level) {
                            error!("Failed to reload log level: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to reload config: {}", e),
                }
            }
        });
    }
    #[cfg(not(unix))]
    let _ = config_path;

    let shutdown_signal = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
        let _ = shutdown_tx.send(true);
    });

    info!(
        "Polling {} every {}s",
        coordinator.client().host(),
        coordinator.poll_interval().as_secs()
    );
    coordinator.run(shutdown_rx).await;

    shutdown_signal.abort();
    let _ = reporter.await;
    info!(
        "Agent shutdown complete (last poll {})",
        if coordinator.last_update_success() { "succeeded" } else { "failed" }
    );
    Ok(())
}
