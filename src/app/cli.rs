//! Command-line argument definitions (clap) and help text.

use clap::Parser;

pub const HELP_TEXT: &str = "
Cisco CIMC Redfish Telemetry Agent
Usage: cimc-redfish-agent [OPTIONS]

Options:
  -h, --help                    Print help
  -V, --version                 Print version
Setup:
  -e, --setup                   Run interactive setup (host, credentials, TLS) and validate the connection
  -o, --options <SECONDS>       Set the poll interval (5-3600 seconds)
Polling:
  -r, --run                     Poll in the foreground until Ctrl+C (default)
      --once                    Poll once and print every sensor and the raw snapshot
      --test                    Validate the connection and list discovered sensors
Config & Logging:
  -c, --config <PATH>           Use this config file instead of config.json next to the binary
      --show-config             Show current configuration (password masked)
      --log-level <LOG_LEVEL>   Set log level (TRACE, DEBUG, INFO, WARN, ERROR)
";

#[derive(Parser, Debug)]
#[command(name = "cimc-redfish-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cisco CIMC Redfish Telemetry Agent", long_about = None)]
pub struct Args {
    // === Setup ===
    /// Run interactive setup (host, credentials, TLS) and validate the connection
    #[arg(short = 'e', long, help_heading = "Setup")]
    pub setup: bool,

    /// Set the poll interval (5-3600 seconds)
    #[arg(short = 'o', long = "options", value_name = "SECONDS", help_heading = "Setup")]
    pub options: Option<u64>,

    // === Polling ===
    /// Poll in the foreground until Ctrl+C (default)
    #[arg(short = 'r', long, help_heading = "Polling")]
    pub run: bool,

    /// Poll once and print every sensor and the raw snapshot
    #[arg(long, help_heading = "Polling", conflicts_with = "run")]
    pub once: bool,

    /// Validate the connection and list discovered sensors
    #[arg(long, help_heading = "Polling", conflicts_with_all = ["run", "once"])]
    pub test: bool,

    // === Config & Logging ===
    /// Use this config file instead of config.json next to the binary
    #[arg(short = 'c', long, value_name = "PATH", help_heading = "Config & Logging")]
    pub config: Option<String>,

    /// Show current configuration (password masked)
    #[arg(long = "show-config", help_heading = "Config & Logging")]
    pub show_config: bool,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long = "log-level", help_heading = "Config & Logging")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_options_and_config_path() {
        let args = Args::try_parse_from(["cimc-redfish-agent", "--options", "60", "-c", "/tmp/cimc.json"]).unwrap();
        assert_eq!(args.options, Some(60));
        assert_eq!(args.config.as_deref(), Some("/tmp/cimc.json"));
        assert!(!args.run);
    }

    #[test]
    fn once_and_run_conflict() {
        assert!(Args::try_parse_from(["cimc-redfish-agent", "--once", "--run"]).is_err());
    }
}
