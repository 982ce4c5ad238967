//! Tracing subscriber setup, log line format, runtime log level reload.

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{reload, EnvFilter};

pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
pub static RELOAD_HANDLE: std::sync::OnceLock<ReloadHandle> = std::sync::OnceLock::new();

/// "YYYY-MM-DD HH:MM:SS" in local time.
pub struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// "YYYY-MM-DD HH:MM:SS [LEVEL] message"
pub struct CustomEventFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomEventFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match *level {
                tracing::Level::TRACE => "\x1b[2m",
                tracing::Level::DEBUG => "\x1b[34m",
                tracing::Level::INFO => "\x1b[32m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}[{}]\x1b[0m ", color, level)?;
        } else {
            write!(writer, "[{}] ", level)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Map a configured level name onto a tracing filter directive.
/// Unknown names fall back to "info"; "critical" is treated as "error".
pub fn filter_directive(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "critical" | "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

/// Priority: --log-level, then LOG_LEVEL env, then config, then info.
pub fn resolve_level(cli: Option<&str>, env: Option<&str>, config: Option<&str>) -> &'static str {
    cli.or(env)
        .or(config)
        .map(filter_directive)
        .unwrap_or("info")
}

pub fn init_tracing(filter: &str) {
    use tracing_subscriber::prelude::*;

    let (filter_layer, reload_handle) = reload::Layer::new(EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(CustomEventFormat),
        )
        .init();

    let _ = RELOAD_HANDLE.set(reload_handle);
}

/// Swap the active filter, e.g. after the config file changed.
pub fn reload_level(level: &str) -> anyhow::Result<()> {
    let directive = filter_directive(level);
    let handle = RELOAD_HANDLE
        .get()
        .ok_or_else(|| anyhow::anyhow!("Tracing is not initialized"))?;
    handle.reload(EnvFilter::new(directive))?;
    tracing::info!("Log level reloaded: {}", directive.to_uppercase());
    Ok(())
}
