//! Logging for the resilient client
//!
//! [`ClientLogger`] is handed to the client at construction and tags every
//! event with the device identity. [`init_logging`] is an optional helper
//! that installs a subscriber with console and rolling-file output; the
//! returned guard belongs to the caller.

use crate::config::LoggingConfig;
use crate::error::ModbusError;
use crate::quarantine::QuarantineKey;
use std::path::Path;
use std::time::Duration;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logger bound to one device connection
#[derive(Debug, Clone)]
pub struct ClientLogger {
    device: String,
}

impl ClientLogger {
    /// Create a logger for the device identified by `device` (usually `host:port`)
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Log connection attempt
    pub fn log_connect(&self) {
        tracing::warn!(device = %self.device, "[CONNECT] Trying to connect");
    }

    /// Log successful connect
    pub fn log_connected(&self) {
        tracing::info!(device = %self.device, "[STATUS] Connected");
    }

    /// Log failed connect with the delay in force before the back-off step
    pub fn log_connect_failed(&self, retry_delay: Duration) {
        tracing::error!(
            device = %self.device,
            "[RETRY] Connection failed (retry in {:.1}s)",
            retry_delay.as_secs_f64()
        );
    }

    /// Log a dead socket detected by the liveness probe
    pub fn log_connection_lost(&self, retry_delay: Duration) {
        tracing::error!(
            device = %self.device,
            "[RETRY] Connection lost, reconnecting (retry in {:.1}s)",
            retry_delay.as_secs_f64()
        );
    }

    /// Log explicit close
    pub fn log_closed(&self) {
        tracing::info!(device = %self.device, "[STATUS] Connection closed");
    }

    /// Log a classified failure; protocol errors are warnings, everything else is an error
    pub fn log_failure(&self, context: &str, error: &ModbusError) {
        match error {
            ModbusError::Protocol(_) => {
                tracing::warn!(device = %self.device, kind = error.kind(), "[ERROR] {}: {}", context, error)
            },
            _ => {
                tracing::error!(device = %self.device, kind = error.kind(), "[ERROR] {}: {}", context, error)
            },
        }
    }

    /// Log a newly quarantined address range
    pub fn log_quarantined(&self, key: &QuarantineKey, ttl: Duration) {
        tracing::warn!(
            device = %self.device,
            "[QUARANTINE] {} for {}s",
            key,
            ttl.as_secs()
        );
    }

    /// Log a request skipped because its range is quarantined
    pub fn log_skipped(&self, key: &QuarantineKey) {
        tracing::debug!(device = %self.device, "[QUARANTINE] Skipping {}", key);
    }
}

/// Custom format for log level
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

/// Event formatter producing `timestamp | LEVEL | message`
///
/// Example output: `2025-12-02 00:50:44,809 | INFO | [STATUS] Connected device=10.0.0.5:502`
struct PipeDelimitedFormat;

impl<S, N> FormatEvent<S, N> for PipeDelimitedFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} | ", now.format("%Y-%m-%d %H:%M:%S,%3f"))?;
        write!(writer, "{} | ", format_level(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install a global subscriber according to `config`
///
/// `RUST_LOG` takes precedence over `config.level`. Returns the guard of the
/// non-blocking file writer when file output is enabled; dropping it flushes
/// and stops file logging.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::new(&config.level),
    };

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .event_format(PipeDelimitedFormat)
            .boxed()
    });

    let (file_layer, guard) = match &config.log_file {
        Some(log_file) => {
            let appender = build_file_appender(Path::new(log_file), config.max_log_files)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .event_format(PipeDelimitedFormat)
                .boxed();
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn build_file_appender(
    log_file: &Path,
    max_log_files: usize,
) -> Result<RollingFileAppender, Box<dyn std::error::Error + Send + Sync>> {
    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let file_name = log_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("Invalid log file path: {}", log_file.display()))?;

    std::fs::create_dir_all(&directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(max_log_files.max(1))
        .build(directory)?;
    Ok(appender)
}
