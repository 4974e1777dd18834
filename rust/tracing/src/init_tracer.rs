use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt;
use tracing_subscriber::Registry;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFilterLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogFilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFilterLevel::Trace => f.write_str("trace"),
            LogFilterLevel::Debug => f.write_str("debug"),
            LogFilterLevel::Info => f.write_str("info"),
            LogFilterLevel::Warn => f.write_str("warn"),
            LogFilterLevel::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub crate_name: String,
    pub filter_level: LogFilterLevel,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid log filter '{0}', expected <target>=<level>")]
pub struct InvalidLogFilter(String);

impl FromStr for LogFilter {
    type Err = InvalidLogFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidLogFilter(s.to_string());
        let (crate_name, level) = s.trim().split_once('=').ok_or_else(invalid)?;
        let filter_level = match level.trim().to_ascii_lowercase().as_str() {
            "trace" => LogFilterLevel::Trace,
            "debug" => LogFilterLevel::Debug,
            "info" => LogFilterLevel::Info,
            "warn" => LogFilterLevel::Warn,
            "error" => LogFilterLevel::Error,
            _ => return Err(invalid()),
        };
        let crate_name = crate_name.trim();
        if crate_name.is_empty() {
            return Err(invalid());
        }
        Ok(LogFilter {
            crate_name: crate_name.replace('-', "_"),
            filter_level,
        })
    }
}

/// The filter directives used when `RUST_LOG` is not set.
fn global_filter_directives(custom_filters: &[LogFilter]) -> String {
    // These need to have underscores because the Rust compiler automatically
    // converts all hyphens in crate names to underscores.
    let default_crate_names = [
        "mapsync",
        "mapsync_cli",
        "mapsync_client",
        "mapsync_config",
        "mapsync_merge",
        "mapsync_types",
    ];

    let mut directives = vec!["error".to_string()];
    directives.extend(
        default_crate_names
            .iter()
            .map(|name| format!("{name}=info")),
    );
    directives.extend(
        custom_filters
            .iter()
            .map(|custom_filter| format!("{}={}", custom_filter.crate_name, custom_filter.filter_level)),
    );
    directives.join(",")
}

pub fn init_global_filter_layer(
    custom_filters: &[LogFilter],
) -> Box<dyn Layer<Registry> + Send + Sync> {
    let directives =
        std::env::var("RUST_LOG").unwrap_or_else(|_| global_filter_directives(custom_filters));
    EnvFilter::new(directives).boxed()
}

/// Human-readable logs on stderr, so stdout stays free for command output.
pub fn init_stdout_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .boxed()
}

pub fn init_tracing(
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync>>,
) -> Result<(), SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::registry().with(layers);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::debug!("Global tracing subscriber set");
    Ok(())
}

pub fn init_panic_tracing_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();

        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            Some(&**s)
        } else {
            payload.downcast_ref::<String>().map(|s| s.as_str())
        };

        tracing::error!(
            panic.payload = payload,
            panic.location = panic_info.location().map(|l| l.to_string()),
            "A panic occurred"
        );

        prev_hook(panic_info);
    }));
}

pub fn init_stdout_tracing(
    service_name: &str,
    custom_filters: &[LogFilter],
) -> Result<(), SetGlobalDefaultError> {
    let layers = vec![
        // The global filter applies to all subsequent layers
        init_global_filter_layer(custom_filters),
        init_stdout_layer(),
    ];
    init_tracing(layers)?;
    init_panic_tracing_hook();
    tracing::info!(service_name, "Logging initialized");
    Ok(())
}
