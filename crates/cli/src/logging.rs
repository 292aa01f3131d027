use std::path::Path;

use anyhow::{Context, Result};
use spfoundry_core::config::{LogFormat, LoggingConfig};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const NOISY_TARGETS: [&str; 5] = ["reqwest", "hyper", "hyper_util", "h2", "rustls"];

/// Filter directives for the configured level. HTTP stack internals stay at
/// `warn` unless debug logging is on.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let level = config.effective_level();
    if config.debug {
        return level.to_string();
    }

    let mut directives = vec![level.to_string()];
    directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Console logs go to stderr so stdout stays clean for answers and JSON.
/// A second subscriber install is ignored.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(filter_directives(config))
        .with_context(|| format!("invalid log level `{}`", config.effective_level()))?;

    let console = match config.format {
        LogFormat::Compact => {
            fmt::layer().with_writer(std::io::stderr).with_target(false).compact().boxed()
        }
        LogFormat::Pretty => {
            fmt::layer().with_writer(std::io::stderr).with_target(false).pretty().boxed()
        }
        LogFormat::Json => fmt::layer().with_writer(std::io::stderr).json().boxed(),
    };

    let file = config.file.as_deref().map(file_layer).transpose()?;

    if tracing_subscriber::registry().with(filter).with(console).with(file).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    if let Some(path) = &config.file {
        tracing::debug!(path = %path.display(), "file logging enabled");
    }
    Ok(())
}

fn file_layer<S>(path: &Path) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("log file path `{}` has no usable file name", path.display()))?;

    std::fs::create_dir_all(directory)
        .with_context(|| format!("could not create log directory `{}`", directory.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .with_context(|| format!("could not open log file `{}`", path.display()))?;
    Ok(fmt::layer().with_writer(appender).with_ansi(false).boxed())
}
