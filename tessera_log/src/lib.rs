use std::path::Path;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Handle returned by [`init`] to change the log filter at runtime.
pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

fn filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber.
/// `dir` – when set, hourly rolling JSON files `tessera.log.*` in that directory, stdout otherwise.
/// `level` – default level; `RUST_LOG` directives take precedence.
pub fn init(dir: Option<&Path>, level: Level) -> Result<ReloadHandle> {
    let (filter_layer, handle) = reload::Layer::new(filter(level));
    let registry = tracing_subscriber::registry().with(filter_layer);
    let installed = match dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix("tessera.log")
                .build(dir)
                .with_context(|| format!("open log directory {}", dir.display()))?;
            let fmt_layer = fmt::layer()
                .with_writer(file_appender)
                .json()
                .with_current_span(false)
                .with_span_list(false);
            registry.with(fmt_layer).try_init()
        }
        None => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    installed.context("install tracing subscriber")?;
    Ok(handle)
}

/// Replace the active filter, e.g. `"debug"` or `"tessera_shard=trace,info"`.
pub fn set_level(handle: &ReloadHandle, directives: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directives).with_context(|| format!("invalid log filter {directives:?}"))?;
    handle.reload(filter).context("reload log filter")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_once_and_reload() {
        let handle = init(None, Level::INFO).unwrap();
        set_level(&handle, "warn").unwrap();
        assert!(!tracing::enabled!(Level::INFO));
        set_level(&handle, "debug").unwrap();
        assert!(tracing::enabled!(Level::DEBUG));
        assert!(set_level(&handle, "tessera=loud").is_err());
        // the global subscriber is already set
        assert!(init(None, Level::INFO).is_err());
    }
}
