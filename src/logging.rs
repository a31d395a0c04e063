use anyhow::Context as _;

/// Installs the stderr subscriber. Stdout is reserved for rendered views.
///
/// `RUST_LOG` wins over `default_directive` when it is set.
pub fn init(default_directive: &str) -> anyhow::Result<()> {
    let filter = match std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(raw) if !raw.trim().is_empty() => tracing_subscriber::EnvFilter::try_new(raw)
            .with_context(|| "parse RUST_LOG".to_owned())?,
        _ => tracing_subscriber::EnvFilter::try_new(default_directive)
            .with_context(|| format!("parse default log directive: {default_directive}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

/// Directive used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}
