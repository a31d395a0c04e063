use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::cli::GlobalArgs;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UNLOCK_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the collaborator API, without a trailing slash.
    pub api_url: String,
    /// Where the bearer token is persisted between runs. `None` keeps the
    /// session in memory only.
    pub token_file: Option<PathBuf>,
    pub timeout: Duration,
    /// Pause between a confirmed payment and the access re-check.
    pub unlock_delay: Duration,
    /// Show the simulated-SMS hint returned at payment initiation.
    pub show_otp_hint: bool,
}

impl ClientConfig {
    pub fn from_args(args: &GlobalArgs) -> anyhow::Result<Self> {
        let api_url = normalize_api_url(&args.api_url)?;

        if args.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be > 0");
        }

        let token_file = if args.ephemeral {
            None
        } else {
            Some(match &args.token_file {
                Some(path) => path.clone(),
                None => default_token_file(),
            })
        };

        Ok(Self {
            api_url,
            token_file,
            timeout: Duration::from_secs(args.timeout_secs),
            unlock_delay: Duration::from_millis(args.unlock_delay_ms),
            show_otp_hint: args.show_otp_hint,
        })
    }

    /// Settings for talking to a known base URL with in-memory tokens.
    pub fn for_base_url(api_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            api_url: normalize_api_url(api_url)?,
            token_file: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            unlock_delay: Duration::from_millis(DEFAULT_UNLOCK_DELAY_MS),
            show_otp_hint: false,
        })
    }
}

pub fn normalize_api_url(raw: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(raw.trim()).with_context(|| format!("parse api url: {raw}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("api url must be http/https (got {other}://)"),
    }
    if parsed.host_str().is_none() {
        anyhow::bail!("api url has no host: {raw}");
    }
    Ok(parsed.as_str().trim_end_matches('/').to_owned())
}

fn default_token_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".config")
            .join("paywall-reader")
            .join("token"),
        None => PathBuf::from(".paywall-reader-token"),
    }
}
