use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = paywall_reader::cli::Cli::parse();
    paywall_reader::logging::init(paywall_reader::logging::default_directive(
        cli.global.verbose,
    ))
    .context("init logging")?;
    tracing::debug!(command = cli.command.name(), api_url = %cli.global.api_url, "parsed cli");

    let config = paywall_reader::config::ClientConfig::from_args(&cli.global).context("config")?;
    let app = paywall_reader::commands::App::connect(config)
        .await
        .context("connect")?;

    paywall_reader::commands::run(&app, cli.command).await
}
