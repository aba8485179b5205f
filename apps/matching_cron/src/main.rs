use anyhow::{bail, Result};
use clap::Parser;
use client_core::{DailySchedule, HttpAdminApi, MatchingTrigger, TriggerOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::{load_settings, DEFAULT_SETTINGS_FILE};

/// Calls the backend matching endpoint once a day.
#[derive(Parser, Debug)]
struct Cli {
    /// Settings file name, without extension.
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: String,
    #[arg(long)]
    backend_url: Option<String>,
    /// Local time of day to run, `HH:MM`.
    #[arg(long)]
    at: Option<String>,
    /// Seconds before a matching call is abandoned.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
    /// Run a single matching pass and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config)?;
    if let Some(url) = cli.backend_url {
        settings.backend_url = url;
    }
    if let Some(at) = cli.at {
        settings.run_at = at;
    }
    if let Some(timeout) = cli.timeout {
        settings.request_timeout_seconds = timeout;
    }

    let schedule = DailySchedule::parse(&settings.run_at)?;
    let mut api = HttpAdminApi::new(settings.backend_url.clone(), settings.request_timeout())?;
    if let Some(token) = settings.admin_token {
        api = api.with_bearer_token(token);
    }
    let trigger = MatchingTrigger::new(api, schedule);

    if cli.once {
        return match trigger.fire_once().await {
            TriggerOutcome::Completed(body) => {
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }
            TriggerOutcome::Failed(message) => bail!("matching run failed: {message}"),
        };
    }

    info!(backend = %settings.backend_url, at = %schedule, "matching trigger started");
    trigger.run(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
}
