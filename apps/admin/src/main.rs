use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    navigation::{PAYMENT_FAIL_ROUTE, PAYMENT_PURCHASE_ROUTE, PAYMENT_SUCCESS_ROUTE},
    BackOutcome, BatchStatusController, HistoryNavigator, HttpAdminApi, MatchingApi,
    NavigationContext, Navigator,
};
use shared::domain::{BatchState, CheckoutContext};
use storage::{normalize_database_url, Storage, StorageAccessor};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    backend_url: String,
    /// Bearer token for admin endpoints.
    #[arg(long)]
    token: Option<String>,
    /// Seconds before a backend call is abandoned.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
    /// Where redirect memory is kept between runs.
    #[arg(long, default_value = "./data/admin_session.db")]
    state_db: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show whether batch matching is enabled.
    BatchStatus,
    /// Flip batch matching and show the confirmed value.
    ToggleBatch,
    /// Run one matching pass now.
    RunMatching,
    /// Leave `from` for the payment checkout, remembering where to return.
    Checkout {
        #[arg(long)]
        from: String,
        #[arg(long)]
        product: String,
        #[arg(long)]
        amount: u64,
    },
    /// Come back from the payment flow.
    Return {
        /// Page the payment flow landed on; defaults to the success or fail page.
        #[arg(long)]
        at: Option<String>,
        /// The payment was declined or cancelled.
        #[arg(long)]
        failed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();
    let timeout = Duration::from_secs(args.timeout);

    match args.command {
        Command::BatchStatus => {
            let api = backend(&args.backend_url, args.token, timeout)?;
            let controller = BatchStatusController::mount(api).await;
            report(&controller.state().await)?;
        }
        Command::ToggleBatch => {
            let api = backend(&args.backend_url, args.token, timeout)?;
            let controller = BatchStatusController::mount(api).await;
            if controller.state().await.status.is_none() {
                report(&controller.state().await)?;
                bail!("batch status is unknown; refusing to toggle");
            }
            report(&controller.toggle_status().await)?;
        }
        Command::RunMatching => {
            let api = backend(&args.backend_url, args.token, timeout)?;
            let body = api.run_matching().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Checkout {
            from,
            product,
            amount,
        } => {
            let storage = session(&args.state_db).await?;
            let mut ctx = NavigationContext::new(HistoryNavigator::new(&from), storage);
            let checkout = CheckoutContext {
                product_id: product,
                amount,
                order_id: None,
            };
            ctx.redirect_with(PAYMENT_PURCHASE_ROUTE, &checkout).await;
            println!("now at {}", ctx.navigator().current_location());
        }
        Command::Return { at, failed } => {
            let landing = at.unwrap_or_else(|| {
                let route = if failed {
                    PAYMENT_FAIL_ROUTE
                } else {
                    PAYMENT_SUCCESS_ROUTE
                };
                route.to_string()
            });
            let storage = session(&args.state_db).await?;
            let mut ctx = NavigationContext::new(HistoryNavigator::new(&landing), storage);
            if let Some(checkout) = ctx.take_payload::<CheckoutContext>().await {
                let verdict = if failed { "failed" } else { "completed" };
                println!(
                    "{verdict} checkout for {} ({} KRW)",
                    checkout.product_id, checkout.amount
                );
            }
            match ctx.back().await {
                BackOutcome::Remembered(url) => println!("returned to {url}"),
                BackOutcome::PlatformBack => println!(
                    "no remembered page; now at {}",
                    ctx.navigator().current_location()
                ),
            }
        }
    }

    Ok(())
}

fn backend(base_url: &str, token: Option<String>, timeout: Duration) -> Result<HttpAdminApi> {
    let api = HttpAdminApi::new(base_url, timeout)?;
    Ok(match token {
        Some(token) => api.with_bearer_token(token),
        None => api,
    })
}

async fn session(state_db: &str) -> Result<StorageAccessor> {
    let storage = Storage::new(&normalize_database_url(state_db)).await?;
    storage
        .health_check()
        .await
        .with_context(|| format!("session store at {state_db} is not usable"))?;
    Ok(StorageAccessor::new(Arc::new(storage)))
}

fn report(state: &BatchState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    if let Some(error) = &state.error {
        bail!("{error}");
    }
    Ok(())
}
