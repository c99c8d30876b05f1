//! rota-bot: weekly cleaning-duty rotation for a Slack channel.
//!
//! Runs the rotation on a weekly timer and serves:
//!
//! - `GET /`: warm-up, also triggers a cycle
//! - `GET /health`: scheduler phase and rotation counters
//! - `POST /slack/events`: Slack Events API ("list" command, member joins)
//!
//! Requires SLACK_BOT_TOKEN and ROTA_CHANNEL.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rota_sdk::SlackClient;
use tracing_subscriber::EnvFilter;

use rota_bot::config::{Args, RosterConfig};
use rota_bot::scheduler::Scheduler;
use rota_bot::store::StateStore;
use rota_bot::timer;
use rota_bot::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs in production (ROTA_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("ROTA_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rota_bot=info,rota_sdk=info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();

    let roster = RosterConfig::load(&args.roster)
        .with_context(|| format!("loading roster from {}", args.roster.display()))?;
    let client = SlackClient::new(args.slack_config()).context("building Slack client")?;

    let scheduler = Scheduler::open(
        Arc::new(client),
        roster.groups,
        roster.locations,
        StateStore::new(&args.state_file),
        args.channel.clone(),
    )
    .with_context(|| format!("loading rotation state from {}", args.state_file.display()))?
    .with_thanks(roster.thanks)
    .with_utc_offset(args.schedule().utc_offset);
    let scheduler = Arc::new(scheduler);

    if args.once {
        tracing::info!(channel = %args.channel, "Running a single rotation cycle");
        let outcome = scheduler.run_cycle().await.context("rotation cycle failed")?;
        tracing::info!(?outcome, "Done");
        return Ok(());
    }

    if args.slack_signing_secret.is_none() {
        tracing::warn!("SLACK_SIGNING_SECRET not set, inbound Slack events are not verified");
    }

    let schedule = args.schedule();
    tracing::info!(channel = %args.channel, %schedule, "Starting weekly rotation");
    tokio::spawn(timer::run(schedule, scheduler.clone()));

    let app = web::router(Arc::new(AppState {
        scheduler,
        signing_secret: args.slack_signing_secret.clone(),
    }));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
