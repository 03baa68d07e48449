//! # Moonwatch — Alert Loop
//!
//! ## Flow
//! ```text
//! startup:
//!   warm up price baselines for every subscribed exchange
//! loop every POLL_INTERVAL_SECS:
//!   1. process_cycle (one fetch per exchange, shared events)
//!   2. render each subscriber's events (Price Updates / RSI Updates)
//!   3. hand messages to delivery (log sink)
//! ```
//!
//! ## Environment Variables
//!
//! See [`moonwatch::config`] for the full table. `RUST_LOG` overrides the
//! default `moonwatch=debug,reqwest=warn` filter.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use moonwatch::config::{Config, Subscriber};
use moonwatch::engine::CycleOutcome;
use moonwatch::{
    AlertFormatter, ExchangeRegistry, HttpTransport, Orchestrator, PlainTextFormatter,
    RetryingClient, SymbolStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("moonwatch=debug".parse()?)
            .add_directive("reqwest=warn".parse()?))
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════╗
  ║   MOONWATCH — Price & RSI Alerts          ║
  ║   mooning · free-fall · overbought/sold   ║
  ╚═══════════════════════════════════════════╝"#);

    let config = Config::from_env().context("Failed to load config")?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("moonwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let transport = Arc::new(HttpTransport::new(http, config.http_timeout));
    let client = RetryingClient::new(transport, config.retry);

    let registry = ExchangeRegistry::with_defaults(client);
    let orchestrator = Orchestrator::new(registry, Arc::new(SymbolStore::new()), config.alerts);
    let requests = config.requests();

    info!(
        subscribers = config.subscribers.len(),
        mooning     = config.alerts.price.mooning,
        free_fall   = config.alerts.price.free_fall,
        rsi         = config.alerts.rsi.enabled,
        timeframe   = %config.alerts.rsi.timeframe,
        interval    = ?config.poll_interval,
        "Moonwatch started"
    );

    let warmed = orchestrator
        .warm_up(requests.values().flatten().map(String::as_str))
        .await;
    info!(symbols = warmed, "🔥 Baselines warmed up");

    // ── Poll Loop ─────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutdown requested");
                return Ok(());
            }
        }

        let outcome = orchestrator.process_cycle(&requests).await;
        deliver(&config.subscribers, &outcome);

        info!(
            interval = ?config.poll_interval,
            "💤 Sleeping until next cycle..."
        );
    }
}

/// Render every subscriber's events and emit them on the log sink.
fn deliver(subscribers: &[Subscriber], outcome: &CycleOutcome) {
    let formatter = PlainTextFormatter;

    for subscriber in subscribers {
        let events = outcome.events_for(&subscriber.id);
        for message in formatter.render(&subscriber.id, events) {
            info!(
                cycle_id   = %outcome.cycle_id,
                subscriber = %subscriber.id,
                channel    = subscriber.channel.as_deref().unwrap_or("-"),
                title      = %message.title,
                "📨 {}",
                message.body
            );
        }
    }
}
