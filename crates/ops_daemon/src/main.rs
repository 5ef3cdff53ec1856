//! Station operations daemon.
//!
//! Drives the simulated charge-point fleet on a wall-clock tick loop:
//! telemetry is polled through the fault intake gate, handling queues
//! advance on virtual time, and every event batch is broadcast to the
//! notification sink.

mod sink;
mod state;
mod tick_loop;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use state::OpsDaemonState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ops_daemon", about = "Charging station operations daemon")]
struct Args {
    /// World seed; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Content override as a JSON file; built-in content when omitted.
    #[arg(long)]
    content: Option<String>,
    /// Tick rate. Zero means run as fast as possible.
    #[arg(long, default_value_t = 1.0)]
    ticks_per_sec: f64,
    /// Stop after this many ticks; run forever when omitted.
    #[arg(long)]
    max_ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let content = match &args.content {
        Some(path) => ops_world::load_content(path)?,
        None => ops_world::default_content(),
    };
    let ops_state = ops_world::initial_state(seed);
    ops_world::validate_part_references(&content, &ops_state.parts);
    tracing::info!(
        seed,
        stations = ops_state.stations.len(),
        maintainers = ops_state.maintainers.len(),
        "daemon starting"
    );

    let shared = Arc::new(Mutex::new(OpsDaemonState::new(content, ops_state, seed)));
    let (event_tx, sink_rx) = tokio::sync::broadcast::channel(4096);

    let sink_task = tokio::spawn(sink::run_sink(sink_rx, sink::LogSink));

    tick_loop::run_tick_loop(shared, event_tx, args.ticks_per_sec, args.max_ticks).await;
    tracing::info!("tick loop finished");

    // The loop dropped the last sender, so the sink drains and exits.
    sink_task.await?;
    Ok(())
}
