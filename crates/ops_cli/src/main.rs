use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ops_control::{Ack, DeviceCommand, DeviceLink, StationController};
use ops_core::{OpsError, OpsState, PortId, PortKey, StationId, TaskStatus};
use ops_world::scenario::TelemetryFeed;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ops_cli", about = "Charging station operations CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a fixed number of ticks, printing events as
    /// JSON lines.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Generate the world with this seed. Mutually exclusive with --state.
        #[arg(long, conflicts_with = "state_file")]
        seed: Option<u64>,
        /// Load initial state from a JSON file. Mutually exclusive with --seed.
        #[arg(long = "state", conflicts_with = "seed")]
        state_file: Option<String>,
        /// Content override as a JSON file; built-in content when omitted.
        #[arg(long)]
        content: Option<String>,
        #[arg(long, default_value_t = 100)]
        print_every: u64,
        /// Ports polled for telemetry per tick.
        #[arg(long, default_value_t = 4)]
        polls_per_tick: usize,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Loopback charge-point link: every command succeeds instantly.
struct LoopbackLink;

impl DeviceLink for LoopbackLink {
    fn send(
        &mut self,
        _station: &StationId,
        _port: &PortId,
        _command: DeviceCommand,
    ) -> Result<Ack, OpsError> {
        Ok(Ack)
    }
}

fn run(
    ticks: u64,
    seed: Option<u64>,
    state_file: Option<String>,
    content_path: Option<&str>,
    print_every: u64,
    polls_per_tick: usize,
) -> Result<()> {
    let content = match content_path {
        Some(path) => ops_world::load_content(path)?,
        None => ops_world::default_content(),
    };

    let mut state = if let Some(path) = state_file {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading state file: {path}"))?;
        serde_json::from_str::<OpsState>(&json)
            .with_context(|| format!("parsing state file: {path}"))?
    } else {
        let resolved_seed = seed.unwrap_or_else(rand::random);
        ops_world::initial_state(resolved_seed)
    };
    ops_world::validate_part_references(&content, &state.parts);

    let world_seed = state.meta.seed;
    let mut rng = ChaCha8Rng::seed_from_u64(world_seed);
    let run_id = ops_world::run_id(world_seed, &mut rng);
    println!("run {run_id}: ticks={ticks} stations={}", state.stations.len());
    println!("{}", "-".repeat(80));

    let mut poll_order: Vec<PortKey> = state
        .stations
        .values()
        .flat_map(|s| s.ports.keys().map(|p| PortKey::new(&s.id, p)))
        .collect();
    poll_order.sort();

    let mut feed = TelemetryFeed::new(world_seed);
    let mut controller = StationController::new(LoopbackLink);
    let mut cursor = 0usize;

    for _ in 0..ticks {
        for _ in 0..polls_per_tick.min(poll_order.len()) {
            let key = &poll_order[cursor % poll_order.len()];
            cursor += 1;
            let sample = feed.next_sample(key);
            match controller.intake_fault(&mut state, &content, &key.station, &key.port, &sample)
            {
                Ok((_, events)) => print_events(&events)?,
                Err(OpsError::NoAvailableMaintainer) => {
                    eprintln!("warning: {key}: fault diagnosed but roster is saturated");
                }
                Err(err) => eprintln!("warning: {key}: {err}"),
            }
        }

        let events = ops_core::tick(&mut state, &content);
        print_events(&events)?;

        if state.meta.tick % print_every == 0 {
            print_status(&state);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);
    Ok(())
}

fn print_events(events: &[ops_core::EventEnvelope]) -> Result<()> {
    for envelope in events {
        let line = serde_json::to_string(envelope).context("serializing event")?;
        println!("{line}");
    }
    Ok(())
}

fn print_status(state: &OpsState) {
    let queued: usize = state.queues.values().map(Vec::len).sum();
    let (completed, failed) = state.task_history.values().flatten().fold(
        (0usize, 0usize),
        |(done, failed), task| match task.status {
            TaskStatus::Completed => (done + 1, failed),
            TaskStatus::Failed => (done, failed + 1),
            _ => (done, failed),
        },
    );
    let reports: usize = state.diagnosis_history.values().map(std::collections::VecDeque::len).sum();

    println!(
        "[tick={tick:05}]  reports={reports:4}  queued={queued:3}  completed={completed:3}  failed={failed:3}",
        tick = state.meta.tick,
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            state_file,
            content,
            print_every,
            polls_per_tick,
        } => {
            run(
                ticks,
                seed,
                state_file,
                content.as_deref(),
                print_every,
                polls_per_tick,
            )?;
        }
    }
    Ok(())
}
