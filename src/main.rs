use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use intersection_sim::simulation::{LaneId, Rect, SimConfig, SimWorld};

#[derive(Parser)]
#[command(name = "intersection_sim")]
#[command(about = "Headless four-way intersection traffic simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1800")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    delta: f32,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Width of the simulated area in pixels
    #[arg(long, default_value = "600")]
    width: f32,

    /// Height of the simulated area in pixels
    #[arg(long, default_value = "600")]
    height: f32,

    /// Run with the traffic light switched off
    #[arg(long)]
    no_signals: bool,

    /// Print a map of the intersection every simulated second
    #[arg(long)]
    map: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = SimConfig {
        seed: cli.seed,
        signals_enabled: !cli.no_signals,
        ..SimConfig::with_area(Rect::new(0.0, 0.0, cli.width, cli.height))
    };
    let world = SimWorld::new(config).context("Could not set up the simulation")?;

    run_headless(world, cli.ticks, cli.delta, cli.map)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(mut world: SimWorld, ticks: u32, delta: f32, show_map: bool) -> Result<()> {
    if !(delta > 0.0) || !delta.is_finite() {
        anyhow::bail!("Tick delta must be a positive number of seconds, got {}", delta);
    }

    info!("Running intersection simulation in headless mode...");
    info!("Ticks: {}, Delta: {:.4}s", ticks, delta);

    // Calculate how many ticks equal 1 second of simulation time
    let ticks_per_second = ((1.0 / delta).ceil() as u32).max(1);

    let mut tick = 0;
    while tick < ticks {
        let ticks_to_run = ticks_per_second.min(ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(delta);
        }

        for change in world.drain_phase_changes() {
            match change.decision {
                Some(decision) => info!(
                    "Signal {} -> {} for {:.1}s ({:?})",
                    change.from, change.to, decision.duration, decision.case
                ),
                None => info!("Signal {} -> {}", change.from, change.to),
            }
        }

        let queued: Vec<String> = LaneId::ALL
            .iter()
            .map(|lane| format!("{}={}", lane.name(), world.vehicles_in_lane(*lane).len()))
            .collect();
        info!(
            "t={:.1}s signal={} ({}) vehicles={} [{}]",
            world.time,
            world.signal_phase(),
            world.traffic_light().countdown_label(),
            world.vehicle_count(),
            queued.join(", ")
        );

        if show_map {
            world.draw_map();
        }
    }

    let stats = world.stats().clone();
    if stats.vehicles_spawned == 0 && world.config().spawn.enabled {
        warn!("No vehicles were spawned");
    }

    info!("=== SIMULATION COMPLETE ===");
    info!("Elapsed time: {:.2}s", stats.elapsed);
    info!("Total vehicles spawned: {}", stats.vehicles_spawned);
    info!("Total vehicles exited: {}", stats.vehicles_exited);
    info!("Spawns rejected: {}", stats.spawns_rejected);
    info!("Active vehicles: {}", world.vehicle_count());
    info!("Phase changes: {}", stats.phase_changes);

    if show_map {
        world.print_summary();
    }
    Ok(())
}
