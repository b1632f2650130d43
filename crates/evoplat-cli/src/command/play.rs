use std::path::PathBuf;

use anyhow::{Context as _, ensure};
use evoplat_sim::{Level, SENSOR_RADIUS, SimEnvironment, SimFactory, sensors};
use evoplat_training::{
    Agent,
    config::DEFAULT_TOPOLOGY,
    episode::{EpisodeSettings, PlatformerRunner},
    evaluation::{CancellationToken, EpisodeError},
    record::AgentStore,
};

use crate::signal;

use super::DEFAULT_AGENT_PATH;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PlayArg {
    /// Agent file to play
    #[arg(long, short = 'a', default_value = DEFAULT_AGENT_PATH)]
    agent: PathBuf,
    /// Level to play
    #[arg(long, short = 'l', default_value = "plains")]
    level: Level,
    /// Print the agent's sensor grid every step
    #[arg(long, short = 's')]
    show: bool,
    /// Stop after this many steps
    #[arg(long)]
    max_steps: Option<u64>,
}

pub(crate) fn run(arg: &PlayArg) -> anyhow::Result<()> {
    let mut agent = load_player(&AgentStore::new(&arg.agent))?;
    agent.reset();

    let factory = SimFactory::new(SENSOR_RADIUS);
    ensure!(
        agent.network().input_width() == factory.input_width(),
        "Agent expects {} inputs but the simulator provides {}",
        agent.network().input_width(),
        factory.input_width()
    );

    // No dead line when replaying.
    let settings = EpisodeSettings {
        level: arg.level.to_string(),
        dead_line_start: f64::NEG_INFINITY,
        dead_line_speed: 0.0,
        max_steps: arg.max_steps,
    };
    let runner = PlatformerRunner::new(factory, settings);
    let mut env = SimEnvironment::new(arg.level.course(), SENSOR_RADIUS);

    let cancel = CancellationToken::new();
    signal::cancel_on_interrupt(cancel.clone())?;

    let result = runner.play_observed(&mut env, &mut agent, &cancel, |observation| {
        if arg.show {
            eprint!("{}", sensors::render_grid(&observation.sensors, SENSOR_RADIUS));
        }
    });
    let points = match result {
        Ok(points) => points,
        Err(EpisodeError::Cancelled) => {
            eprintln!();
            eprintln!("Exit");
            return Ok(());
        }
        Err(e) => Err(e).context("Episode failed")?,
    };
    agent.set_points(points);
    agent.compute_score();

    let outcome = if env.is_finished() {
        "finished"
    } else if env.is_dead() {
        "died"
    } else {
        "stopped"
    };
    println!("Agent Report ({}, {outcome})", arg.level);
    println!(
        "Fitness: {:.3} | Points: {:6.0} | Distance: {:4.0}",
        agent.fitness(),
        agent.points(),
        agent.max_progress()
    );
    println!("{}", "-".repeat(51));

    Ok(())
}

/// Loads the stored agent, or a random one if nothing is stored.
fn load_player(store: &AgentStore) -> anyhow::Result<Agent> {
    if let Some(agent) = store.load() {
        return Ok(agent);
    }
    tracing::warn!(
        path = %store.path().display(),
        "there is no player stored; playing a random one"
    );
    Ok(Agent::new(&DEFAULT_TOPOLOGY, &mut rand::rng())?)
}
