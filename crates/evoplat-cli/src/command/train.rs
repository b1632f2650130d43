use std::{num::NonZero, path::PathBuf, sync::Arc, thread};

use anyhow::{Context as _, ensure};
use chrono::Utc;
use evoplat_sim::{Level, SimFactory};
use evoplat_training::{
    config::TrainingConfig,
    episode::PlatformerRunner,
    evaluation::CancellationToken,
    population::Reproduction,
    record::AgentStore,
    trainer::{TrainError, Trainer},
};

use crate::{
    schema::{BestAgent, TrainingReport},
    signal,
    util::{self, Output},
};

use super::DEFAULT_AGENT_PATH;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Training configuration file (JSON); flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Agent file to resume from and to store the best agent in
    #[arg(long, short = 'a', default_value = DEFAULT_AGENT_PATH)]
    agent: PathBuf,
    /// Number of generations to run; 0 trains until interrupted
    #[arg(long, short = 'g')]
    generations: Option<u32>,
    /// Population size
    #[arg(long, short = 'p')]
    population: Option<usize>,
    /// Number of episodes evaluated in parallel
    #[arg(long, short = 'n')]
    workers: Option<usize>,
    /// Level to train on
    #[arg(long, short = 'l')]
    level: Option<Level>,
    /// How children are produced: mutation or crossover
    #[arg(long)]
    reproduction: Option<Reproduction>,
    /// Seed for selection and mutation
    #[arg(long)]
    seed: Option<u64>,
    /// Ignore the stored agent and start from random networks
    #[arg(long, short = 's')]
    start_over: bool,
    /// Output file for the training report (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

impl TrainArg {
    fn apply(&self, config: &mut TrainingConfig) {
        if let Some(generations) = self.generations {
            config.generations = (generations != 0).then_some(generations);
        }
        if let Some(population) = self.population {
            config.population_size = population;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(level) = self.level {
            config.episode.level = level.to_string();
        }
        if let Some(reproduction) = self.reproduction {
            config.reproduction = reproduction;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.start_over {
            config.start_over = true;
        }
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let mut config = util::read_config_file(arg.config.as_deref())?;
    arg.apply(&mut config);

    let available = thread::available_parallelism().map_or(1, NonZero::get);
    if config.workers > available {
        tracing::warn!(
            requested = config.workers,
            available,
            "more workers than CPUs; limiting"
        );
        config.workers = available;
    }

    let level = config
        .episode
        .level
        .parse::<Level>()
        .ok()
        .with_context(|| format!("Unknown level: {}", config.episode.level))?;
    let factory = SimFactory::default();
    ensure!(
        config.topology.first() == Some(&factory.input_width()),
        "Topology {:?} does not start with the {} sensor inputs",
        config.topology,
        factory.input_width()
    );

    let store = AgentStore::new(&arg.agent);
    if !config.start_over {
        ensure_stored_agent_fits(&store, factory.input_width())?;
    }

    let runner = Arc::new(PlatformerRunner::new(factory, config.episode.clone()));
    let mut rng = config.rng();
    let trainer = Trainer::new(config, runner, store)?;

    let cancel = CancellationToken::new();
    signal::cancel_on_interrupt(cancel.clone())?;

    tracing::info!(
        %level,
        population = trainer.config().population_size,
        workers = trainer.config().workers,
        agent = %arg.agent.display(),
        "training started"
    );
    let summary = match trainer.run(&mut rng, &cancel) {
        Ok(summary) => summary,
        Err(TrainError::Cancelled) => {
            tracing::info!(
                agent = %arg.agent.display(),
                "training stopped; the best agent so far is kept"
            );
            return Ok(());
        }
        Err(e) => Err(e).context("Training failed")?,
    };

    let report = TrainingReport {
        trained_at: Utc::now(),
        level: level.to_string(),
        first_generation: summary.first_generation,
        generations_run: summary.generations_run,
        agent_path: arg.agent.clone(),
        best: summary.best.as_ref().map(BestAgent::from),
        config: trainer.config().clone(),
    };
    Output::save_json(&report, arg.output.clone())?;

    eprintln!();
    eprintln!("Training completed");
    eprintln!("  Generations: {}", report.generations_run);
    eprintln!("  Agent: {}", report.agent_path.display());
    if let Some(best) = &report.best {
        eprintln!(
            "  Best: Fitness: {:.3} | Points: {:4.0} | Distance: {:4.0}",
            best.fitness, best.points, best.distance
        );
    }

    Ok(())
}

/// Fails if the stored agent, which training would resume from, cannot read
/// `input_width` sensor values.
fn ensure_stored_agent_fits(store: &AgentStore, input_width: usize) -> anyhow::Result<()> {
    if let Some(agent) = store.load() {
        let network = agent.network();
        ensure!(
            network.input_width() == input_width,
            "Stored agent {} has topology {:?}, which does not start with the {} sensor inputs; \
             use --start-over or another --agent",
            store.path().display(),
            network.shape(),
            input_width
        );
    }
    Ok(())
}
