//! The generational training loop.
//!
//! [`Trainer`] ties the pieces together: it seeds the first generation from
//! the stored best agent (unless told to start over), evaluates each
//! generation on the [`EvaluationPool`], breeds the next one with
//! [`population::repopulate`] and writes the best agent back to the
//! [`AgentStore`] whenever it improves.
//!
//! # Generation Numbering
//!
//! Generation numbers continue the lineage of the stored agent: a run resumed
//! from a fifth-generation agent starts at generation 6, and a configured
//! budget of `n` generations runs generations `6..6 + n`. Without a budget the
//! loop runs until the [`CancellationToken`] fires.

use std::{io, sync::Arc};

use evoplat_network::NetworkError;
use rand::Rng;

use crate::{
    agent::Agent,
    config::{ConfigError, TrainingConfig},
    evaluation::{CancellationToken, EpisodeRunner, EvaluationError, EvaluationPool, Evaluated},
    population::{self, GenerationReport},
    record::AgentStore,
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TrainError {
    #[display("invalid training configuration")]
    Config { source: ConfigError },
    #[display("failed to build networks")]
    Network { source: NetworkError },
    #[display("evaluation failed")]
    Evaluation { source: EvaluationError },
    #[display("failed to persist the best agent")]
    Persist { source: io::Error },
    #[display("training cancelled")]
    Cancelled,
}

impl From<ConfigError> for TrainError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<NetworkError> for TrainError {
    fn from(source: NetworkError) -> Self {
        Self::Network { source }
    }
}

impl From<EvaluationError> for TrainError {
    fn from(source: EvaluationError) -> Self {
        match source {
            EvaluationError::Cancelled => Self::Cancelled,
            source => Self::Evaluation { source },
        }
    }
}

/// Outcome of a completed training run.
#[derive(Debug)]
pub struct TrainingSummary {
    /// First generation number of this run.
    pub first_generation: u32,
    pub generations_run: u32,
    /// Best agent seen, including the one the run resumed from.
    pub best: Option<Agent>,
    /// Report of the last generation evaluated.
    pub last_report: Option<GenerationReport>,
}

pub struct Trainer {
    config: TrainingConfig,
    runner: Arc<dyn EpisodeRunner>,
    store: AgentStore,
    pool: EvaluationPool,
}

impl Trainer {
    pub fn new(
        config: TrainingConfig,
        runner: Arc<dyn EpisodeRunner>,
        store: AgentStore,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        let pool = EvaluationPool::new(config.workers);
        Ok(Self {
            config,
            runner,
            store,
            pool,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    /// Runs the configured number of generations.
    ///
    /// Returns [`TrainError::Cancelled`] as soon as `cancel` fires. The stored
    /// agent is only ever replaced atomically, so it stays valid.
    pub fn run<R>(
        &self,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<TrainingSummary, TrainError>
    where
        R: Rng + ?Sized,
    {
        let params = self.config.evolution_params();
        let prior_best = self.load_prior_best();
        let mut agents = population::initialize(
            prior_best.as_ref(),
            &self.config.topology,
            self.config.activation,
            &params,
            rng,
        )?;
        let mut best_ever = prior_best;

        let first_generation = agents.first().map_or(1, Agent::generation);
        let end = self
            .config
            .generations
            .map(|count| first_generation.saturating_add(count));
        let mut generation = first_generation;
        let mut last_report = None;

        while end.is_none_or(|end| generation < end) {
            if cancel.is_cancelled() {
                return Err(TrainError::Cancelled);
            }
            tracing::info!(generation, population = agents.len(), "evaluating generation");

            let evaluated = self.pool.evaluate(agents, &self.runner, cancel)?;
            let failed = evaluated.iter().filter(|e| e.is_failed()).count();
            if failed > 0 {
                tracing::warn!(generation, failed, "some evaluations failed");
            }

            let repopulation = population::repopulate(
                evaluated.into_iter().map(Evaluated::into_agent).collect(),
                best_ever,
                &params,
                rng,
            )?;
            if repopulation.improved
                && let Some(best) = &repopulation.best_ever
            {
                self.store
                    .save(best)
                    .map_err(|source| TrainError::Persist { source })?;
                tracing::info!(
                    score = best.score(),
                    path = %self.store.path().display(),
                    "best agent replaced"
                );
            }
            if let Some(report) = &repopulation.report {
                tracing::info!(generation, "{report}");
            }

            agents = repopulation.next;
            best_ever = repopulation.best_ever;
            last_report = repopulation.report;
            generation += 1;
        }

        Ok(TrainingSummary {
            first_generation,
            generations_run: generation - first_generation,
            best: best_ever,
            last_report,
        })
    }

    fn load_prior_best(&self) -> Option<Agent> {
        if self.config.start_over {
            tracing::info!("starting over from random networks");
            return None;
        }
        let best = self.store.load()?;
        if best.network().shape() != self.config.topology.as_slice() {
            tracing::warn!(
                stored = ?best.network().shape(),
                configured = ?self.config.topology,
                "stored agent topology differs from the configuration; using the stored one"
            );
        }
        tracing::info!(
            generation = best.generation(),
            score = best.score(),
            path = %self.store.path().display(),
            "resuming from stored agent"
        );
        Some(best)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;
    use crate::{episode::EnvironmentError, evaluation::EpisodeError};

    /// Moves the agent as far as its network's first output says.
    struct Reach;

    impl EpisodeRunner for Reach {
        fn run_episode(
            &self,
            agent: &mut Agent,
            _cancel: &CancellationToken,
        ) -> Result<f64, EpisodeError> {
            let output = agent.network().predict_one(&[1.0, 0.5, -0.5])?;
            agent.update_position(output[0] * 100.0, 0.0);
            Ok(output.sum() * 100.0)
        }
    }

    struct Broken;

    impl EpisodeRunner for Broken {
        fn run_episode(
            &self,
            _agent: &mut Agent,
            _cancel: &CancellationToken,
        ) -> Result<f64, EpisodeError> {
            Err(EnvironmentError::new("emulator crashed").into())
        }
    }

    fn config(generations: u32) -> TrainingConfig {
        TrainingConfig {
            population_size: 6,
            topology: vec![3, 4, 2],
            generations: Some(generations),
            workers: 2,
            ..TrainingConfig::default()
        }
    }

    fn trainer(
        config: TrainingConfig,
        runner: Arc<dyn EpisodeRunner>,
        dir: &tempfile::TempDir,
    ) -> Trainer {
        let store = AgentStore::new(dir.path().join("best.agent"));
        Trainer::new(config, runner, store).unwrap()
    }

    #[test]
    fn test_runs_budget_and_persists_best() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(config(3), Arc::new(Reach), &dir);
        let summary = trainer
            .run(&mut Pcg64::seed_from_u64(1), &CancellationToken::new())
            .unwrap();

        assert_eq!(summary.first_generation, 1);
        assert_eq!(summary.generations_run, 3);
        let best = summary.best.unwrap();
        let stored = trainer.store().load().unwrap();
        assert_eq!(stored.score(), best.score());
        assert_eq!(stored.network(), best.network());
        assert!(summary.last_report.is_some());
    }

    #[test]
    fn test_resume_continues_lineage() {
        let dir = tempfile::tempdir().unwrap();
        let first = trainer(config(2), Arc::new(Reach), &dir)
            .run(&mut Pcg64::seed_from_u64(2), &CancellationToken::new())
            .unwrap();
        let stored = trainer(config(0), Arc::new(Reach), &dir).store().load().unwrap();

        let second = trainer(config(2), Arc::new(Reach), &dir)
            .run(&mut Pcg64::seed_from_u64(3), &CancellationToken::new())
            .unwrap();
        assert_eq!(second.first_generation, stored.generation() + 1);
        assert_eq!(second.generations_run, 2);
        // The resumed best only ever improves.
        assert!(second.best.unwrap().score() >= first.best.unwrap().score());
    }

    #[test]
    fn test_start_over_ignores_stored_agent() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentStore::new(dir.path().join("best.agent"));
        let mut foreign = Agent::new(&[5, 2], &mut Pcg64::seed_from_u64(4)).unwrap();
        foreign.update_position(1.0e6, 0.0);
        foreign.compute_score();
        store.save(&foreign).unwrap();

        let trainer = trainer(
            TrainingConfig {
                start_over: true,
                ..config(1)
            },
            Arc::new(Reach),
            &dir,
        );
        let summary = trainer
            .run(&mut Pcg64::seed_from_u64(5), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.first_generation, 1);
        assert_eq!(summary.best.unwrap().network().shape(), &[3, 4, 2]);
    }

    #[test]
    fn test_zero_generations_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(config(0), Arc::new(Reach), &dir);
        let summary = trainer
            .run(&mut Pcg64::seed_from_u64(6), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.generations_run, 0);
        assert!(summary.best.is_none());
        assert!(trainer.store().load().is_none());
    }

    #[test]
    fn test_cancelled_run_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(config(5), Arc::new(Reach), &dir);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            trainer.run(&mut Pcg64::seed_from_u64(7), &cancel),
            Err(TrainError::Cancelled)
        ));
        assert!(!trainer.store().path().exists());
    }

    #[test]
    fn test_failed_evaluations_get_baseline_score() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(config(2), Arc::new(Broken), &dir);
        let summary = trainer
            .run(&mut Pcg64::seed_from_u64(8), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.generations_run, 2);
        assert_eq!(summary.best.unwrap().score(), 1.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Trainer::new(
            TrainingConfig {
                population_size: 0,
                ..TrainingConfig::default()
            },
            Arc::new(Reach),
            AgentStore::new(dir.path().join("best.agent")),
        );
        assert!(matches!(result, Err(TrainError::Config { .. })));
    }
}
