//! Training run configuration.
//!
//! A [`TrainingConfig`] is read from an optional JSON file; every field has a
//! default, so an empty object `{}` is a valid configuration. Command-line
//! flags override individual fields after loading.

use evoplat_network::{Activation, NetworkError, network::validate_topology};
use rand::SeedableRng as _;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{
    episode::EpisodeSettings,
    population::{ALPHA, EvolutionParams, MAX_SCORE, MIN_DEVIATION, MUTATION_RATE, Reproduction},
};

/// Network layout used by the platformer: a 13x13 tile window, one hidden
/// layer, one output per action.
pub const DEFAULT_TOPOLOGY: [usize; 3] = [169, 64, 4];

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("population size must be at least 1")]
    EmptyPopulation,
    #[display("worker count must be at least 1")]
    NoWorkers,
    #[display("invalid topology")]
    Topology { source: NetworkError },
    #[display("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[display("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub population_size: usize,
    pub topology: Vec<usize>,
    pub activation: Activation,
    /// Generations to run; `None` trains until cancelled.
    pub generations: Option<u32>,
    pub mutation_rate: f64,
    pub alpha: f64,
    pub min_deviation: f64,
    pub max_score: f64,
    /// Number of episodes evaluated concurrently.
    pub workers: usize,
    pub reproduction: Reproduction,
    /// Seed for selection and mutation; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Ignore the stored best agent and start from random networks.
    pub start_over: bool,
    pub episode: EpisodeSettings,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            topology: DEFAULT_TOPOLOGY.to_vec(),
            activation: Activation::default(),
            generations: None,
            mutation_rate: MUTATION_RATE,
            alpha: ALPHA,
            min_deviation: MIN_DEVIATION,
            max_score: MAX_SCORE,
            workers: 1,
            reproduction: Reproduction::default(),
            seed: None,
            start_over: false,
            episode: EpisodeSettings::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        validate_topology(&self.topology).map_err(|source| ConfigError::Topology { source })?;
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::OutOfRange {
                name: "mutation_rate",
                value: self.mutation_rate,
            });
        }
        for (name, value) in [
            ("alpha", self.alpha),
            ("min_deviation", self.min_deviation),
            ("max_score", self.max_score),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn evolution_params(&self) -> EvolutionParams {
        EvolutionParams {
            population_size: self.population_size,
            mutation_rate: self.mutation_rate,
            alpha: self.alpha,
            min_deviation: self.min_deviation,
            max_score: self.max_score,
            reproduction: self.reproduction,
        }
    }

    /// Random number generator for selection and mutation.
    #[must_use]
    pub fn rng(&self) -> Pcg64 {
        match self.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_rng(&mut rand::rng()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng as _;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.topology, vec![169, 64, 4]);
        assert_eq!(config.population_size, 50);
        assert_eq!(config.generations, None);
        assert_eq!(config.episode.dead_line_start, -300.0);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: TrainingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TrainingConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{
                "population_size": 8,
                "reproduction": "crossover",
                "activation": "tanh",
                "episode": { "level": "pits", "max_steps": 500 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 8);
        assert_eq!(config.reproduction, Reproduction::Crossover);
        assert_eq!(config.activation, Activation::Tanh);
        assert_eq!(config.episode.level, "pits");
        assert_eq!(config.episode.max_steps, Some(500));
        assert_eq!(config.episode.dead_line_speed, 5.0);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(serde_json::from_str::<TrainingConfig>(r#"{"populaton_size": 8}"#).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let with = |edit: fn(&mut TrainingConfig)| {
            let mut config = TrainingConfig::default();
            edit(&mut config);
            config.validate()
        };
        assert!(matches!(
            with(|c| c.population_size = 0),
            Err(ConfigError::EmptyPopulation)
        ));
        assert!(matches!(with(|c| c.workers = 0), Err(ConfigError::NoWorkers)));
        assert!(matches!(
            with(|c| c.topology = vec![169]),
            Err(ConfigError::Topology { .. })
        ));
        assert!(matches!(
            with(|c| c.topology = vec![169, 0, 4]),
            Err(ConfigError::Topology { .. })
        ));
        assert!(matches!(
            with(|c| c.mutation_rate = 1.5),
            Err(ConfigError::OutOfRange {
                name: "mutation_rate",
                ..
            })
        ));
        assert!(matches!(
            with(|c| c.max_score = 0.0),
            Err(ConfigError::NotPositive {
                name: "max_score",
                ..
            })
        ));
        assert!(matches!(
            with(|c| c.alpha = f64::NAN),
            Err(ConfigError::NotPositive { name: "alpha", .. })
        ));
    }

    #[test]
    fn test_evolution_params_follow_config() {
        let config = TrainingConfig {
            population_size: 7,
            mutation_rate: 0.1,
            reproduction: Reproduction::Crossover,
            ..TrainingConfig::default()
        };
        let params = config.evolution_params();
        assert_eq!(params.population_size, 7);
        assert_eq!(params.mutation_rate, 0.1);
        assert_eq!(params.reproduction, Reproduction::Crossover);
        assert_eq!(params.max_score, MAX_SCORE);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = TrainingConfig {
            seed: Some(42),
            ..TrainingConfig::default()
        };
        let a = config.rng().random::<u64>();
        let b = config.rng().random::<u64>();
        assert_eq!(a, b);
    }
}
