//! Generational population management.
//!
//! This module turns one evaluated generation into the next one. It owns no
//! state: the best agent seen so far is passed into [`repopulate`] and handed
//! back in the returned [`Repopulation`], so several training runs can share
//! a process and tests can drive the algorithm step by step.
//!
//! # Algorithm Overview
//!
//! 1. **Rank** - Sort the generation by score, best first
//! 2. **Normalize** - `fitness = score / max_score` (not capped at 1)
//! 3. **Elitism** - Replace the best-ever agent when the generation's top agent beats it
//! 4. **Roulette Selection** - Draw `population_size` parents with replacement,
//!    with probability proportional to fitness
//! 5. **Reproduction** - Each draw yields an [`Agent::offspring`] (or a
//!    crossover child when [`Reproduction::Crossover`] is selected)
//! 6. **Temperature-Scaled Mutation** - Each child mutates with deviation
//!    `max((1 - fitness) * alpha, min_deviation)`
//!
//! # Temperature
//!
//! Mutation strength shrinks as fitness grows. A child descended from an agent
//! close to the maximum score is perturbed gently, while weak lineages explore
//! with larger steps. The floor keeps converged populations from freezing.

use std::fmt;

use evoplat_network::{Activation, Network, NetworkError};
use evoplat_stats::descriptive::DescriptiveStats;
use rand::{
    Rng,
    distr::{Distribution as _, weighted::WeightedIndex},
};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;

/// Default per-weight mutation probability.
pub const MUTATION_RATE: f64 = 0.05;
/// Default temperature multiplier.
pub const ALPHA: f64 = 0.2;
/// Default lower bound on mutation deviation.
pub const MIN_DEVIATION: f64 = 0.01;
/// Default score treated as a fitness of `1.0`.
pub const MAX_SCORE: f64 = 6000.0;

/// How children are produced from selected parents.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Reproduction {
    /// One parent per child; the child is a mutated copy.
    #[default]
    Mutation,
    /// Two parents per child combined by column crossover, then mutated.
    Crossover,
}

/// Parameters controlling one generational update.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionParams {
    /// Number of children produced per generation.
    pub population_size: usize,
    /// Per-weight mutation probability.
    pub mutation_rate: f64,
    /// Temperature multiplier for the mutation deviation.
    pub alpha: f64,
    /// Lower bound for the mutation deviation.
    pub min_deviation: f64,
    /// Score that maps to a fitness of `1.0`.
    pub max_score: f64,
    pub reproduction: Reproduction,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            mutation_rate: MUTATION_RATE,
            alpha: ALPHA,
            min_deviation: MIN_DEVIATION,
            max_score: MAX_SCORE,
            reproduction: Reproduction::default(),
        }
    }
}

impl EvolutionParams {
    /// Mutation deviation for a lineage with the given fitness.
    #[must_use]
    pub fn deviation_for(&self, fitness: f64) -> f64 {
        temperature_deviation(fitness, self.alpha, self.min_deviation)
    }
}

/// Returns `max((1 - fitness) * alpha, floor)`.
///
/// # Examples
///
/// ```
/// use evoplat_training::population::temperature_deviation;
///
/// assert!((temperature_deviation(0.5, 0.2, 0.01) - 0.1).abs() < 1e-12);
/// assert_eq!(temperature_deviation(1.2, 0.2, 0.01), 0.01);
/// ```
#[must_use]
pub fn temperature_deviation(fitness: f64, alpha: f64, floor: f64) -> f64 {
    ((1.0 - fitness) * alpha).max(floor)
}

/// Creates the first generation of a run.
///
/// With a prior best agent, every member is a mutated [`Agent::offspring`] of
/// it; otherwise every member is a fresh random agent.
pub fn initialize<R>(
    prior_best: Option<&Agent>,
    topology: &[usize],
    activation: Activation,
    params: &EvolutionParams,
    rng: &mut R,
) -> Result<Vec<Agent>, NetworkError>
where
    R: Rng + ?Sized,
{
    match prior_best {
        Some(best) => {
            let deviation = params.deviation_for(best.fitness());
            Ok((0..params.population_size)
                .map(|_| {
                    let mut agent = best.offspring();
                    agent.mutate(params.mutation_rate, deviation, rng);
                    agent
                })
                .collect())
        }
        None => (0..params.population_size)
            .map(|_| Agent::with_activation(topology, activation, rng))
            .collect(),
    }
}

/// Result of one generational update.
#[derive(Debug)]
pub struct Repopulation {
    /// Children forming the next generation.
    pub next: Vec<Agent>,
    /// Best agent seen so far, including the generation just ranked.
    pub best_ever: Option<Agent>,
    /// `true` if `best_ever` was replaced by this generation's top agent.
    pub improved: bool,
    /// Summary of the generation just ranked; `None` for an empty generation.
    pub report: Option<GenerationReport>,
}

/// Summary of a ranked generation.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Lineage depth of the generation's top agent.
    pub generation: u32,
    pub best_fitness: f64,
    pub best_points: f64,
    pub best_progress: f64,
    pub best_score: f64,
    pub fitness_stats: Option<DescriptiveStats>,
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fitness: {:.3} | Points: {:4.0} | Distance: {:4.0}",
            self.best_fitness, self.best_points, self.best_progress
        )?;
        if let Some(stats) = &self.fitness_stats {
            write!(f, " | Mean fitness: {:.3}", stats.mean)?;
        }
        Ok(())
    }
}

/// Ranks an evaluated generation and breeds the next one.
///
/// Every agent in `evaluated` must already have its score computed.
pub fn repopulate<R>(
    evaluated: Vec<Agent>,
    best_ever: Option<Agent>,
    params: &EvolutionParams,
    rng: &mut R,
) -> Result<Repopulation, NetworkError>
where
    R: Rng + ?Sized,
{
    let mut agents = evaluated;
    // Non-finite scores rank below every finite one.
    agents.sort_by(|a, b| {
        let (a, b) = (a.score(), b.score());
        b.is_finite()
            .cmp(&a.is_finite())
            .then_with(|| b.total_cmp(&a))
    });
    for agent in &mut agents {
        agent.set_fitness(agent.score() / params.max_score);
    }

    let Some(current_best) = agents.first() else {
        return Ok(Repopulation {
            next: Vec::new(),
            best_ever,
            improved: false,
            report: None,
        });
    };

    let improved = current_best.score().is_finite()
        && best_ever
            .as_ref()
            .is_none_or(|best| !best.score().is_finite() || current_best > best);
    let report = GenerationReport {
        generation: current_best.generation(),
        best_fitness: current_best.fitness(),
        best_points: current_best.points(),
        best_progress: current_best.max_progress(),
        best_score: current_best.score(),
        fitness_stats: DescriptiveStats::new(agents.iter().map(Agent::fitness)),
    };
    let best_ever = if improved {
        Some(current_best.clone())
    } else {
        best_ever
    };

    let fitness = agents.iter().map(Agent::fitness).collect::<Vec<_>>();
    let roulette = Roulette::new(&selection_probabilities(&fitness));

    let mut next = Vec::with_capacity(params.population_size);
    for _ in 0..params.population_size {
        let parent = &agents[roulette.spin(rng)];
        let mut child = parent.offspring();
        if params.reproduction == Reproduction::Crossover {
            let other = &agents[roulette.spin(rng)];
            child.network = Network::crossover(parent.network(), other.network(), rng)?;
        }
        let deviation = params.deviation_for(child.fitness());
        child.mutate(params.mutation_rate, deviation, rng);
        next.push(child);
    }

    Ok(Repopulation {
        next,
        best_ever,
        improved,
        report: Some(report),
    })
}

/// Selection probability of each agent, proportional to fitness.
///
/// Non-positive and non-finite fitness values get no weight. When no agent
/// has positive weight, every agent is equally likely.
///
/// # Examples
///
/// ```
/// use evoplat_training::population::selection_probabilities;
///
/// assert_eq!(selection_probabilities(&[3.0, 1.0]), vec![0.75, 0.25]);
/// assert_eq!(selection_probabilities(&[0.0, 0.0]), vec![0.5, 0.5]);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn selection_probabilities(fitness: &[f64]) -> Vec<f64> {
    let weights = fitness
        .iter()
        .map(|&f| if f.is_finite() && f > 0.0 { f } else { 0.0 })
        .collect::<Vec<_>>();
    let total = weights.iter().sum::<f64>();
    if total > 0.0 && total.is_finite() {
        weights.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / fitness.len() as f64; fitness.len()]
    }
}

/// Fitness-proportionate index sampler.
struct Roulette {
    sampler: Option<WeightedIndex<f64>>,
    len: usize,
}

impl Roulette {
    fn new(probabilities: &[f64]) -> Self {
        Self {
            sampler: WeightedIndex::new(probabilities).ok(),
            len: probabilities.len(),
        }
    }

    fn spin<R>(&self, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        match &self.sampler {
            Some(sampler) => sampler.sample(rng),
            None => rng.random_range(0..self.len),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    const TOPOLOGY: [usize; 3] = [4, 3, 2];

    fn rng() -> Pcg64 {
        Pcg64::seed_from_u64(0xfeed)
    }

    fn scored(points: f64, progress: f64, rng: &mut Pcg64) -> Agent {
        let mut agent = Agent::new(&TOPOLOGY, rng).unwrap();
        agent.set_points(points);
        agent.update_position(progress, 0.0);
        agent.compute_score();
        agent
    }

    fn params(population_size: usize) -> EvolutionParams {
        EvolutionParams {
            population_size,
            max_score: 100.0,
            ..EvolutionParams::default()
        }
    }

    #[test]
    fn test_temperature_deviation_floor() {
        assert_eq!(temperature_deviation(0.0, 0.2, 0.01), 0.2);
        assert_eq!(temperature_deviation(0.99, 0.2, 0.01), 0.01);
        assert_eq!(temperature_deviation(f64::NAN, 0.2, 0.01), 0.01);
    }

    #[test]
    fn test_selection_probabilities_sum_to_one() {
        let probabilities = selection_probabilities(&[0.9, 0.4, 0.05, 0.3, 1.7]);
        let sum = probabilities.iter().sum::<f64>();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probabilities[4] > probabilities[0]);
    }

    #[test]
    fn test_selection_probabilities_fallbacks() {
        assert_eq!(selection_probabilities(&[]), Vec::<f64>::new());
        assert_eq!(selection_probabilities(&[-1.0, 0.0]), vec![0.5, 0.5]);
        assert_eq!(
            selection_probabilities(&[f64::NAN, 2.0, -3.0]),
            vec![0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_initialize_fresh_population() {
        let population =
            initialize(None, &TOPOLOGY, Activation::Sigmoid, &params(8), &mut rng()).unwrap();
        assert_eq!(population.len(), 8);
        assert!(population.iter().all(|a| a.generation() == 1));
        assert!(population.iter().all(|a| a.network().shape() == TOPOLOGY));
    }

    #[test]
    fn test_initialize_from_prior_best() {
        let mut rng = rng();
        let mut best = scored(500.0, 40.0, &mut rng);
        best.set_fitness(0.6);
        let population =
            initialize(Some(&best), &[9, 9], Activation::Tanh, &params(5), &mut rng).unwrap();
        assert_eq!(population.len(), 5);
        for agent in &population {
            assert_eq!(agent.generation(), best.generation() + 1);
            assert_eq!(agent.fitness(), 0.6);
            // The prior best's topology wins over the requested one.
            assert_eq!(agent.network().shape(), TOPOLOGY);
        }
    }

    #[test]
    fn test_repopulate_assigns_fitness_and_size() {
        let mut rng = rng();
        let evaluated = vec![
            scored(0.0, 9.0, &mut rng),
            scored(0.0, 49.0, &mut rng),
            scored(0.0, 19.0, &mut rng),
        ];
        let outcome = repopulate(evaluated, None, &params(6), &mut rng).unwrap();
        assert_eq!(outcome.next.len(), 6);
        assert!(outcome.improved);

        let best = outcome.best_ever.unwrap();
        assert_eq!(best.score(), 50.0);
        assert_eq!(best.fitness(), 0.5);

        let report = outcome.report.unwrap();
        assert_eq!(report.best_score, 50.0);
        assert_eq!(report.best_progress, 49.0);
        for child in &outcome.next {
            assert_eq!(child.generation(), 2);
            assert!([0.1, 0.2, 0.5].contains(&child.fitness()));
        }
    }

    #[test]
    fn test_fitness_is_not_capped() {
        let mut rng = rng();
        let evaluated = vec![scored(0.0, 199.0, &mut rng)];
        let outcome = repopulate(evaluated, None, &params(1), &mut rng).unwrap();
        assert_eq!(outcome.best_ever.unwrap().fitness(), 2.0);
    }

    #[test]
    fn test_elitism_keeps_better_best_ever() {
        let mut rng = rng();
        let champion = scored(0.0, 89.0, &mut rng);
        let evaluated = vec![scored(0.0, 9.0, &mut rng), scored(0.0, 29.0, &mut rng)];
        let outcome = repopulate(evaluated, Some(champion), &params(4), &mut rng).unwrap();
        assert!(!outcome.improved);
        assert_eq!(outcome.best_ever.unwrap().score(), 90.0);
    }

    #[test]
    fn test_elitism_best_ever_dominates_history() {
        let mut rng = rng();
        let mut best_ever = None;
        let mut history_max = f64::MIN;
        let mut population = initialize(None, &TOPOLOGY, Activation::Sigmoid, &params(6), &mut rng)
            .unwrap();
        for round in 0..10 {
            for (i, agent) in population.iter_mut().enumerate() {
                agent.reset();
                let progress = f64::from(u32::try_from((round * 7 + i * 13) % 40).unwrap());
                agent.update_position(progress, 0.0);
                agent.set_points(0.0);
                agent.compute_score();
                history_max = history_max.max(agent.score());
            }
            let outcome = repopulate(population, best_ever, &params(6), &mut rng).unwrap();
            best_ever = outcome.best_ever;
            population = outcome.next;
            assert_eq!(best_ever.as_ref().unwrap().score(), history_max);
        }
    }

    #[test]
    fn test_non_finite_scores_never_become_best_ever() {
        let mut rng = rng();
        let evaluated = vec![
            scored(f64::NAN, 0.0, &mut rng),
            scored(0.0, 29.0, &mut rng),
            scored(f64::INFINITY, 0.0, &mut rng),
        ];
        let outcome = repopulate(evaluated, None, &params(4), &mut rng).unwrap();
        assert!(outcome.improved);
        assert_eq!(outcome.best_ever.as_ref().unwrap().score(), 30.0);
        assert_eq!(outcome.report.unwrap().best_score, 30.0);

        // A later, better agent still replaces it.
        let evaluated = vec![scored(f64::NAN, 0.0, &mut rng), scored(0.0, 500.0, &mut rng)];
        let outcome = repopulate(evaluated, outcome.best_ever, &params(4), &mut rng).unwrap();
        assert!(outcome.improved);
        assert_eq!(outcome.best_ever.unwrap().score(), 501.0);
    }

    #[test]
    fn test_all_non_finite_generation_keeps_best_ever() {
        let mut rng = rng();
        let champion = scored(0.0, 9.0, &mut rng);
        let evaluated = vec![scored(f64::NAN, 0.0, &mut rng)];
        let outcome = repopulate(evaluated, Some(champion), &params(2), &mut rng).unwrap();
        assert!(!outcome.improved);
        assert_eq!(outcome.best_ever.unwrap().score(), 10.0);
        assert_eq!(outcome.next.len(), 2);
    }

    #[test]
    fn test_non_finite_best_ever_is_replaced() {
        let mut rng = rng();
        let corrupt = scored(f64::NAN, 0.0, &mut rng);
        let evaluated = vec![scored(0.0, 4.0, &mut rng)];
        let outcome = repopulate(evaluated, Some(corrupt), &params(2), &mut rng).unwrap();
        assert!(outcome.improved);
        assert_eq!(outcome.best_ever.unwrap().score(), 5.0);
    }

    #[test]
    fn test_zero_fitness_generation_uses_uniform_selection() {
        let mut rng = rng();
        let evaluated = (0..4)
            .map(|_| scored(-100.0, 0.0, &mut rng))
            .collect::<Vec<_>>();
        let outcome = repopulate(evaluated, None, &params(20), &mut rng).unwrap();
        assert_eq!(outcome.next.len(), 20);
        assert!(outcome.next.iter().all(|a| a.fitness() == 0.0));
    }

    #[test]
    fn test_selection_favours_high_fitness() {
        let mut rng = rng();
        let evaluated = vec![scored(0.0, 98.0, &mut rng), scored(0.0, 0.0, &mut rng)];
        let outcome = repopulate(evaluated, None, &params(200), &mut rng).unwrap();
        let from_best = outcome.next.iter().filter(|a| a.fitness() == 0.99).count();
        assert!(from_best > 180, "only {from_best} children of the best agent");
    }

    #[test]
    fn test_empty_generation() {
        let outcome = repopulate(Vec::new(), None, &params(5), &mut rng()).unwrap();
        assert!(outcome.next.is_empty());
        assert!(outcome.best_ever.is_none());
        assert!(!outcome.improved);
        assert!(outcome.report.is_none());
    }

    #[test]
    fn test_crossover_reproduction() {
        let mut rng = rng();
        let evaluated = vec![scored(0.0, 30.0, &mut rng), scored(0.0, 20.0, &mut rng)];
        let params = EvolutionParams {
            reproduction: Reproduction::Crossover,
            ..params(10)
        };
        let outcome = repopulate(evaluated, None, &params, &mut rng).unwrap();
        assert_eq!(outcome.next.len(), 10);
        assert!(outcome.next.iter().all(|a| a.network().shape() == TOPOLOGY));
    }

    #[test]
    fn test_report_display() {
        let report = GenerationReport {
            generation: 3,
            best_fitness: 0.25,
            best_points: 1200.0,
            best_progress: 310.0,
            best_score: 323.0,
            fitness_stats: None,
        };
        assert_eq!(
            report.to_string(),
            "Fitness: 0.250 | Points: 1200 | Distance:  310"
        );
    }

    #[test]
    fn test_reproduction_from_str() {
        assert_eq!("mutation".parse::<Reproduction>().unwrap(), Reproduction::Mutation);
        assert_eq!("Crossover".parse::<Reproduction>().unwrap(), Reproduction::Crossover);
    }
}
