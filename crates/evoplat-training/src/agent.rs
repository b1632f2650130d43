//! A single candidate solution and its per-episode bookkeeping.
//!
//! An [`Agent`] owns a [`Network`] and tracks what happened during the
//! current episode: where it is, how far right it has ever been, whether it
//! has stopped making lateral progress, and how many points it collected.
//!
//! # Episode Protocol
//!
//! The episode runner calls, once per simulation step and in this order:
//!
//! 1. [`Agent::update_position`]
//! 2. [`Agent::is_stalled`]
//!
//! After the episode the evaluation driver stores the collected reward with
//! [`Agent::set_points`] and calls [`Agent::compute_score`].
//!
//! # Ordering
//!
//! Agents compare by [`Agent::score`] alone. Two agents with equal scores are
//! `==` even if their networks differ.

use std::cmp::Ordering;

use evoplat_network::{Activation, Network, NetworkError};
use rand::Rng;

/// Number of consecutive steps without lateral movement tolerated before an
/// agent is considered stalled.
pub const STALL_TIMEOUT: i32 = 60;

/// A point in level coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) network: Network,
    pub(crate) generation: u32,
    pub(crate) fitness: f64,
    pub(crate) points: f64,
    pub(crate) score: f64,
    pub(crate) current_position: Position,
    pub(crate) previous_position: Position,
    pub(crate) max_progress: f64,
    pub(crate) stalled_counter: i32,
    pub(crate) stalled: bool,
}

impl Agent {
    /// Creates a first-generation agent with a freshly randomized sigmoid network.
    pub fn new<R>(topology: &[usize], rng: &mut R) -> Result<Self, NetworkError>
    where
        R: Rng + ?Sized,
    {
        Self::with_activation(topology, Activation::default(), rng)
    }

    pub fn with_activation<R>(
        topology: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self, NetworkError>
    where
        R: Rng + ?Sized,
    {
        Ok(Self::from_network(Network::with_activation(
            topology, activation, rng,
        )?))
    }

    /// Wraps an existing network in a first-generation agent.
    #[must_use]
    pub fn from_network(network: Network) -> Self {
        Self {
            network,
            generation: 1,
            fitness: 0.0,
            points: 0.0,
            score: 0.0,
            current_position: Position::default(),
            previous_position: Position::default(),
            max_progress: 0.0,
            stalled_counter: STALL_TIMEOUT,
            stalled: false,
        }
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Lineage depth; first-generation agents report `1`.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Normalized score assigned by the population manager.
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Raw reward collected in the last episode.
    #[must_use]
    pub fn points(&self) -> f64 {
        self.points
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.current_position
    }

    /// Rightmost x-coordinate reached in the current episode.
    #[must_use]
    pub fn max_progress(&self) -> f64 {
        self.max_progress
    }

    #[must_use]
    pub fn stalled_counter(&self) -> i32 {
        self.stalled_counter
    }

    pub fn set_points(&mut self, points: f64) {
        self.points = points;
    }

    pub(crate) fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    pub fn mutate<R>(&mut self, probability: f64, deviation: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.network.mutate(probability, deviation, rng);
    }

    /// Records the position for this step and raises the progress mark.
    pub fn update_position(&mut self, x: f64, y: f64) {
        self.current_position = Position::new(x, y);
        if x > self.max_progress {
            self.max_progress = x;
        }
    }

    /// Advances the stall timer by one step and reports whether the agent is stalled.
    ///
    /// Only the x-coordinate counts as movement. Once stalled, the agent stays
    /// stalled until [`Agent::reset`]. Call exactly once per step.
    pub fn is_stalled(&mut self) -> bool {
        if self.stalled {
            return true;
        }

        if self.previous_position.x == self.current_position.x {
            self.stalled_counter -= 1;
        } else {
            self.stalled_counter = STALL_TIMEOUT;
            self.previous_position = self.current_position;
        }

        if self.stalled_counter < 0 {
            self.stalled = true;
        }
        self.stalled
    }

    /// Sets `score = points / 100 + max_progress + 1`.
    pub fn compute_score(&mut self) {
        self.score = self.points / 100.0 + self.max_progress + 1.0;
    }

    /// Restores position, progress and stall tracking for a new episode.
    ///
    /// Lineage, fitness, points and score are left alone.
    pub fn reset(&mut self) {
        self.current_position = Position::default();
        self.previous_position = Position::default();
        self.max_progress = 0.0;
        self.stalled_counter = STALL_TIMEOUT;
        self.stalled = false;
    }

    /// Creates a descendant: copied network, inherited results, next generation.
    ///
    /// Episode state of the descendant starts fresh.
    #[must_use]
    pub fn offspring(&self) -> Self {
        Self {
            generation: self.generation + 1,
            fitness: self.fitness,
            points: self.points,
            score: self.score,
            ..Self::from_network(self.network.clone())
        }
    }
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl PartialOrd for Agent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.score.partial_cmp(&other.score)
    }
}
