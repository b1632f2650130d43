//! Episode loop for side-scrolling platform environments.
//!
//! [`PlatformerRunner`] drives any [`Environment`] through one episode and
//! implements [`EpisodeRunner`] so it can be handed to the evaluation pool.
//!
//! # Step Protocol
//!
//! Every step:
//!
//! 1. Observe the environment
//! 2. Record the agent position ([`Agent::update_position`])
//! 3. Pick the action with the strongest network output
//! 4. Check termination: stalled, behind the dead line, or the environment
//!    reports that the episode ended
//! 5. Stop if terminated and no end animation is running
//! 6. Advance the dead line, perform the action and add its reward
//!
//! The dead line starts behind the agent and moves right at a fixed speed,
//! so an agent that runs backwards or dawdles is eventually overtaken.

use serde::{Deserialize, Serialize};

use crate::{
    agent::Agent,
    evaluation::{CancellationToken, EpisodeError, EpisodeRunner},
};

/// Failure reported by an environment.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("{message}")]
pub struct EnvironmentError {
    message: String,
}

impl EnvironmentError {
    pub fn new<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
        }
    }
}

/// What the agent senses at the start of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Network input vector.
    pub sensors: Vec<f64>,
    pub x: f64,
    pub y: f64,
    /// The agent died or completed the level.
    pub ended: bool,
    /// An end-of-level animation is still playing.
    pub animating: bool,
}

/// A steppable game world.
pub trait Environment {
    /// Puts the world back at the start of the level.
    fn reset(&mut self) -> Result<(), EnvironmentError>;

    fn observe(&self) -> Observation;

    /// Performs `action` and returns the reward it earned.
    fn step(&mut self, action: usize) -> Result<f64, EnvironmentError>;
}

/// Creates a fresh environment per episode.
pub trait EnvironmentFactory: Send + Sync {
    fn create(&self, level: &str) -> Result<Box<dyn Environment>, EnvironmentError>;
}

/// Settings of a single episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpisodeSettings {
    /// Level passed to the environment factory.
    pub level: String,
    /// Initial x-coordinate of the dead line.
    pub dead_line_start: f64,
    /// Distance the dead line advances per step.
    pub dead_line_speed: f64,
    /// Hard cap on steps per episode; `None` for no cap.
    pub max_steps: Option<u64>,
}

impl Default for EpisodeSettings {
    fn default() -> Self {
        Self {
            level: "plains".to_owned(),
            dead_line_start: -300.0,
            dead_line_speed: 5.0,
            max_steps: None,
        }
    }
}

/// Plays platformer episodes built by an [`EnvironmentFactory`].
#[derive(Debug, Clone)]
pub struct PlatformerRunner<F> {
    factory: F,
    settings: EpisodeSettings,
}

impl<F> PlatformerRunner<F>
where
    F: EnvironmentFactory,
{
    pub fn new(factory: F, settings: EpisodeSettings) -> Self {
        Self { factory, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &EpisodeSettings {
        &self.settings
    }

    /// Plays one episode in an existing environment.
    pub fn play(
        &self,
        env: &mut dyn Environment,
        agent: &mut Agent,
        cancel: &CancellationToken,
    ) -> Result<f64, EpisodeError> {
        self.play_observed(env, agent, cancel, |_| {})
    }

    /// Like [`PlatformerRunner::play`], showing every observation to `observer`.
    pub fn play_observed<O>(
        &self,
        env: &mut dyn Environment,
        agent: &mut Agent,
        cancel: &CancellationToken,
        mut observer: O,
    ) -> Result<f64, EpisodeError>
    where
        O: FnMut(&Observation),
    {
        env.reset()?;

        let mut dead_line = self.settings.dead_line_start;
        let mut points = 0.0;
        let mut steps = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(EpisodeError::Cancelled);
            }

            let observation = env.observe();
            observer(&observation);
            agent.update_position(observation.x, observation.y);
            let action = agent.network().decide(&observation.sensors)?;

            let done = agent.is_stalled() || observation.x < dead_line || observation.ended;
            if done && !observation.animating {
                break;
            }
            if self.settings.max_steps.is_some_and(|limit| steps >= limit) {
                tracing::debug!(steps, "episode hit the step limit");
                break;
            }

            dead_line += self.settings.dead_line_speed;
            points += env.step(action)?;
            steps += 1;
        }
        Ok(points)
    }
}

impl<F> EpisodeRunner for PlatformerRunner<F>
where
    F: EnvironmentFactory,
{
    fn run_episode(
        &self,
        agent: &mut Agent,
        cancel: &CancellationToken,
    ) -> Result<f64, EpisodeError> {
        let mut env = self.factory.create(&self.settings.level)?;
        self.play(env.as_mut(), agent, cancel)
    }
}
