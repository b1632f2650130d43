//! Neuroevolution of platformer agents.
//!
//! This crate evolves populations of [`Agent`]s, each controlled by a small
//! feedforward [`Network`](evoplat_network::Network), with a generational
//! genetic algorithm. An agent's fitness comes from the reward it collects and
//! the distance it covers in a side-scrolling level.
//!
//! # How Training Works
//!
//! 1. **Population** - Start from mutated copies of the stored best agent, or
//!    from random networks
//! 2. **Evaluation** - Every agent plays one episode on a pool of worker threads
//! 3. **Scoring** - `score = points / 100 + max_progress + 1`
//! 4. **Elitism** - The best agent ever seen is persisted whenever it improves
//! 5. **Selection** - Parents are drawn by fitness-proportionate roulette
//! 6. **Reproduction** - Children are mutated copies, with mutation strength
//!    scaled down as fitness rises
//! 7. **Repeat** - Until the generation budget is used up or the run is cancelled
//!
//! # Architecture
//!
//! ```text
//! Trainer (trainer)
//!     ↓ builds generations with
//! Population Manager (population)
//!     ↓ hands agents to
//! Evaluation Pool (evaluation)
//!     ↓ runs episodes through
//! Episode Runner (episode)
//!     ↓ steps
//! Environment (evoplat-sim or any other implementation)
//! ```
//!
//! The best agent is stored with [`record::AgentStore`] in a small versioned
//! binary format.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use evoplat_training::{
//!     config::TrainingConfig, evaluation::CancellationToken, record::AgentStore,
//!     trainer::Trainer,
//! };
//! # let runner = todo!(); // Any EpisodeRunner, e.g. a PlatformerRunner
//!
//! let config = TrainingConfig::default();
//! let mut rng = config.rng();
//! let trainer = Trainer::new(config, runner, AgentStore::new("best.agent"))?;
//! let summary = trainer.run(&mut rng, &CancellationToken::new())?;
//! println!("best score: {}", summary.best.map_or(0.0, |agent| agent.score()));
//! ```

pub use self::agent::Agent;

pub mod agent;
pub mod config;
pub mod episode;
pub mod evaluation;
pub mod population;
pub mod record;
pub mod trainer;
