use std::path::PathBuf;

use chrono::{DateTime, Utc};
use evoplat_training::{Agent, config::TrainingConfig};
use serde::{Deserialize, Serialize};

/// Result of a training run, written as JSON after training.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub level: String,
    pub first_generation: u32,
    pub generations_run: u32,
    pub agent_path: PathBuf,
    pub best: Option<BestAgent>,
    pub config: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BestAgent {
    pub generation: u32,
    pub fitness: f64,
    pub points: f64,
    pub distance: f64,
    pub score: f64,
    pub topology: Vec<usize>,
}

impl From<&Agent> for BestAgent {
    fn from(agent: &Agent) -> Self {
        Self {
            generation: agent.generation(),
            fitness: agent.fitness(),
            points: agent.points(),
            distance: agent.max_progress(),
            score: agent.score(),
            topology: agent.network().shape().to_vec(),
        }
    }
}
