use std::sync::Arc;

use evoplat_network::{Activation, Network};
use evoplat_sim::{Action, SimFactory, sensors};
use evoplat_training::{
    Agent,
    config::TrainingConfig,
    episode::{EpisodeSettings, PlatformerRunner},
    evaluation::{CancellationToken, EpisodeRunner},
    record::AgentStore,
    trainer::Trainer,
};
use ndarray::Array2;

/// A single-layer agent that always picks `action`, or action 0 on ties.
fn scripted(action: Option<Action>) -> Agent {
    let inputs = sensors::input_width(evoplat_sim::SENSOR_RADIUS);
    let mut weights = Array2::zeros((inputs + 1, Action::ALL.len()));
    if let Some(action) = action {
        let index = Action::ALL.iter().position(|&a| a == action).unwrap();
        weights[[0, index]] = 1.0;
    }
    let network =
        Network::from_weights(Activation::Sigmoid, vec![inputs, Action::ALL.len()], vec![weights])
            .unwrap();
    Agent::from_network(network)
}

fn play(agent: &mut Agent, level: &str) -> f64 {
    let runner = PlatformerRunner::new(
        SimFactory::default(),
        EpisodeSettings {
            level: level.to_owned(),
            ..EpisodeSettings::default()
        },
    );
    let points = runner
        .run_episode(agent, &CancellationToken::new())
        .unwrap();
    agent.set_points(points);
    agent.compute_score();
    points
}

#[test]
fn idle_agent_scores_its_start_position() {
    // Ties resolve to running left into the level edge.
    let mut agent = scripted(None);
    let points = play(&mut agent, "plains");
    assert_eq!(points, 0.0);
    assert_eq!(agent.max_progress(), 32.0);
    assert_eq!(agent.score(), 33.0);
}

#[test]
fn runner_stops_at_the_first_block() {
    let mut agent = scripted(Some(Action::RunRight));
    play(&mut agent, "plains");
    assert_eq!(agent.max_progress(), 464.0);
    assert!(agent.is_stalled());
}

#[test]
fn jumper_clears_the_first_block() {
    let mut agent = scripted(Some(Action::RunJumpRight));
    play(&mut agent, "plains");
    assert!(agent.max_progress() > 480.0);
}

#[test]
fn trainer_runs_on_the_simulator() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        population_size: 4,
        topology: vec![169, 8, 4],
        generations: Some(2),
        workers: 2,
        seed: Some(11),
        episode: EpisodeSettings {
            max_steps: Some(300),
            ..EpisodeSettings::default()
        },
        ..TrainingConfig::default()
    };
    let runner = Arc::new(PlatformerRunner::new(
        SimFactory::default(),
        config.episode.clone(),
    ));
    let mut rng = config.rng();
    let trainer = Trainer::new(config, runner, AgentStore::new(dir.path().join("best.agent")))
        .unwrap();
    let summary = trainer.run(&mut rng, &CancellationToken::new()).unwrap();

    assert_eq!(summary.generations_run, 2);
    let stored = trainer.store().load().unwrap();
    assert_eq!(stored.network().shape(), &[169, 8, 4]);
    assert!(stored.score() >= 1.0);
}
