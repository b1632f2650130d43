//! Parallel evaluation of a generation.
//!
//! Each agent's episode is an independent task: it reads only that agent's
//! network and writes only that agent's episode state. [`EvaluationPool`]
//! runs the tasks on a bounded set of worker threads and returns once every
//! task of the generation has finished, which is the synchronization barrier
//! between generations.
//!
//! # Cancellation
//!
//! A [`CancellationToken`] is shared by the caller, the pool and every
//! running episode. When it fires, [`EvaluationPool::evaluate`] stops waiting
//! and returns [`EvaluationError::Cancelled`] immediately. Workers are
//! detached threads, so an episode that never checks the token cannot hold up
//! shutdown; its result is simply discarded.
//!
//! # Failures
//!
//! A runner error or panic does not abort the generation. The agent comes
//! back as [`Evaluated::Failed`], scored as if it collected nothing and never
//! moved, and the failure is logged.

use std::{
    any::Any,
    collections::VecDeque,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use evoplat_network::NetworkError;

use crate::{agent::Agent, episode::EnvironmentError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared flag that asks running work to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EpisodeError {
    #[display("episode cancelled")]
    Cancelled,
    #[display("environment failed")]
    Environment { source: EnvironmentError },
    #[display("network rejected the observation")]
    Network { source: NetworkError },
}

impl From<EnvironmentError> for EpisodeError {
    fn from(source: EnvironmentError) -> Self {
        Self::Environment { source }
    }
}

impl From<NetworkError> for EpisodeError {
    fn from(source: NetworkError) -> Self {
        Self::Network { source }
    }
}

/// Plays one episode for one agent.
///
/// The runner moves the agent through the episode with
/// [`Agent::update_position`] and [`Agent::is_stalled`] and returns the total
/// reward collected. Points and score are filled in by the pool.
pub trait EpisodeRunner: Send + Sync {
    fn run_episode(
        &self,
        agent: &mut Agent,
        cancel: &CancellationToken,
    ) -> Result<f64, EpisodeError>;
}

/// Outcome of one evaluation task.
#[derive(Debug, derive_more::IsVariant)]
pub enum Evaluated {
    Completed(Agent),
    Failed { agent: Agent, reason: String },
}

impl Evaluated {
    #[must_use]
    pub fn agent(&self) -> &Agent {
        match self {
            Self::Completed(agent) | Self::Failed { agent, .. } => agent,
        }
    }

    #[must_use]
    pub fn into_agent(self) -> Agent {
        match self {
            Self::Completed(agent) | Self::Failed { agent, .. } => agent,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EvaluationError {
    #[display("evaluation cancelled")]
    Cancelled,
    #[display("failed to spawn evaluation worker")]
    Spawn { source: io::Error },
    #[display("workers exited with {missing} evaluations outstanding")]
    WorkersLost { missing: usize },
}

/// Bounded pool of evaluation workers.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationPool {
    workers: usize,
}

impl EvaluationPool {
    /// Creates a pool with `workers` threads (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Evaluates every agent and returns the results in submission order.
    pub fn evaluate(
        &self,
        agents: Vec<Agent>,
        runner: &Arc<dyn EpisodeRunner>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Evaluated>, EvaluationError> {
        let total = agents.len();
        let queue = Arc::new(Mutex::new(
            agents.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let (result_tx, result_rx) = mpsc::channel();

        for id in 0..self.workers.min(total) {
            let queue = Arc::clone(&queue);
            let result_tx = result_tx.clone();
            let runner = Arc::clone(runner);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("evaluator-{id}"))
                .spawn(move || {
                    work(&queue, &result_tx, runner.as_ref(), &cancel);
                })
                .map_err(|source| EvaluationError::Spawn { source })?;
        }
        drop(result_tx);

        let mut results = (0..total).map(|_| None).collect::<Vec<Option<Evaluated>>>();
        let mut received = 0;
        while received < total {
            if cancel.is_cancelled() {
                return Err(EvaluationError::Cancelled);
            }
            match result_rx.recv_timeout(POLL_INTERVAL) {
                Ok((index, evaluated)) => {
                    results[index] = Some(evaluated);
                    received += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if cancel.is_cancelled() {
                        return Err(EvaluationError::Cancelled);
                    }
                    return Err(EvaluationError::WorkersLost {
                        missing: total - received,
                    });
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

fn work(
    queue: &Mutex<VecDeque<(usize, Agent)>>,
    results: &mpsc::Sender<(usize, Evaluated)>,
    runner: &dyn EpisodeRunner,
    cancel: &CancellationToken,
) {
    while !cancel.is_cancelled() {
        let Some((index, agent)) = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        else {
            break;
        };
        if results.send((index, evaluate_one(agent, runner, cancel))).is_err() {
            break;
        }
    }
}

fn evaluate_one(
    mut agent: Agent,
    runner: &dyn EpisodeRunner,
    cancel: &CancellationToken,
) -> Evaluated {
    agent.reset();
    agent.set_points(0.0);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        runner.run_episode(&mut agent, cancel)
    }));
    let reason = match outcome {
        Ok(Ok(points)) if !points.is_finite() => format!("non-finite reward {points}"),
        Ok(Ok(points)) => {
            agent.set_points(points);
            agent.compute_score();
            return Evaluated::Completed(agent);
        }
        Ok(Err(error)) => error_chain(&error),
        Err(payload) => format!("episode panicked: {}", panic_message(payload.as_ref())),
    };

    tracing::warn!(generation = agent.generation(), %reason, "evaluation failed");
    agent.reset();
    agent.set_points(0.0);
    agent.compute_score();
    Evaluated::Failed { agent, reason }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
