//! Workflow runner - orchestrates step execution

use super::inputs::resolve_input;
use super::schedule::Schedule;
use super::scope::Namespace;
use super::state::ResultSet;
use crate::cli::CancellationToken;
use crate::config::{Defaults, Graph, Step};
use crate::steps::{StepError, StepExecutors, StepKind};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Workflow has no steps")]
    EmptyGraph,

    #[error("duplicate step id '{step}'")]
    DuplicateStepId { step: String },

    #[error("workflow contains a cycle (unresolved steps: {})", .unresolved.join(", "))]
    CyclicGraph { unresolved: Vec<String> },

    #[error("step {step} ({label}) has unknown kind '{kind}'")]
    UnknownStepKind {
        step: String,
        label: String,
        kind: String,
    },

    #[error("error executing step {step} ({label}): {source}")]
    StepExecution {
        step: String,
        label: String,
        #[source]
        source: StepError,
    },

    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    fn step_execution(step: &Step, source: StepError) -> Self {
        Self::StepExecution {
            step: step.id.clone(),
            label: display_label(step).to_string(),
            source,
        }
    }

    /// The step the run failed on, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::DuplicateStepId { step }
            | Self::UnknownStepKind { step, .. }
            | Self::StepExecution { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }
}

/// Label for messages, falling back to the id
fn display_label(step: &Step) -> &str {
    if step.label.is_empty() {
        &step.id
    } else {
        &step.label
    }
}

/// Per-run settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Steps allowed in flight at once; 1 walks the schedule sequentially
    pub max_concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

impl RunOptions {
    pub fn from_config(defaults: &Defaults) -> Self {
        Self::default().with_max_concurrency(defaults.max_concurrency)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

/// Workflow runner
pub struct WorkflowRunner {
    executors: Arc<StepExecutors>,
}

impl WorkflowRunner {
    pub fn new(executors: StepExecutors) -> Self {
        Self {
            executors: Arc::new(executors),
        }
    }

    /// Run a graph sequentially
    pub async fn run(&self, graph: &Graph) -> Result<ResultSet, EngineError> {
        self.run_with(graph, RunOptions::default(), None).await
    }

    /// Run a graph, returning every step's result or the first failure
    ///
    /// Scheduling happens up front, so a cyclic graph fails before any step
    /// executes. No partial results are returned.
    pub async fn run_with(
        &self,
        graph: &Graph,
        options: RunOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResultSet, EngineError> {
        if graph.steps.is_empty() {
            return Err(EngineError::EmptyGraph);
        }
        let schedule = Schedule::build(graph)?;

        info!(
            steps = schedule.len(),
            max_concurrency = options.max_concurrency,
            "starting workflow run"
        );
        let started = Instant::now();

        let steps: HashMap<&str, &Step> = graph.steps.iter().map(|s| (s.id.as_str(), s)).collect();
        let results = if options.max_concurrency <= 1 {
            self.run_sequential(&schedule, &steps, cancel).await?
        } else {
            self.run_concurrent(&schedule, &steps, options.max_concurrency, cancel)
                .await?
        };

        info!(
            steps = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workflow run finished"
        );
        Ok(results)
    }

    async fn run_sequential(
        &self,
        schedule: &Schedule,
        steps: &HashMap<&str, &Step>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResultSet, EngineError> {
        let mut results = ResultSet::new();

        for id in schedule.order() {
            check_cancelled(cancel)?;
            let step = steps[id.as_str()];
            let (kind, input, namespace) = prepare(step, schedule, &results, steps)?;

            let value = self
                .executors
                .for_kind(kind)
                .execute(step, &input, &namespace)
                .await
                .map_err(|e| EngineError::step_execution(step, e))?;
            debug!(step = %id, "step finished");
            results.insert(id.clone(), value);
        }

        Ok(results)
    }

    async fn run_concurrent(
        &self,
        schedule: &Schedule,
        steps: &HashMap<&str, &Step>,
        max_concurrency: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResultSet, EngineError> {
        let order = schedule.order();
        let dependencies = schedule.dependencies();

        let mut waiting_on: HashMap<&str, usize> = order
            .iter()
            .map(|id| (id.as_str(), dependencies.step_producers(id).count()))
            .collect();
        // Ready steps by schedule position, so launches follow the schedule
        let mut ready: BTreeSet<usize> = order
            .iter()
            .enumerate()
            .filter(|(_, id)| waiting_on[id.as_str()] == 0)
            .map(|(pos, _)| pos)
            .collect();

        let mut results = ResultSet::new();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < max_concurrency {
                let Some(pos) = ready.pop_first() else {
                    break;
                };
                if let Err(e) = check_cancelled(cancel) {
                    tasks.abort_all();
                    return Err(e);
                }

                let step = steps[order[pos].as_str()];
                let snapshot = results.snapshot(order);
                let (kind, input, namespace) = match prepare(step, schedule, &snapshot, steps) {
                    Ok(prepared) => prepared,
                    Err(e) => {
                        tasks.abort_all();
                        return Err(e);
                    }
                };

                let executors = Arc::clone(&self.executors);
                let step = step.clone();
                tasks.spawn(async move {
                    let result = executors
                        .for_kind(kind)
                        .execute(&step, &input, &namespace)
                        .await;
                    (step, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (step, result) = match joined {
                Ok(done) => done,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => return Err(EngineError::Cancelled),
            };

            match result {
                Ok(value) => {
                    debug!(step = %step.id, "step finished");
                    for consumer in dependencies.consumers(&step.id) {
                        if let Some(count) = waiting_on.get_mut(consumer.as_str()) {
                            *count -= 1;
                            if *count == 0 {
                                if let Some(pos) = schedule.position(consumer) {
                                    ready.insert(pos);
                                }
                            }
                        }
                    }
                    results.insert(step.id, value);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(EngineError::step_execution(&step, e));
                }
            }
        }

        // Report results in schedule order regardless of completion order
        Ok(results.snapshot(order))
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), EngineError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(EngineError::Cancelled),
        _ => Ok(()),
    }
}

/// Resolve a step's kind, input and namespace from the results so far
fn prepare(
    step: &Step,
    schedule: &Schedule,
    results: &ResultSet,
    steps: &HashMap<&str, &Step>,
) -> Result<(StepKind, Value, Namespace), EngineError> {
    let kind = StepKind::parse(&step.kind).ok_or_else(|| EngineError::UnknownStepKind {
        step: step.id.clone(),
        label: display_label(step).to_string(),
        kind: step.kind.clone(),
    })?;

    let input = resolve_input(&step.id, schedule.dependencies(), results);
    let namespace = Namespace::build(&input, results, steps);
    debug!(step = %step.id, %kind, bindings = namespace.bindings().len(), "executing step");

    Ok((kind, input, namespace))
}
