//! CLI command implementations

use super::output::{OutputEvent, OutputHandler};
use super::signals::{CancellationToken, with_cancellation};
use crate::config::{Graph, PipewrightConfig, load_graph};
use crate::filter::create_filter_service;
use crate::steps::StepExecutors;
use crate::transport::ReqwestTransport;
use crate::workflow::{EngineError, RunOptions, Schedule, WorkflowRunner};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Wire up the step executors the config describes
pub fn build_executors(config: &PipewrightConfig) -> Result<StepExecutors, String> {
    let transport = ReqwestTransport::from_config(config)
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
    let filter = create_filter_service(config)
        .map_err(|e| format!("Failed to create filter service: {}", e))?;
    Ok(StepExecutors::new(Arc::new(transport), Arc::from(filter)))
}

fn load(graph_path: &Path) -> Result<Graph, String> {
    load_graph(graph_path).map_err(|e| format!("Failed to load graph: {:#}", e))
}

/// Run a graph and print its result set
pub async fn run_graph(
    graph_path: &Path,
    executors: StepExecutors,
    options: RunOptions,
    token: CancellationToken,
    handler: &dyn OutputHandler,
) -> Result<i32, String> {
    let graph = load(graph_path)?;

    handler.emit(OutputEvent::RunStart {
        graph: graph_path.display().to_string(),
        steps: graph.steps.len(),
    });
    handler.emit(OutputEvent::Debug {
        message: format!("max concurrency {}", options.max_concurrency),
    });

    let runner = WorkflowRunner::new(executors);
    let started = Instant::now();
    let outcome = with_cancellation(
        token.clone(),
        runner.run_with(&graph, options, Some(&token)),
    )
    .await;

    match outcome {
        Some(Ok(results)) => {
            handler.emit(OutputEvent::RunComplete {
                duration_ms: started.elapsed().as_millis() as u64,
                steps_completed: results.len(),
            });
            let output = serde_json::to_value(&results)
                .map_err(|e| format!("Failed to encode results: {}", e))?;
            handler.result(true, Some(&output));
            Ok(0)
        }
        Some(Err(EngineError::Cancelled)) | None => {
            handler.emit(OutputEvent::RunError {
                step: None,
                error: "run cancelled".into(),
            });
            handler.result(false, None);
            Ok(130)
        }
        Some(Err(e)) => {
            handler.emit(OutputEvent::RunError {
                step: e.step().map(str::to_string),
                error: e.to_string(),
            });
            handler.result(false, None);
            Ok(1)
        }
    }
}

/// Validate a graph without running it
pub fn validate_graph(graph_path: &Path, handler: &dyn OutputHandler) -> i32 {
    let graph = match load(graph_path) {
        Ok(graph) => graph,
        Err(error) => {
            handler.emit(OutputEvent::RunError { step: None, error });
            return 1;
        }
    };

    match graph.validate() {
        Ok(()) => {
            handler.emit(OutputEvent::Info {
                message: format!(
                    "✓ Graph '{}' is valid ({} steps)",
                    graph_path.display(),
                    graph.steps.len()
                ),
            });
            0
        }
        Err(errors) => {
            handler.emit(OutputEvent::Info {
                message: format!(
                    "✗ Graph '{}' has {} error(s):",
                    graph_path.display(),
                    errors.len()
                ),
            });
            for err in &errors {
                handler.emit(OutputEvent::Info {
                    message: format!("  - {}", err),
                });
            }
            1
        }
    }
}

/// Print the order steps would run in
pub fn plan_graph(graph_path: &Path, handler: &dyn OutputHandler) -> i32 {
    let graph = match load(graph_path) {
        Ok(graph) => graph,
        Err(error) => {
            handler.emit(OutputEvent::RunError { step: None, error });
            return 1;
        }
    };

    let schedule = match Schedule::build(&graph) {
        Ok(schedule) => schedule,
        Err(e) => {
            handler.emit(OutputEvent::RunError {
                step: e.step().map(str::to_string),
                error: e.to_string(),
            });
            return 1;
        }
    };

    for (idx, id) in schedule.order().iter().enumerate() {
        let Some(step) = graph.step(id) else {
            continue;
        };
        let producers = schedule.dependencies().producers(id);
        let mut line = format!("{}. {} [{}]", idx + 1, id, step.kind);
        if !step.label.is_empty() && step.label != step.id {
            line.push_str(&format!(" {}", step.label));
        }
        if !producers.is_empty() {
            line.push_str(&format!(" <- {}", producers.join(", ")));
        }
        handler.emit(OutputEvent::Info { message: line });
    }
    0
}

/// Print the effective configuration with secrets masked
pub fn show_config(config: &PipewrightConfig, handler: &dyn OutputHandler) -> Result<i32, String> {
    let text = toml::to_string_pretty(&config.redacted())
        .map_err(|e| format!("Failed to encode config: {}", e))?;
    handler.emit(OutputEvent::Info { message: text });
    Ok(0)
}
