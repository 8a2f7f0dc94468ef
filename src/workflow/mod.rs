//! Workflow execution engine for pipewright
//!
//! This module handles:
//! - Dependency resolution and scheduling (Kahn's algorithm)
//! - Input resolution from upstream results
//! - Per-step namespaces for expressions and filter context
//! - Sequential and concurrent run coordination
//!
//! # Example
//!
//! ```ignore
//! use pipewright::config::load_graph;
//! use pipewright::workflow::{RunOptions, WorkflowRunner};
//!
//! let graph = load_graph(Path::new("weather.json"))?;
//! let runner = WorkflowRunner::new(executors);
//! let results = runner.run_with(&graph, RunOptions::default(), None).await?;
//!
//! for (id, value) in results.iter() {
//!     println!("{}: {}", id, value);
//! }
//! ```

mod inputs;
mod runner;
mod schedule;
mod scope;
mod state;

#[allow(unused_imports)]
pub use inputs::resolve_input;
pub use runner::{EngineError, RunOptions, WorkflowRunner};
#[allow(unused_imports)]
pub use schedule::{Dependencies, Schedule};
#[allow(unused_imports)]
pub use scope::{Binding, BindingSource, Namespace};
pub use state::ResultSet;
