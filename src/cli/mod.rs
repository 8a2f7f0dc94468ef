//! CLI module for pipewright
//!
//! This module provides:
//! - Command implementations (run, validate, plan, config)
//! - Output handlers (console, JSON, quiet)
//! - Signal handling for graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use pipewright::cli::{commands, output};
//!
//! let handler = output::create_handler(output::OutputMode::Console, false);
//! let exit_code = commands::validate_graph(Path::new("graph.json"), &*handler);
//! ```

pub mod commands;
pub mod output;
pub mod signals;

pub use commands::{build_executors, plan_graph, run_graph, show_config, validate_graph};
pub use output::{OutputMode, create_handler};
pub use signals::{CancellationToken, setup_signal_handlers};
