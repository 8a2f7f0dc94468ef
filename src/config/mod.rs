//! Configuration types and graph loading for pipewright

mod graph;
mod loader;

pub use graph::{Connection, Graph, Step, load_graph};
#[allow(unused_imports)]
pub use loader::{Defaults, FilterConfig, HttpConfig, LlmConfig, PipewrightConfig, ServerConfig};
