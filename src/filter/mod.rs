//! Natural-language filter collaborator
//!
//! Filter steps hand `{type, condition, data, context}` to a
//! [`FilterService`]. Two implementations exist:
//! - [`LocalFilter`]: asks a chat model when one is configured and falls back
//!   to a keyword heuristic when it is not (or when the model fails)
//! - [`RemoteFilter`]: posts the request to a separate filter service, such
//!   as the one started by `pipewright serve`

mod heuristic;
mod llm;
mod local;
mod prompt;
mod remote;
mod types;

#[allow(unused_imports)]
pub use llm::{ChatModel, OpenAiChat};
pub use local::LocalFilter;
pub use remote::RemoteFilter;
pub use types::{FilterError, FilterKind, FilterRequest, FilterService};

use crate::config::PipewrightConfig;
use tracing::info;

/// Create the filter collaborator the config asks for
///
/// A configured endpoint selects the remote service; otherwise filtering runs
/// in-process.
pub fn create_filter_service(
    config: &PipewrightConfig,
) -> Result<Box<dyn FilterService>, FilterError> {
    if let Some(remote) = RemoteFilter::from_config(config) {
        return Ok(Box::new(remote?));
    }
    Ok(Box::new(create_local_filter(config)?))
}

/// In-process filter, with a chat model only when one is configured
pub fn create_local_filter(config: &PipewrightConfig) -> Result<LocalFilter, FilterError> {
    let local = LocalFilter::new()?;
    if config.llm.is_configured() {
        info!(model = %config.llm.model, "using language model for filter steps");
        Ok(local.with_model(Box::new(OpenAiChat::from_config(config)?)))
    } else {
        info!("no language model configured, filter steps use keyword matching");
        Ok(local)
    }
}
