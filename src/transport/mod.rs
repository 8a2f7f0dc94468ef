//! Outbound HTTP for request steps
//!
//! Steps talk to the network only through [`HttpTransport`], so runs can be
//! driven against a mock in tests.

mod reqwest_transport;
mod types;

pub use reqwest_transport::ReqwestTransport;
pub use types::{HttpRequest, HttpResponse, HttpTransport, TransportError};
