pub mod forwarder;
pub mod recovery;
pub mod registry;
pub mod selector;
pub mod service;
pub mod weight;

#[cfg(test)]
mod service_tests;

pub use forwarder::{HttpForwarder, ProxyRequest, ProxyResponse, RequestForwarder};
pub use recovery::{sweep_disabled_backends, sweep_disabled_backends_at};
pub use registry::{BackendRegistry, MemoryRegistry};
pub use selector::{rank_by_weight, select_weighted};
pub use service::{FailoverService, ServedResponse};
pub use weight::dynamic_weight;
