//! Upstream forwarding and fault-isolated response rewriting

pub mod mutator;
pub mod upstream;

pub use mutator::{serve_with_mutator, Mutation, RequestContext, ResponseMutator};
pub use upstream::{strip_hop_by_hop, BufferedResponse, UpstreamProxy};
