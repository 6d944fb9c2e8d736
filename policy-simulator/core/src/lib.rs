#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod endpoint;
pub mod lookup;
mod topology;
mod verdict;

pub use self::{
    endpoint::{Endpoint, InvalidEndpoint, DEFAULT_NAMESPACE},
    lookup::{DiscoverPolicies, DiscoverWorkloads, Namespace, ProbeExistence, Workload},
    topology::{Edge, Topology},
    verdict::{DirectionReport, PolicyDecision, Verdict},
};
