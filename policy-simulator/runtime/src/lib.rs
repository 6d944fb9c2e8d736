#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_simulator_core as core;
pub use netpol_simulator_k8s_api as k8s;
pub use netpol_simulator_k8s_index as index;

mod args;
mod cluster;
mod report;
mod validation;

pub use self::{
    args::Args,
    cluster::ClusterLookup,
    report::{GraphOutput, Output},
    validation::{validate_manifests, Issue, IssueKind},
};
