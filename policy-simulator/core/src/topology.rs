use crate::Endpoint;
use serde::Serialize;

/// The evaluated connectivity between every ordered pair of pods in a namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub namespace: String,

    /// Pods in the namespace, ordered by name.
    pub pods: Vec<Endpoint>,

    /// One edge per ordered pair of distinct pods, in the order of `pods`.
    pub edges: Vec<Edge>,

    /// Lookup failures tolerated across all evaluations, without duplicates.
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub allowed: bool,
}

impl Topology {
    pub fn allowed(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.allowed)
    }
}
