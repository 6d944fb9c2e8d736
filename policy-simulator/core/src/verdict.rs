use crate::Endpoint;
use serde::Serialize;

/// The outcome of evaluating traffic from a source to a destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub allowed: bool,

    /// Whether the source may send to the destination.
    pub egress: DirectionReport,

    /// Whether the destination may receive from the source.
    pub ingress: DirectionReport,

    /// Lookup failures that were tolerated while resolving peers. A non-empty list means the
    /// verdict may under-report connectivity, never over-report it.
    pub warnings: Vec<String>,
}

/// Describes how one side of a connection was evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirectionReport {
    /// The endpoint whose policies were evaluated.
    pub endpoint: Endpoint,

    /// Set when at least one policy selects the endpoint for this direction.
    pub isolated: bool,

    pub allowed: bool,

    /// The decision of each policy that isolates the endpoint.
    pub policies: Vec<PolicyDecision>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub name: String,
    pub allowed: bool,
}

impl DirectionReport {
    /// A report for an endpoint that no policy isolates.
    pub fn unisolated(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            isolated: false,
            allowed: true,
            policies: Vec::new(),
        }
    }
}
