//! NetworkPolicy connectivity evaluation
//!
//! Answers whether traffic from a source pod to a destination pod is permitted by the
//! `NetworkPolicy` resources in their namespaces:
//!
//! - A pod is isolated for a direction once any policy in its namespace selects it (via the
//!   policy's `podSelector`) and has an opinion about that direction.
//! - An isolated pod only permits traffic that at least one selecting policy allows. Rules within a
//!   policy are OR'd, peers within a rule are OR'd, and the namespace and pod selectors within a
//!   single peer are AND'd.
//! - Traffic is allowed iff the source may send (egress) and the destination may receive (ingress).
//!
//! ```text
//! [ Simulator ] -> [ applicability ] -> [ rules ] -> [ PeerResolver ] -> [ Selector ]
//! ```
//!
//! All state is read through the collaborator traits in `netpol_simulator_core` at evaluation time;
//! nothing is cached between evaluations.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod applicability;
mod connectivity;
mod error;
mod lookup_policy;
pub mod peer;
pub mod rules;
mod snapshot;


pub use self::{
    connectivity::Simulator,
    error::Error,
    lookup_policy::LookupPolicy,
    peer::{PeerResolver, Remote, Resolved},
    snapshot::{SharedSnapshot, Snapshot},
};
