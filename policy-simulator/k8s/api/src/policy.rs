pub mod network;
pub mod network_policy;

pub use self::{
    network::{Cidr, CidrParseError, IpBlock},
    network_policy::{
        EgressRule, IngressRule, InvalidPeer, InvalidPolicy, NetworkPolicy, NetworkPolicySpec,
        Peer, PolicyType, Port,
    },
};
