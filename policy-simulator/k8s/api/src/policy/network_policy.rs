use super::network::IpBlock;
use crate::labels::Selector;
use k8s_openapi::apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A `networking.k8s.io/v1` NetworkPolicy.
///
/// Documents are accepted in both the API's camelCase field names and the snake_case names emitted
/// by some client libraries (`podSelector`/`pod_selector`, `from`/`_from`, ...). Both spellings
/// deserialize into this single shape.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NetworkPolicy {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: NetworkPolicySpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    /// Selects the pods, in the policy's namespace, that the policy isolates. An omitted selector
    /// selects every pod.
    #[serde(default, alias = "pod_selector", deserialize_with = "null_as_default")]
    pub pod_selector: Selector,

    #[serde(default, alias = "policy_types", skip_serializing_if = "Option::is_none")]
    pub policy_types: Option<Vec<PolicyType>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Vec<IngressRule>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress: Option<Vec<EgressRule>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum PolicyType {
    Ingress,
    Egress,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct IngressRule {
    #[serde(default, alias = "_from", skip_serializing_if = "Option::is_none")]
    pub from: Option<Vec<Peer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<Port>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct EgressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<Peer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<Port>>,
}

/// Ports are carried for completeness; they do not affect connectivity verdicts.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,
    #[serde(default, alias = "end_port", skip_serializing_if = "Option::is_none")]
    pub end_port: Option<i32>,
}

/// A counterparty of a rule.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "PeerFields", into = "PeerFields")]
pub enum Peer {
    /// Pods in the policy's own namespace.
    Pod(Selector),

    /// Every pod in each selected namespace.
    Namespace(Selector),

    /// Pods matching `pod` within namespaces matching `namespace`.
    NamespacedPod { namespace: Selector, pod: Selector },

    IpBlock(IpBlock),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPeer {
    #[error("peer must set podSelector, namespaceSelector, or ipBlock")]
    Empty,

    #[error("peer may not combine ipBlock with podSelector or namespaceSelector")]
    IpBlockWithSelector,
}

/// The wire shape of a peer, before its fields are checked for a valid combination.
#[derive(Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct PeerFields {
    #[serde(default, alias = "pod_selector", skip_serializing_if = "Option::is_none")]
    pod_selector: Option<Selector>,
    #[serde(
        default,
        alias = "namespace_selector",
        skip_serializing_if = "Option::is_none"
    )]
    namespace_selector: Option<Selector>,
    #[serde(default, alias = "ip_block", skip_serializing_if = "Option::is_none")]
    ip_block: Option<IpBlock>,
}

#[derive(Debug, thiserror::Error)]
#[error("not a valid NetworkPolicy: {0}")]
pub struct InvalidPolicy(#[from] serde_json::Error);

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// === impl NetworkPolicy ===

impl NetworkPolicy {
    pub const KIND: &'static str = "NetworkPolicy";

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Normalizes a policy read from the Kubernetes API into the document model.
impl TryFrom<k8s_openapi::api::networking::v1::NetworkPolicy> for NetworkPolicy {
    type Error = InvalidPolicy;

    fn try_from(np: k8s_openapi::api::networking::v1::NetworkPolicy) -> Result<Self, Self::Error> {
        let value = serde_json::to_value(np)?;
        Ok(serde_json::from_value(value)?)
    }
}

// === impl NetworkPolicySpec ===

impl NetworkPolicySpec {
    /// Returns the peer list of each rule for the given direction, or `None` if the rule list is
    /// absent altogether.
    pub fn rules(&self, ty: PolicyType) -> Option<Vec<&[Peer]>> {
        match ty {
            PolicyType::Ingress => self
                .ingress
                .as_ref()
                .map(|rules| rules.iter().map(IngressRule::peers).collect()),
            PolicyType::Egress => self
                .egress
                .as_ref()
                .map(|rules| rules.iter().map(EgressRule::peers).collect()),
        }
    }

    /// Indicates whether the direction is listed in an explicit `policyTypes` declaration.
    pub fn declares_type(&self, ty: PolicyType) -> bool {
        self.policy_types.iter().flatten().any(|t| *t == ty)
    }

    /// Indicates whether the policy has an opinion about the direction: either the direction is
    /// explicitly declared or the policy has at least one rule for it.
    pub fn declares(&self, ty: PolicyType) -> bool {
        self.declares_type(ty) || self.rules(ty).is_some_and(|rules| !rules.is_empty())
    }

    /// Iterates over every selector the policy references.
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        let peers = self
            .ingress
            .iter()
            .flatten()
            .flat_map(IngressRule::peers)
            .chain(self.egress.iter().flatten().flat_map(EgressRule::peers));
        std::iter::once(&self.pod_selector).chain(peers.flat_map(Peer::selectors))
    }
}

// === impl PolicyType ===

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => "Ingress".fmt(f),
            Self::Egress => "Egress".fmt(f),
        }
    }
}

// === impl IngressRule / EgressRule ===

impl IngressRule {
    /// An empty peer list matches every peer.
    pub fn peers(&self) -> &[Peer] {
        self.from.as_deref().unwrap_or_default()
    }
}

impl EgressRule {
    /// An empty peer list matches every peer.
    pub fn peers(&self) -> &[Peer] {
        self.to.as_deref().unwrap_or_default()
    }
}

// === impl Peer ===

impl Peer {
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        let (a, b) = match self {
            Self::Pod(pod) => (Some(pod), None),
            Self::Namespace(ns) => (Some(ns), None),
            Self::NamespacedPod { namespace, pod } => (Some(namespace), Some(pod)),
            Self::IpBlock(_) => (None, None),
        };
        a.into_iter().chain(b)
    }
}

impl TryFrom<PeerFields> for Peer {
    type Error = InvalidPeer;

    fn try_from(fields: PeerFields) -> Result<Self, Self::Error> {
        match fields {
            PeerFields {
                ip_block: Some(block),
                pod_selector: None,
                namespace_selector: None,
            } => Ok(Self::IpBlock(block)),
            PeerFields {
                ip_block: Some(_), ..
            } => Err(InvalidPeer::IpBlockWithSelector),
            PeerFields {
                pod_selector: Some(pod),
                namespace_selector: Some(namespace),
                ..
            } => Ok(Self::NamespacedPod { namespace, pod }),
            PeerFields {
                pod_selector: Some(pod),
                ..
            } => Ok(Self::Pod(pod)),
            PeerFields {
                namespace_selector: Some(ns),
                ..
            } => Ok(Self::Namespace(ns)),
            PeerFields { .. } => Err(InvalidPeer::Empty),
        }
    }
}

impl From<Peer> for PeerFields {
    fn from(peer: Peer) -> Self {
        match peer {
            Peer::Pod(pod) => Self {
                pod_selector: Some(pod),
                ..Self::default()
            },
            Peer::Namespace(ns) => Self {
                namespace_selector: Some(ns),
                ..Self::default()
            },
            Peer::NamespacedPod { namespace, pod } => Self {
                pod_selector: Some(pod),
                namespace_selector: Some(namespace),
                ..Self::default()
            },
            Peer::IpBlock(block) => Self {
                ip_block: Some(block),
                ..Self::default()
            },
        }
    }
}
