//! Resolves rule peers to the concrete set of endpoints they designate.

use crate::{Error, LookupPolicy};
use netpol_simulator_core::{DiscoverWorkloads, Endpoint, Workload};
use netpol_simulator_k8s_api::{
    policy::{IpBlock, NetworkPolicy, Peer},
    InvalidSelector, Selector,
};
use std::net::IpAddr;
use tracing::{debug, instrument, trace};

/// Resolves peers by reading workloads and namespaces at call time.
#[derive(Debug)]
pub struct PeerResolver<'w, W> {
    workloads: &'w W,
    lookup_policy: LookupPolicy,
}

#[derive(Debug, thiserror::Error)]
enum ResolveError {
    #[error(transparent)]
    Lookup(#[from] anyhow::Error),

    #[error(transparent)]
    Selector(#[from] InvalidSelector),
}

/// A member of a peer's resolved set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    Workload(Workload),

    /// Every workload in the named namespace.
    Namespace(String),

    Network(IpBlock),
}

/// The other end of the connection being evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Remote {
    pub endpoint: Endpoint,

    /// Addresses of the remote workload, used to match `ipBlock` peers.
    pub ips: Vec<IpAddr>,
}

// === impl PeerResolver ===

impl<'w, W> PeerResolver<'w, W>
where
    W: DiscoverWorkloads + Send + Sync,
{
    pub fn new(workloads: &'w W, lookup_policy: LookupPolicy) -> Self {
        Self {
            workloads,
            lookup_policy,
        }
    }

    /// Resolves a peer of `policy` relative to `home`, the namespace the policy was listed from.
    ///
    /// A failed lookup resolves the whole peer to nothing when lookups are lenient. A malformed
    /// selector always fails with [`Error::InvalidSelector`].
    #[instrument(skip_all, fields(policy = %policy.name(), %home))]
    pub async fn resolve(
        &self,
        policy: &NetworkPolicy,
        peer: &Peer,
        home: &str,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<Resolved>, Error> {
        match self.try_resolve(peer, home).await {
            Ok(resolved) => {
                debug!(resolved = resolved.len());
                Ok(resolved)
            }
            Err(ResolveError::Selector(error)) => Err(Error::invalid_selector(home, policy, error)),
            Err(ResolveError::Lookup(error)) => self.lookup_policy.recover(
                error,
                format!("failed to resolve a peer of policy {home}/{}", policy.name()),
                warnings,
            ),
        }
    }

    async fn try_resolve(&self, peer: &Peer, home: &str) -> Result<Vec<Resolved>, ResolveError> {
        for selector in peer.selectors() {
            selector.validate()?;
        }

        match peer {
            Peer::Pod(pod) => Ok(self
                .workloads_in(home, pod)
                .await?
                .into_iter()
                .map(Resolved::Workload)
                .collect()),

            Peer::Namespace(namespace) => Ok(self
                .namespaces(namespace)
                .await?
                .into_iter()
                .map(Resolved::Namespace)
                .collect()),

            // Both selectors must match: pods selected by `pod`, but only within namespaces
            // selected by `namespace`.
            Peer::NamespacedPod { namespace, pod } => {
                let mut resolved = Vec::new();
                for ns in self.namespaces(namespace).await? {
                    let workloads = self.workloads_in(&ns, pod).await?;
                    resolved.extend(workloads.into_iter().map(Resolved::Workload));
                }
                Ok(resolved)
            }

            Peer::IpBlock(block) => Ok(vec![Resolved::Network(block.clone())]),
        }
    }

    async fn workloads_in(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Workload>, ResolveError> {
        let filter = selector.label_filter();
        let mut selected = Vec::new();
        for workload in self
            .workloads
            .list_workloads(namespace, filter.as_deref())
            .await?
        {
            if selector.matches(&workload.labels)? {
                selected.push(workload);
            }
        }
        trace!(%namespace, ?filter, selected = selected.len(), "Listed workloads");
        Ok(selected)
    }

    async fn namespaces(&self, selector: &Selector) -> Result<Vec<String>, ResolveError> {
        let filter = selector.label_filter();
        let mut selected = Vec::new();
        for ns in self.workloads.list_namespaces(filter.as_deref()).await? {
            if selector.matches(&ns.labels)? {
                selected.push(ns.name);
            }
        }
        trace!(?filter, ?selected, "Listed namespaces");
        Ok(selected)
    }
}

// === impl Resolved ===

impl Resolved {
    pub fn contains(&self, remote: &Remote) -> bool {
        match self {
            Self::Workload(workload) => workload.is(&remote.endpoint),
            Self::Namespace(namespace) => *namespace == remote.endpoint.namespace,
            Self::Network(block) => remote.ips.iter().any(|ip| block.contains(ip)),
        }
    }
}
