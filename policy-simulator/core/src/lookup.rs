//! Collaborators that supply cluster state to the evaluator.
//!
//! Every call is a fresh read: implementations must not serve state older than the start of the
//! evaluation that requested it, and the evaluator never caches results across calls.

use crate::{Endpoint, DEFAULT_NAMESPACE};
use anyhow::Result;
use netpol_simulator_k8s_api::{self as k8s, policy::NetworkPolicy, Labels, ResourceExt};
use std::{net::IpAddr, sync::Arc};

/// A pod, as seen by the evaluator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
    pub ips: Vec<IpAddr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub labels: Labels,
}

/// Lists and reads workload and namespace metadata.
///
/// `label_filter` is an equality-only filter (`k=v,k2=v2`). Implementations may apply it
/// server-side; callers always re-check their full selector on the results.
#[async_trait::async_trait]
pub trait DiscoverWorkloads {
    async fn list_workloads(
        &self,
        namespace: &str,
        label_filter: Option<&str>,
    ) -> Result<Vec<Workload>>;

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Option<Workload>>;

    async fn list_namespaces(&self, label_filter: Option<&str>) -> Result<Vec<Namespace>>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;
}

/// Lists the policies that live in a namespace.
#[async_trait::async_trait]
pub trait DiscoverPolicies {
    async fn list_policies(&self, namespace: &str) -> Result<Vec<NetworkPolicy>>;
}

/// Checks whether an endpoint exists before it is evaluated.
#[async_trait::async_trait]
pub trait ProbeExistence {
    async fn exists(&self, endpoint: &Endpoint) -> Result<bool>;
}

#[async_trait::async_trait]
impl<T: DiscoverWorkloads + Send + Sync + ?Sized> DiscoverWorkloads for Arc<T> {
    async fn list_workloads(
        &self,
        namespace: &str,
        label_filter: Option<&str>,
    ) -> Result<Vec<Workload>> {
        (**self).list_workloads(namespace, label_filter).await
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Option<Workload>> {
        (**self).get_workload(namespace, name).await
    }

    async fn list_namespaces(&self, label_filter: Option<&str>) -> Result<Vec<Namespace>> {
        (**self).list_namespaces(label_filter).await
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        (**self).get_namespace(name).await
    }
}

#[async_trait::async_trait]
impl<T: DiscoverPolicies + Send + Sync + ?Sized> DiscoverPolicies for Arc<T> {
    async fn list_policies(&self, namespace: &str) -> Result<Vec<NetworkPolicy>> {
        (**self).list_policies(namespace).await
    }
}

#[async_trait::async_trait]
impl<T: ProbeExistence + Send + Sync + ?Sized> ProbeExistence for Arc<T> {
    async fn exists(&self, endpoint: &Endpoint) -> Result<bool> {
        (**self).exists(endpoint).await
    }
}

// === impl Workload ===

impl Workload {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::pod(&self.namespace, &self.name)
    }

    pub fn is(&self, endpoint: &Endpoint) -> bool {
        self.namespace == endpoint.namespace && self.name == endpoint.name
    }
}

impl From<k8s::Pod> for Workload {
    fn from(pod: k8s::Pod) -> Self {
        let namespace = pod
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let name = pod.name_any();
        let ips = pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.as_deref())
            .and_then(|ip| ip.parse().ok())
            .into_iter()
            .collect();
        Self {
            namespace,
            name,
            labels: pod.metadata.labels.into(),
            ips,
        }
    }
}

// === impl Namespace ===

impl From<k8s::Namespace> for Namespace {
    fn from(ns: k8s::Namespace) -> Self {
        Self {
            name: ns.name_any(),
            labels: ns.metadata.labels.into(),
        }
    }
}
