use crate::{
    core::{DiscoverPolicies, DiscoverWorkloads, Endpoint, Namespace, ProbeExistence, Workload},
    k8s::{self, policy::NetworkPolicy},
};
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use tracing::debug;

/// Reads cluster state from the Kubernetes API on every call.
#[derive(Clone)]
pub struct ClusterLookup {
    client: kube::Client,
}

fn list_params(label_filter: Option<&str>) -> ListParams {
    let params = ListParams::default();
    match label_filter {
        Some(filter) => params.labels(filter),
        None => params,
    }
}

// === impl ClusterLookup ===

impl ClusterLookup {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<k8s::Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl DiscoverWorkloads for ClusterLookup {
    async fn list_workloads(
        &self,
        namespace: &str,
        label_filter: Option<&str>,
    ) -> Result<Vec<Workload>> {
        let pods = self
            .pods(namespace)
            .list(&list_params(label_filter))
            .await
            .with_context(|| format!("failed to list pods in namespace {namespace}"))?;
        debug!(%namespace, ?label_filter, pods = pods.items.len(), "Listed pods");
        Ok(pods.items.into_iter().map(Workload::from).collect())
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Option<Workload>> {
        let pod = self
            .pods(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("failed to get pod {namespace}/{name}"))?;
        Ok(pod.map(Workload::from))
    }

    async fn list_namespaces(&self, label_filter: Option<&str>) -> Result<Vec<Namespace>> {
        let namespaces = Api::<k8s::Namespace>::all(self.client.clone())
            .list(&list_params(label_filter))
            .await
            .context("failed to list namespaces")?;
        debug!(?label_filter, namespaces = namespaces.items.len(), "Listed namespaces");
        Ok(namespaces.items.into_iter().map(Namespace::from).collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let ns = Api::<k8s::Namespace>::all(self.client.clone())
            .get_opt(name)
            .await
            .with_context(|| format!("failed to get namespace {name}"))?;
        Ok(ns.map(Namespace::from))
    }
}

#[async_trait::async_trait]
impl DiscoverPolicies for ClusterLookup {
    async fn list_policies(&self, namespace: &str) -> Result<Vec<NetworkPolicy>> {
        let api = Api::<k8s::api::networking::v1::NetworkPolicy>::namespaced(
            self.client.clone(),
            namespace,
        );
        let policies = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list network policies in namespace {namespace}"))?;
        policies
            .items
            .into_iter()
            .map(|np| NetworkPolicy::try_from(np).map_err(anyhow::Error::from))
            .collect()
    }
}

#[async_trait::async_trait]
impl ProbeExistence for ClusterLookup {
    async fn exists(&self, endpoint: &Endpoint) -> Result<bool> {
        let workload = self
            .get_workload(&endpoint.namespace, &endpoint.name)
            .await?;
        Ok(workload.is_some())
    }
}
