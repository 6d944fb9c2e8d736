use anyhow::{bail, Context, Result};
use netpol_simulator_core::{
    DiscoverPolicies, DiscoverWorkloads, Endpoint, Namespace, ProbeExistence, Workload,
    DEFAULT_NAMESPACE,
};
use netpol_simulator_k8s_api::{self as k8s, policy::NetworkPolicy, Labels, Selector};
use serde::Deserialize;
use std::{collections::BTreeMap, net::IpAddr, sync::Arc};
use tracing::debug;

/// An in-memory view of namespaces, pods, and policies, typically read from manifests.
///
/// Listings are ordered by name so that evaluations over a snapshot are reproducible.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    namespaces: BTreeMap<String, NamespaceState>,
}

pub type SharedSnapshot = Arc<Snapshot>;

#[derive(Clone, Debug, Default)]
struct NamespaceState {
    labels: Labels,
    pods: BTreeMap<String, Workload>,
    policies: Vec<NetworkPolicy>,
}

// === impl Snapshot ===

impl Snapshot {
    /// Reads a multi-document YAML stream. `Namespace`, `Pod`, and `NetworkPolicy` documents are
    /// applied, as are the items of a `List`; other kinds are skipped.
    pub fn from_manifests(yaml: &str) -> Result<Self> {
        let mut snapshot = Self::default();
        for (i, doc) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
            let value = serde_yaml::Value::deserialize(doc)
                .with_context(|| format!("failed to parse document {}", i + 1))?;
            snapshot
                .apply_document(value)
                .with_context(|| format!("invalid document {}", i + 1))?;
        }
        Ok(snapshot)
    }

    pub fn apply_document(&mut self, doc: serde_yaml::Value) -> Result<()> {
        if doc.is_null() {
            return Ok(());
        }

        let kind = doc
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        if matches!(kind.as_str(), "Namespace" | "Pod" | NetworkPolicy::KIND) {
            let named = doc
                .get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(serde_yaml::Value::as_str)
                .is_some_and(|name| !name.is_empty());
            if !named {
                bail!("{kind} missing required metadata.name field");
            }
        }
        match kind.as_str() {
            "Namespace" => self.apply_namespace(serde_yaml::from_value(doc)?),
            "Pod" => self.apply_pod(serde_yaml::from_value(doc)?),
            NetworkPolicy::KIND => self.apply_policy(serde_yaml::from_value(doc)?),
            "List" => {
                let items = match doc.get("items") {
                    None | Some(serde_yaml::Value::Null) => return Ok(()),
                    Some(serde_yaml::Value::Sequence(items)) => items.clone(),
                    Some(_) => bail!("List items must be a sequence"),
                };
                for item in items {
                    self.apply_document(item)?;
                }
            }
            kind => debug!(%kind, "Skipping unsupported document"),
        }
        Ok(())
    }

    pub fn apply_namespace(&mut self, ns: k8s::Namespace) {
        let ns = Namespace::from(ns);
        debug!(name = %ns.name, labels = %ns.labels, "Namespace");
        self.namespace_mut(&ns.name).labels = ns.labels;
    }

    pub fn apply_pod(&mut self, pod: k8s::Pod) {
        let workload = Workload::from(pod);
        debug!(endpoint = %workload.endpoint(), labels = %workload.labels, "Pod");
        self.namespace_mut(&workload.namespace)
            .pods
            .insert(workload.name.clone(), workload);
    }

    /// Adds a policy to its namespace, replacing a policy with the same name. Unnamed policies never
    /// replace one another.
    pub fn apply_policy(&mut self, mut policy: NetworkPolicy) {
        let namespace = policy
            .metadata
            .namespace
            .get_or_insert_with(|| DEFAULT_NAMESPACE.to_string())
            .clone();
        debug!(%namespace, name = %policy.name(), "NetworkPolicy");
        let policies = &mut self.namespace_mut(&namespace).policies;
        if let Some(name) = policy.metadata.name.as_deref().filter(|n| !n.is_empty()) {
            policies.retain(|p| p.name() != name);
        }
        policies.push(policy);
    }

    pub fn with_namespace(
        mut self,
        name: &str,
        labels: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) -> Self {
        self.namespace_mut(name).labels = labels.into_iter().collect();
        self
    }

    pub fn with_pod(
        mut self,
        namespace: &str,
        name: &str,
        labels: impl IntoIterator<Item = (&'static str, &'static str)>,
        ip: Option<IpAddr>,
    ) -> Self {
        let workload = Workload {
            namespace: namespace.to_string(),
            name: name.to_string(),
            labels: labels.into_iter().collect(),
            ips: ip.into_iter().collect(),
        };
        self.namespace_mut(namespace)
            .pods
            .insert(name.to_string(), workload);
        self
    }

    pub fn with_policy(mut self, policy: NetworkPolicy) -> Self {
        self.apply_policy(policy);
        self
    }

    fn namespace_mut(&mut self, name: &str) -> &mut NamespaceState {
        self.namespaces.entry(name.to_string()).or_default()
    }
}

fn parse_filter(label_filter: Option<&str>) -> Result<Selector> {
    Ok(label_filter
        .map(str::parse::<Selector>)
        .transpose()?
        .unwrap_or_default())
}

#[async_trait::async_trait]
impl DiscoverWorkloads for Snapshot {
    async fn list_workloads(
        &self,
        namespace: &str,
        label_filter: Option<&str>,
    ) -> Result<Vec<Workload>> {
        let filter = parse_filter(label_filter)?;
        let mut workloads = Vec::new();
        for workload in self
            .namespaces
            .get(namespace)
            .into_iter()
            .flat_map(|ns| ns.pods.values())
        {
            if filter.matches(&workload.labels)? {
                workloads.push(workload.clone());
            }
        }
        Ok(workloads)
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Option<Workload>> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.pods.get(name))
            .cloned())
    }

    async fn list_namespaces(&self, label_filter: Option<&str>) -> Result<Vec<Namespace>> {
        let filter = parse_filter(label_filter)?;
        let mut namespaces = Vec::new();
        for (name, ns) in self.namespaces.iter() {
            if filter.matches(&ns.labels)? {
                namespaces.push(Namespace {
                    name: name.clone(),
                    labels: ns.labels.clone(),
                });
            }
        }
        Ok(namespaces)
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.get(name).map(|ns| Namespace {
            name: name.to_string(),
            labels: ns.labels.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl DiscoverPolicies for Snapshot {
    async fn list_policies(&self, namespace: &str) -> Result<Vec<NetworkPolicy>> {
        Ok(self
            .namespaces
            .get(namespace)
            .map(|ns| ns.policies.clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ProbeExistence for Snapshot {
    async fn exists(&self, endpoint: &Endpoint) -> Result<bool> {
        Ok(self
            .namespaces
            .get(&endpoint.namespace)
            .is_some_and(|ns| ns.pods.contains_key(&endpoint.name)))
    }
}
