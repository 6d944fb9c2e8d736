//! Determines which policies isolate an endpoint for a direction.

use crate::Error;
use netpol_simulator_core::{DiscoverWorkloads, Endpoint};
use netpol_simulator_k8s_api::policy::{NetworkPolicy, PolicyType};
use tracing::{debug, instrument};

/// Returns the policies, among those in the endpoint's namespace, whose `podSelector` matches the
/// endpoint and that have an opinion about `direction`.
///
/// The endpoint is isolated for the direction iff the result is non-empty. Policies that select the
/// endpoint but only speak to the other direction are not returned. A failure to read the
/// endpoint's labels always fails the evaluation, since isolation cannot be decided without them.
#[instrument(skip_all, fields(%endpoint, %direction))]
pub async fn selecting_policies<'p, W>(
    workloads: &W,
    endpoint: &Endpoint,
    policies: &'p [NetworkPolicy],
    direction: PolicyType,
) -> Result<Vec<&'p NetworkPolicy>, Error>
where
    W: DiscoverWorkloads + Send + Sync,
{
    let candidates = policies
        .iter()
        .filter(|p| p.spec.declares(direction))
        .collect::<Vec<_>>();
    if candidates.is_empty() {
        debug!("No policies for direction");
        return Ok(candidates);
    }

    let labels = match workloads
        .get_workload(&endpoint.namespace, &endpoint.name)
        .await
    {
        Ok(Some(workload)) => workload.labels,
        Ok(None) => return Err(Error::NotFound(endpoint.clone())),
        Err(error) => {
            return Err(Error::Lookup(
                error.context(format!("failed to read the labels of {endpoint}")),
            ))
        }
    };

    let mut selecting = Vec::with_capacity(candidates.len());
    for policy in candidates {
        let selected = policy
            .spec
            .pod_selector
            .matches(&labels)
            .map_err(|e| Error::invalid_selector(&endpoint.namespace, policy, e))?;
        if selected {
            selecting.push(policy);
        }
    }
    debug!(
        policies = ?selecting.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "Selected"
    );
    Ok(selecting)
}

/// Indicates whether the policy isolates the endpoint for `direction`.
pub async fn applies_to<W>(
    workloads: &W,
    endpoint: &Endpoint,
    policy: &NetworkPolicy,
    direction: PolicyType,
) -> Result<bool, Error>
where
    W: DiscoverWorkloads + Send + Sync,
{
    let selecting =
        selecting_policies(workloads, endpoint, std::slice::from_ref(policy), direction).await?;
    Ok(!selecting.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Snapshot;

    fn policy(spec: serde_json::Value) -> NetworkPolicy {
        serde_json::from_value(serde_json::json!({
            "metadata": {"name": "test", "namespace": "ns"},
            "spec": spec,
        }))
        .expect("policy must parse")
    }

    fn snapshot() -> Snapshot {
        Snapshot::default()
            .with_pod("ns", "web", Some(("app", "web")), None)
            .with_pod("ns", "db", Some(("app", "db")), None)
    }

    #[tokio::test]
    async fn pod_selector_and_direction_must_both_apply() {
        let snapshot = snapshot();
        let web = Endpoint::pod("ns", "web");
        let db = Endpoint::pod("ns", "db");

        let ingress_for_web = policy(serde_json::json!({
            "podSelector": {"matchLabels": {"app": "web"}},
            "policyTypes": ["Ingress"],
        }));
        for (endpoint, direction, expected) in [
            (&web, PolicyType::Ingress, true),
            (&web, PolicyType::Egress, false),
            (&db, PolicyType::Ingress, false),
        ] {
            let applies = applies_to(&snapshot, endpoint, &ingress_for_web, direction)
                .await
                .unwrap();
            assert_eq!(applies, expected, "{endpoint} {direction}");
        }
    }

    #[tokio::test]
    async fn rules_imply_direction() {
        let snapshot = snapshot();
        let web = Endpoint::pod("ns", "web");

        // No policyTypes: egress rules give the policy an egress opinion, and the absent ingress
        // list leaves ingress alone.
        let egress_rules = policy(serde_json::json!({
            "egress": [{"to": [{"podSelector": {}}]}],
        }));
        assert!(applies_to(&snapshot, &web, &egress_rules, PolicyType::Egress)
            .await
            .unwrap());
        assert!(!applies_to(&snapshot, &web, &egress_rules, PolicyType::Ingress)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_endpoint() {
        let snapshot = snapshot();
        let err = applies_to(
            &snapshot,
            &Endpoint::pod("ns", "gone"),
            &policy(serde_json::json!({"policyTypes": ["Ingress"]})),
            PolicyType::Ingress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "{err}");
    }
}
