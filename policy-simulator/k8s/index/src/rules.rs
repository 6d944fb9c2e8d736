//! Evaluates a single policy's rules for one direction.

use crate::{peer::PeerResolver, Error, Remote};
use netpol_simulator_core::DiscoverWorkloads;
use netpol_simulator_k8s_api::policy::{NetworkPolicy, PolicyType};
use tracing::{instrument, trace};

/// Indicates whether `policy` permits traffic with `remote` in `direction`.
///
/// - A policy without rules for the direction allows nothing if it explicitly declares the
///   direction in `policyTypes`, and has no opinion (allows) otherwise.
/// - A rule with no peers matches every remote.
/// - Otherwise the policy allows iff some peer of some rule, resolved relative to `home`, contains
///   the remote.
#[instrument(skip_all, fields(policy = %policy.name(), %direction, remote = %remote.endpoint))]
pub async fn policy_allows<W>(
    resolver: &PeerResolver<'_, W>,
    policy: &NetworkPolicy,
    home: &str,
    direction: PolicyType,
    remote: &Remote,
    warnings: &mut Vec<String>,
) -> Result<bool, Error>
where
    W: DiscoverWorkloads + Send + Sync,
{
    let rules = policy.spec.rules(direction).unwrap_or_default();
    if rules.is_empty() {
        let allowed = !policy.spec.declares_type(direction);
        trace!(allowed, "No rules");
        return Ok(allowed);
    }

    for (i, peers) in rules.into_iter().enumerate() {
        if peers.is_empty() {
            trace!(rule = i, "Rule matches all peers");
            return Ok(true);
        }

        for peer in peers {
            let resolved = resolver.resolve(policy, peer, home, warnings).await?;
            if resolved.iter().any(|r| r.contains(remote)) {
                trace!(rule = i, ?peer, "Peer contains remote");
                return Ok(true);
            }
        }
    }

    trace!("No rule matched");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LookupPolicy, Snapshot};
    use netpol_simulator_core::Endpoint;

    fn policy(spec: serde_json::Value) -> NetworkPolicy {
        serde_json::from_value(serde_json::json!({
            "metadata": {"name": "test", "namespace": "ns"},
            "spec": spec,
        }))
        .expect("policy must parse")
    }

    fn remote(name: &str) -> Remote {
        Remote {
            endpoint: Endpoint::pod("ns", name),
            ips: vec![],
        }
    }

    async fn allows(snapshot: &Snapshot, policy: &NetworkPolicy, remote: &Remote) -> bool {
        let resolver = PeerResolver::new(snapshot, LookupPolicy::Strict);
        let mut warnings = vec![];
        let allowed = policy_allows(
            &resolver,
            policy,
            "ns",
            PolicyType::Ingress,
            remote,
            &mut warnings,
        )
        .await
        .expect("evaluation must succeed");
        assert!(warnings.is_empty(), "{warnings:?}");
        allowed
    }

    fn snapshot() -> Snapshot {
        Snapshot::default()
            .with_pod("ns", "frontend", Some(("role", "frontend")), None)
            .with_pod("ns", "backend", Some(("role", "backend")), None)
    }

    #[tokio::test]
    async fn declared_without_rules_denies() {
        let snapshot = snapshot();
        let absent = policy(serde_json::json!({"policyTypes": ["Ingress"]}));
        assert!(!allows(&snapshot, &absent, &remote("frontend")).await);

        let empty = policy(serde_json::json!({"policyTypes": ["Ingress"], "ingress": []}));
        assert!(!allows(&snapshot, &empty, &remote("frontend")).await);
    }

    #[tokio::test]
    async fn undeclared_without_rules_has_no_opinion() {
        let snapshot = snapshot();
        let policy = policy(serde_json::json!({"policyTypes": ["Egress"], "ingress": []}));
        assert!(allows(&snapshot, &policy, &remote("frontend")).await);
    }

    #[tokio::test]
    async fn empty_rule_matches_everything() {
        let snapshot = snapshot();
        let policy = policy(serde_json::json!({"ingress": [{}]}));
        assert!(allows(&snapshot, &policy, &remote("backend")).await);
    }

    #[tokio::test]
    async fn rules_and_peers_are_alternatives() {
        let snapshot = snapshot();
        let policy = policy(serde_json::json!({
            "ingress": [
                {"from": [{"podSelector": {"matchLabels": {"role": "db"}}}]},
                {"from": [
                    {"podSelector": {"matchLabels": {"role": "cache"}}},
                    {"podSelector": {"matchLabels": {"role": "frontend"}}},
                ]},
            ],
        }));
        assert!(allows(&snapshot, &policy, &remote("frontend")).await);
        assert!(!allows(&snapshot, &policy, &remote("backend")).await);
    }
}
