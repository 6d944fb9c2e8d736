use super::*;
use crate::Error;

const NAMESPACES: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: shop
  labels:
    team: shop
---
apiVersion: v1
kind: Namespace
metadata:
  name: payments
  labels:
    team: payments
---
apiVersion: v1
kind: Namespace
metadata:
  name: billing
  labels:
    team: billing
---
apiVersion: v1
kind: Pod
metadata:
  name: web
  namespace: shop
  labels:
    app: web
---
apiVersion: v1
kind: Pod
metadata:
  name: frontend
  namespace: shop
  labels:
    role: frontend
---
apiVersion: v1
kind: Pod
metadata:
  name: backend
  namespace: shop
  labels:
    role: backend
---
apiVersion: v1
kind: Pod
metadata:
  name: api
  namespace: payments
  labels:
    role: frontend
status:
  podIP: 10.1.0.5
---
apiVersion: v1
kind: Pod
metadata:
  name: api
  namespace: billing
  labels:
    role: frontend
status:
  podIP: 10.2.0.5
"#;

fn with_policies(policies: &str) -> SharedSnapshot {
    snapshot(&format!("{NAMESPACES}---\n{policies}"))
}

const WEB_FROM_FRONTEND: &str = r#"
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: web-from-frontend
  namespace: shop
spec:
  podSelector:
    matchLabels:
      app: web
  policyTypes: [Ingress]
  ingress:
    - from:
        - podSelector:
            matchLabels:
              role: frontend
"#;

#[tokio::test]
async fn no_policies_allow_everything() {
    let snapshot = snapshot(NAMESPACES);
    let verdict = test(&snapshot, "payments/pod/api", "shop/pod/web").await;
    assert!(verdict.allowed);
    assert!(!verdict.egress.isolated);
    assert!(!verdict.ingress.isolated);
}

#[tokio::test]
async fn ingress_allowed_from_selected_pod() {
    let snapshot = with_policies(WEB_FROM_FRONTEND);
    let verdict = test(&snapshot, "shop/pod/frontend", "shop/pod/web").await;
    assert!(verdict.allowed);
    assert!(verdict.ingress.isolated);
    assert_eq!(verdict.ingress.policies.len(), 1);
    assert_eq!(verdict.ingress.policies[0].name, "web-from-frontend");
    assert!(verdict.ingress.policies[0].allowed);
}

#[tokio::test]
async fn ingress_denied_from_unselected_pod() {
    let snapshot = with_policies(WEB_FROM_FRONTEND);
    let verdict = test(&snapshot, "shop/pod/backend", "shop/pod/web").await;
    assert!(!verdict.allowed);
    assert!(verdict.ingress.isolated);
    assert!(!verdict.ingress.allowed);
    assert!(!verdict.egress.isolated, "egress is unaffected");

    // A pod selector only selects pods in the policy's own namespace.
    let verdict = test(&snapshot, "payments/pod/api", "shop/pod/web").await;
    assert!(!verdict.allowed);
}

#[tokio::test]
async fn declared_ingress_without_rules_denies_all() {
    for policy in [
        "kind: NetworkPolicy\nmetadata: {name: deny, namespace: shop}\nspec: {policyTypes: [Ingress]}\n",
        "kind: NetworkPolicy\nmetadata: {name: deny, namespace: shop}\nspec: {policyTypes: [Ingress], ingress: []}\n",
    ] {
        let snapshot = with_policies(policy);
        for source in ["shop/pod/frontend", "shop/pod/backend", "payments/pod/api"] {
            let verdict = test(&snapshot, source, "shop/pod/web").await;
            assert!(!verdict.allowed, "{source} must be denied");
        }
    }
}

#[tokio::test]
async fn undeclared_empty_rules_do_not_isolate() {
    let snapshot = with_policies(
        "kind: NetworkPolicy\nmetadata: {name: noop, namespace: shop}\nspec: {ingress: []}\n",
    );
    let verdict = test(&snapshot, "shop/pod/backend", "shop/pod/web").await;
    assert!(verdict.allowed);
    assert!(!verdict.ingress.isolated);
}

const WEB_FROM_PAYMENTS_FRONTEND: &str = r#"
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: web-from-payments-frontend
  namespace: shop
spec:
  podSelector:
    matchLabels:
      app: web
  policyTypes: [Ingress]
  ingress:
    - from:
        - namespaceSelector:
            matchLabels:
              team: payments
          podSelector:
            matchLabels:
              role: frontend
"#;

#[tokio::test]
async fn compound_peer_requires_namespace_and_pod() {
    let snapshot = with_policies(WEB_FROM_PAYMENTS_FRONTEND);

    // The same labels in a namespace that does not match.
    let verdict = test(&snapshot, "billing/pod/api", "shop/pod/web").await;
    assert!(!verdict.allowed);

    // A matching pod in the home namespace is not enough either.
    let verdict = test(&snapshot, "shop/pod/frontend", "shop/pod/web").await;
    assert!(!verdict.allowed);

    let verdict = test(&snapshot, "payments/pod/api", "shop/pod/web").await;
    assert!(verdict.allowed);
}

#[tokio::test]
async fn namespace_peer_allows_every_pod_in_namespace() {
    let snapshot = with_policies(
        r#"
kind: NetworkPolicy
metadata: {name: from-payments, namespace: shop}
spec:
  podSelector: {}
  ingress:
    - from:
        - namespaceSelector:
            matchExpressions:
              - {key: team, operator: In, values: [payments]}
"#,
    );
    assert!(test(&snapshot, "payments/pod/api", "shop/pod/web").await.allowed);
    assert!(!test(&snapshot, "billing/pod/api", "shop/pod/web").await.allowed);
    // The policy also isolates every pod in its own namespace.
    assert!(!test(&snapshot, "shop/pod/web", "shop/pod/backend").await.allowed);
}

#[tokio::test]
async fn unrelated_policy_does_not_isolate() {
    let snapshot = with_policies(
        "kind: NetworkPolicy\nmetadata: {name: db, namespace: shop}\nspec: {podSelector: {matchLabels: {app: db}}, policyTypes: [Ingress, Egress]}\n",
    );
    let verdict = test(&snapshot, "shop/pod/backend", "shop/pod/web").await;
    assert!(verdict.allowed);
    assert!(!verdict.egress.isolated);
    assert!(!verdict.ingress.isolated);
}

#[tokio::test]
async fn any_selecting_policy_may_allow() {
    let snapshot = with_policies(&format!(
        "{WEB_FROM_FRONTEND}---\nkind: NetworkPolicy\nmetadata: {{name: deny, namespace: shop}}\nspec: {{policyTypes: [Ingress]}}\n"
    ));
    let verdict = test(&snapshot, "shop/pod/frontend", "shop/pod/web").await;
    assert!(verdict.allowed);
    assert_eq!(verdict.ingress.policies.len(), 2);
    assert_eq!(
        verdict
            .ingress
            .policies
            .iter()
            .filter(|p| p.allowed)
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>(),
        vec!["web-from-frontend"]
    );

    let verdict = test(&snapshot, "shop/pod/backend", "shop/pod/web").await;
    assert!(!verdict.allowed);
}

#[tokio::test]
async fn egress_is_evaluated_on_the_source() {
    let snapshot = with_policies(
        r#"
kind: NetworkPolicy
metadata: {name: frontend-egress, namespace: shop}
spec:
  podSelector:
    matchLabels: {role: frontend}
  policyTypes: [Egress]
  egress:
    - to:
        - podSelector:
            matchLabels: {app: web}
"#,
    );
    let verdict = test(&snapshot, "shop/pod/frontend", "shop/pod/web").await;
    assert!(verdict.allowed);
    assert!(verdict.egress.isolated);
    assert!(!verdict.ingress.isolated);

    let verdict = test(&snapshot, "shop/pod/frontend", "shop/pod/backend").await;
    assert!(!verdict.allowed);

    // Connectivity is directional: the reverse path is not restricted.
    let verdict = test(&snapshot, "shop/pod/backend", "shop/pod/frontend").await;
    assert!(verdict.allowed);
}

#[tokio::test]
async fn both_sides_must_allow() {
    let snapshot = with_policies(&format!(
        "{WEB_FROM_FRONTEND}---\nkind: NetworkPolicy\nmetadata: {{name: deny-egress, namespace: shop}}\nspec: {{podSelector: {{matchLabels: {{role: frontend}}}}, policyTypes: [Egress]}}\n"
    ));
    let verdict = test(&snapshot, "shop/pod/frontend", "shop/pod/web").await;
    assert!(verdict.ingress.allowed);
    assert!(!verdict.egress.allowed);
    assert!(!verdict.allowed);
}

#[tokio::test]
async fn ip_block_peers_match_pod_addresses() {
    let snapshot = with_policies(
        r#"
kind: NetworkPolicy
metadata: {name: from-network, namespace: shop}
spec:
  podSelector:
    matchLabels: {app: web}
  ingress:
    - from:
        - ipBlock:
            cidr: 10.0.0.0/8
            except: [10.2.0.0/16]
"#,
    );
    assert!(test(&snapshot, "payments/pod/api", "shop/pod/web").await.allowed);
    assert!(!test(&snapshot, "billing/pod/api", "shop/pod/web").await.allowed);
    // No address is known for this pod.
    assert!(!test(&snapshot, "shop/pod/frontend", "shop/pod/web").await.allowed);
}

#[tokio::test]
async fn evaluation_is_idempotent() {
    let snapshot = with_policies(WEB_FROM_PAYMENTS_FRONTEND);
    let first = test(&snapshot, "payments/pod/api", "shop/pod/web").await;
    let second = test(&snapshot, "payments/pod/api", "shop/pod/web").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_endpoints_are_errors() {
    let snapshot = snapshot(NAMESPACES);
    let simulator = Simulator::shared(snapshot, LookupPolicy::Lenient);

    let err = simulator
        .test_connectivity(&endpoint("shop/pod/gone"), &endpoint("shop/pod/web"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(ref e) if e.name == "gone"), "{err}");
    assert_eq!(err.to_string(), "shop/pod/gone not found");

    let err = simulator
        .test_connectivity(&endpoint("shop/pod/web"), &endpoint("pod/web"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(ref e) if e.namespace == "default"), "{err}");
}

#[tokio::test]
async fn malformed_selectors_are_fatal() {
    let snapshot = with_policies(
        r#"
kind: NetworkPolicy
metadata: {name: broken, namespace: shop}
spec:
  podSelector:
    matchLabels: {app: web}
  ingress:
    - from:
        - podSelector:
            matchExpressions:
              - {key: role, values: [frontend]}
"#,
    );
    let err = Simulator::shared(snapshot, LookupPolicy::Lenient)
        .test_connectivity(&endpoint("shop/pod/frontend"), &endpoint("shop/pod/web"))
        .await
        .unwrap_err();
    match err {
        Error::InvalidSelector { policy, .. } => assert_eq!(policy, "shop/broken"),
        err => panic!("unexpected error: {err}"),
    }
}
