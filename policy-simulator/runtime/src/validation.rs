use crate::k8s::{
    policy::{NetworkPolicy, PolicyType},
    InvalidSelector,
};
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

const PROTOCOLS: [&str; 3] = ["TCP", "UDP", "SCTP"];
const REQUIRED_FIELDS: [&str; 4] = ["apiVersion", "kind", "metadata", "spec"];
const PEER_FIELDS: [&str; 6] = [
    "podSelector",
    "pod_selector",
    "namespaceSelector",
    "namespace_selector",
    "ipBlock",
    "ip_block",
];

/// A problem found in a manifest stream, located by its 1-based document index.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("document {document}: {kind}")]
pub struct Issue {
    pub document: usize,
    pub kind: IssueKind,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IssueKind {
    #[error("YAML validation error: {0}")]
    Yaml(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("empty spec in NetworkPolicy")]
    EmptySpec,

    #[error("missing podSelector in spec")]
    MissingPodSelector,

    #[error("{direction} rule {rule}: port specification missing port number")]
    MissingPort { direction: PolicyType, rule: usize },

    #[error("{direction} rule {rule}: invalid protocol {protocol}")]
    InvalidProtocol {
        direction: PolicyType,
        rule: usize,
        protocol: String,
    },

    #[error("{direction} rule {rule}: peer missing selector")]
    PeerMissingSelector { direction: PolicyType, rule: usize },

    #[error("invalid NetworkPolicy: {0}")]
    Malformed(String),

    #[error("{0}")]
    InvalidSelector(#[from] InvalidSelector),

    #[error("{0} missing required metadata.name field")]
    MissingName(&'static str),
}

/// Checks a multi-document manifest stream for common mistakes.
///
/// `NetworkPolicy` documents are checked structurally and must parse into the policy model with
/// well-formed selectors. `Namespace`, `Pod`, and `NetworkPolicy` documents must be named. Other
/// documents are ignored. Parsing stops at the first document that is not valid YAML.
pub fn validate_manifests(yaml: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (i, doc) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let document = i + 1;
        let value = match Value::deserialize(doc) {
            Ok(value) => value,
            Err(error) => {
                issues.push(Issue {
                    document,
                    kind: IssueKind::Yaml(error.to_string()),
                });
                break;
            }
        };

        let kinds = match value.get("kind").and_then(Value::as_str) {
            Some(NetworkPolicy::KIND) => {
                // A missing metadata block is reported as a missing field.
                let mut kinds = match value.get("metadata") {
                    Some(_) => validate_named(NetworkPolicy::KIND, &value),
                    None => Vec::new(),
                };
                kinds.extend(validate_policy(value));
                kinds
            }
            Some("Namespace") => validate_named("Namespace", &value),
            Some("Pod") => validate_named("Pod", &value),
            _ => Vec::new(),
        };
        issues.extend(kinds.into_iter().map(|kind| Issue { document, kind }));
    }
    issues
}

fn validate_named(kind: &'static str, doc: &Value) -> Vec<IssueKind> {
    let named = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .is_some_and(|n| !n.is_empty());
    if named {
        Vec::new()
    } else {
        vec![IssueKind::MissingName(kind)]
    }
}

fn validate_policy(doc: Value) -> Vec<IssueKind> {
    let mut issues = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| doc.get(field).is_none())
        .map(IssueKind::MissingField)
        .collect::<Vec<_>>();
    if !issues.is_empty() {
        return issues;
    }

    let spec = match doc.get("spec") {
        Some(Value::Mapping(spec)) if !spec.is_empty() => spec,
        _ => return vec![IssueKind::EmptySpec],
    };

    if !spec.contains_key("podSelector") && !spec.contains_key("pod_selector") {
        issues.push(IssueKind::MissingPodSelector);
    }

    for (direction, rules_key, peer_keys) in [
        (PolicyType::Ingress, "ingress", &["from", "_from"][..]),
        (PolicyType::Egress, "egress", &["to"][..]),
    ] {
        let rules = spec
            .get(rules_key)
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (i, rule) in rules.iter().enumerate() {
            validate_rule(direction, i + 1, rule, peer_keys, &mut issues);
        }
    }

    // Structural problems would only resurface as parse errors.
    if !issues.is_empty() {
        return issues;
    }

    match serde_yaml::from_value::<NetworkPolicy>(doc) {
        Ok(policy) => issues.extend(
            policy
                .spec
                .selectors()
                .filter_map(|s| s.validate().err())
                .map(IssueKind::from),
        ),
        Err(error) => issues.push(IssueKind::Malformed(error.to_string())),
    }
    issues
}

fn validate_rule(
    direction: PolicyType,
    rule: usize,
    doc: &Value,
    peer_keys: &[&str],
    issues: &mut Vec<IssueKind>,
) {
    let ports = doc.get("ports").and_then(Value::as_sequence);
    for port in ports.into_iter().flatten() {
        if port.get("port").is_none() {
            issues.push(IssueKind::MissingPort { direction, rule });
        }
        if let Some(protocol) = port.get("protocol") {
            let valid = protocol.as_str().is_some_and(|p| PROTOCOLS.contains(&p));
            if !valid {
                issues.push(IssueKind::InvalidProtocol {
                    direction,
                    rule,
                    protocol: render(protocol),
                });
            }
        }
    }

    let peers = peer_keys
        .iter()
        .find_map(|k| doc.get(*k))
        .and_then(Value::as_sequence);
    for peer in peers.into_iter().flatten() {
        if !PEER_FIELDS.iter().any(|k| peer.get(*k).is_some()) {
            issues.push(IssueKind::PeerMissingSelector { direction, rule });
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        value => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
