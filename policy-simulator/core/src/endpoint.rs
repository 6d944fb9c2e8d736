use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

/// The namespace an endpoint belongs to when one is not specified.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identifies a workload as `namespace/kind/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid endpoint {0:?}: expected [namespace/]kind/name")]
pub struct InvalidEndpoint(String);

// === impl Endpoint ===

impl Endpoint {
    pub fn new(namespace: impl ToString, kind: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    /// Shorthand for a pod endpoint.
    pub fn pod(namespace: impl ToString, name: impl ToString) -> Self {
        Self::new(namespace, "pod", name)
    }
}

impl FromStr for Endpoint {
    type Err = InvalidEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split('/').collect::<Vec<_>>();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(InvalidEndpoint(s.to_string()));
        }
        match parts[..] {
            [kind, name] => Ok(Self::new(DEFAULT_NAMESPACE, kind, name)),
            [namespace, kind, name] => Ok(Self::new(namespace, kind, name)),
            _ => Err(InvalidEndpoint(s.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(
            "ns-0/pod/web-0".parse::<Endpoint>(),
            Ok(Endpoint::pod("ns-0", "web-0"))
        );
        assert_eq!(
            "pod/web-0".parse::<Endpoint>(),
            Ok(Endpoint::pod(DEFAULT_NAMESPACE, "web-0")),
            "namespace defaults"
        );
        assert_eq!(
            "ns-0/deployment/web".parse::<Endpoint>().map(|e| e.kind),
            Ok("deployment".to_string())
        );

        for invalid in ["", "web-0", "/pod/web-0", "ns-0/pod/", "ns-0//web-0", "a/b/c/d"] {
            assert!(
                invalid.parse::<Endpoint>().is_err(),
                "{invalid:?} must not parse"
            );
        }
    }

    #[test]
    fn display() {
        let ep = "pod/web-0".parse::<Endpoint>().unwrap();
        assert_eq!(ep.to_string(), "default/pod/web-0");
        assert_eq!(ep.to_string().parse::<Endpoint>(), Ok(ep));
    }
}
