use netpol_simulator_core::Endpoint;
use netpol_simulator_k8s_api::{policy::NetworkPolicy, InvalidSelector};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source or destination does not exist; no verdict can be produced.
    #[error("{0} not found")]
    NotFound(Endpoint),

    /// A policy's rules cannot be interpreted.
    #[error("policy {policy} has an invalid selector: {source}")]
    InvalidSelector {
        policy: String,
        #[source]
        source: InvalidSelector,
    },

    /// Cluster state could not be read and lookups are configured to be strict.
    #[error("{0:#}")]
    Lookup(anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_selector(
        namespace: &str,
        policy: &NetworkPolicy,
        source: InvalidSelector,
    ) -> Self {
        Self::InvalidSelector {
            policy: format!("{namespace}/{}", policy.name()),
            source,
        }
    }
}

/// Fails if any selector in the policies is malformed.
pub(crate) fn validate_policies(namespace: &str, policies: &[NetworkPolicy]) -> Result<(), Error> {
    for policy in policies {
        for selector in policy.spec.selectors() {
            selector
                .validate()
                .map_err(|e| Error::invalid_selector(namespace, policy, e))?;
        }
    }
    Ok(())
}
