use crate::{
    applicability,
    error::validate_policies,
    peer::{PeerResolver, Remote},
    rules, Error, LookupPolicy,
};
use netpol_simulator_core::{
    DirectionReport, DiscoverPolicies, DiscoverWorkloads, Edge, Endpoint, PolicyDecision,
    ProbeExistence, Topology, Verdict,
};
use netpol_simulator_k8s_api::policy::{NetworkPolicy, Peer, PolicyType};
use tracing::{debug, info_span, instrument, Instrument};

/// Evaluates whether traffic between two endpoints is permitted by the policies in their
/// namespaces.
///
/// Each evaluation reads cluster state afresh through the collaborators.
#[derive(Clone, Debug)]
pub struct Simulator<W, P, E> {
    workloads: W,
    policies: P,
    probe: E,
    lookup_policy: LookupPolicy,
}

// === impl Simulator ===

impl<T: Clone> Simulator<T, T, T> {
    /// Uses a single source of cluster state for workloads, policies, and existence checks.
    pub fn shared(source: T, lookup_policy: LookupPolicy) -> Self {
        Self::new(source.clone(), source.clone(), source, lookup_policy)
    }
}

impl<W, P, E> Simulator<W, P, E> {
    pub fn new(workloads: W, policies: P, probe: E, lookup_policy: LookupPolicy) -> Self {
        Self {
            workloads,
            policies,
            probe,
            lookup_policy,
        }
    }
}

impl<W, P, E> Simulator<W, P, E>
where
    W: DiscoverWorkloads + Send + Sync,
    P: DiscoverPolicies + Send + Sync,
    E: ProbeExistence + Send + Sync,
{
    /// Determines whether `source` may open a connection to `destination`.
    ///
    /// Both endpoints must exist. The source's egress and the destination's ingress are evaluated
    /// concurrently; traffic is allowed when neither side is isolated, or when every isolated side
    /// permits it.
    #[instrument(skip_all, fields(%source, %destination))]
    pub async fn test_connectivity(
        &self,
        source: &Endpoint,
        destination: &Endpoint,
    ) -> Result<Verdict, Error> {
        self.ensure_exists(source).await?;
        self.ensure_exists(destination).await?;

        let ((egress, mut warnings), (ingress, ingress_warnings)) = futures::future::try_join(
            self.evaluate(source, destination, PolicyType::Egress)
                .instrument(info_span!("egress")),
            self.evaluate(destination, source, PolicyType::Ingress)
                .instrument(info_span!("ingress")),
        )
        .await?;
        warnings.extend(ingress_warnings);

        let allowed = if !egress.isolated && !ingress.isolated {
            debug!("Neither endpoint is isolated");
            true
        } else {
            egress.allowed && ingress.allowed
        };
        debug!(
            allowed,
            egress = egress.allowed,
            ingress = ingress.allowed,
            warnings = warnings.len(),
            "Evaluated"
        );

        Ok(Verdict {
            allowed,
            egress,
            ingress,
            warnings,
        })
    }

    /// Evaluates connectivity between every ordered pair of distinct pods in `namespace`.
    ///
    /// Failing to list the namespace's pods fails the call. Each pair is evaluated as by
    /// [`Self::test_connectivity`], so any evaluation error also fails the call.
    #[instrument(skip_all, fields(%namespace))]
    pub async fn namespace_topology(&self, namespace: &str) -> Result<Topology, Error> {
        let mut pods = self
            .workloads
            .list_workloads(namespace, None)
            .await
            .map_err(|error| {
                let context = format!("failed to list pods in namespace {namespace}");
                Error::Lookup(error.context(context))
            })?
            .into_iter()
            .map(|w| w.endpoint())
            .collect::<Vec<_>>();
        pods.sort_by(|a, b| a.name.cmp(&b.name));

        let mut edges = Vec::with_capacity(pods.len() * pods.len().saturating_sub(1));
        let mut warnings = Vec::<String>::new();
        for source in &pods {
            for destination in pods.iter().filter(|d| *d != source) {
                let verdict = self.test_connectivity(source, destination).await?;
                for warning in verdict.warnings {
                    if !warnings.contains(&warning) {
                        warnings.push(warning);
                    }
                }
                edges.push(Edge {
                    source: source.clone(),
                    destination: destination.clone(),
                    allowed: verdict.allowed,
                });
            }
        }
        debug!(
            pods = pods.len(),
            allowed = edges.iter().filter(|e| e.allowed).count(),
            "Evaluated namespace"
        );

        Ok(Topology {
            namespace: namespace.to_string(),
            pods,
            edges,
            warnings,
        })
    }

    async fn ensure_exists(&self, endpoint: &Endpoint) -> Result<(), Error> {
        match self.probe.exists(endpoint).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::NotFound(endpoint.clone())),
            Err(error) => Err(Error::Lookup(
                error.context(format!("failed to check whether {endpoint} exists")),
            )),
        }
    }

    /// Evaluates one side of the connection: whether `local` permits traffic with `remote` in
    /// `direction`, according to the policies in `local`'s namespace.
    async fn evaluate(
        &self,
        local: &Endpoint,
        remote: &Endpoint,
        direction: PolicyType,
    ) -> Result<(DirectionReport, Vec<String>), Error> {
        let mut warnings = Vec::new();
        let home = local.namespace.as_str();

        // Without the local namespace's policies or the local labels, isolation is unknown, so
        // these lookups fail the evaluation regardless of the lookup policy.
        let policies = self.policies.list_policies(home).await.map_err(|error| {
            Error::Lookup(error.context(format!("failed to list policies in namespace {home}")))
        })?;
        validate_policies(home, &policies)?;

        let selecting =
            applicability::selecting_policies(&self.workloads, local, &policies, direction)
                .await?;
        if selecting.is_empty() {
            return Ok((DirectionReport::unisolated(local.clone()), warnings));
        }

        let remote = self
            .remote(remote, &selecting, direction, &mut warnings)
            .await?;
        let resolver = PeerResolver::new(&self.workloads, self.lookup_policy);
        let mut decisions = Vec::with_capacity(selecting.len());
        for policy in selecting {
            let allowed =
                rules::policy_allows(&resolver, policy, home, direction, &remote, &mut warnings)
                    .await?;
            decisions.push(PolicyDecision {
                name: policy.name().to_string(),
                allowed,
            });
        }

        let report = DirectionReport {
            endpoint: local.clone(),
            isolated: true,
            allowed: decisions.iter().any(|d| d.allowed),
            policies: decisions,
        };
        Ok((report, warnings))
    }

    /// Describes the remote endpoint, reading its addresses only if an `ipBlock` peer could need
    /// them.
    async fn remote(
        &self,
        endpoint: &Endpoint,
        policies: &[&NetworkPolicy],
        direction: PolicyType,
        warnings: &mut Vec<String>,
    ) -> Result<Remote, Error> {
        let needs_ips = policies.iter().any(|p| {
            p.spec
                .rules(direction)
                .into_iter()
                .flatten()
                .flatten()
                .any(|peer| matches!(peer, Peer::IpBlock(_)))
        });
        if !needs_ips {
            return Ok(Remote {
                endpoint: endpoint.clone(),
                ips: Vec::new(),
            });
        }

        let ips = match self
            .workloads
            .get_workload(&endpoint.namespace, &endpoint.name)
            .await
        {
            Ok(workload) => workload.map(|w| w.ips).unwrap_or_default(),
            Err(error) => self.lookup_policy.recover(
                error,
                format!("failed to read the addresses of {endpoint}"),
                warnings,
            )?,
        };
        Ok(Remote {
            endpoint: endpoint.clone(),
            ips,
        })
    }
}
