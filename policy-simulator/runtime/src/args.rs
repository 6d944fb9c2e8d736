use crate::{
    core::Endpoint,
    index::{LookupPolicy, Simulator, Snapshot},
    validation::validate_manifests,
    ClusterLookup, GraphOutput, Output,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "netpol-simulator",
    about = "Evaluates Kubernetes NetworkPolicy connectivity"
)]
pub struct Args {
    #[clap(long, default_value = "netpol=info,warn", env = "NETPOL_SIMULATOR_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tests whether SOURCE may open a connection to DESTINATION.
    ///
    /// Endpoints are written as `[namespace/]kind/name`.
    Test {
        source: Endpoint,

        destination: Endpoint,

        /// Reads namespaces, pods, and policies from a manifest file instead of the cluster.
        #[clap(long)]
        manifests: Option<PathBuf>,

        /// How failed lookups affect the verdict: `lenient` reports them as warnings and treats
        /// them as empty, `strict` fails.
        #[clap(long, default_value = "lenient")]
        lookup_failures: LookupPolicy,

        #[clap(long, default_value = "plain")]
        output: Output,
    },

    /// Evaluates connectivity between every pair of pods in NAMESPACE.
    Visualize {
        namespace: String,

        /// Reads namespaces, pods, and policies from a manifest file instead of the cluster.
        #[clap(long)]
        manifests: Option<PathBuf>,

        #[clap(long, default_value = "lenient")]
        lookup_failures: LookupPolicy,

        /// One of `plain`, `dot` (Graphviz), or `json`.
        #[clap(long, default_value = "plain")]
        format: GraphOutput,
    },

    /// Checks a manifest file for NetworkPolicy mistakes.
    Validate { file: PathBuf },
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            command,
        } = self;

        log_format.try_init(log_level)?;

        match command {
            Command::Test {
                source,
                destination,
                manifests,
                lookup_failures,
                output,
            } => {
                let verdict = match manifests {
                    Some(path) => {
                        let snapshot = Arc::new(Snapshot::from_manifests(&read(&path).await?)?);
                        let simulator = Simulator::shared(snapshot, lookup_failures);
                        simulator.test_connectivity(&source, &destination).await?
                    }
                    None => {
                        let client = client.try_client().await?;
                        let simulator =
                            Simulator::shared(ClusterLookup::new(client), lookup_failures);
                        simulator.test_connectivity(&source, &destination).await?
                    }
                };
                info!(
                    %source,
                    %destination,
                    allowed = verdict.allowed,
                    warnings = verdict.warnings.len(),
                    "Evaluated connectivity"
                );
                output.write(&verdict, std::io::stdout().lock())
            }

            Command::Visualize {
                namespace,
                manifests,
                lookup_failures,
                format,
            } => {
                let topology = match manifests {
                    Some(path) => {
                        let snapshot = Arc::new(Snapshot::from_manifests(&read(&path).await?)?);
                        let simulator = Simulator::shared(snapshot, lookup_failures);
                        simulator.namespace_topology(&namespace).await?
                    }
                    None => {
                        let client = client.try_client().await?;
                        let simulator =
                            Simulator::shared(ClusterLookup::new(client), lookup_failures);
                        simulator.namespace_topology(&namespace).await?
                    }
                };
                if topology.pods.is_empty() {
                    warn!(%namespace, "No pods found");
                }
                info!(
                    %namespace,
                    pods = topology.pods.len(),
                    allowed = topology.allowed().count(),
                    warnings = topology.warnings.len(),
                    "Evaluated namespace"
                );
                format.write(&topology, std::io::stdout().lock())
            }

            Command::Validate { file } => {
                let issues = validate_manifests(&read(&file).await?);
                if issues.is_empty() {
                    println!("✓ All documents are valid");
                    return Ok(());
                }

                println!("Manifests have potential issues:");
                for issue in &issues {
                    println!("  {issue}");
                }
                bail!("{} issue(s) found in {}", issues.len(), file.display())
            }
        }
    }
}

async fn read(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Reading manifests");
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}
