use crate::core::{DirectionReport, Topology, Verdict};
use anyhow::{anyhow, Result};
use std::io::Write;

const ALLOW_COLOR: &str = "#48BB78";
const DENY_COLOR: &str = "#F56565";

/// How a verdict is written to the terminal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Output {
    #[default]
    Plain,
    Json,
}

// === impl Output ===

impl Output {
    pub fn write(self, verdict: &Verdict, mut out: impl Write) -> Result<()> {
        match self {
            Self::Json => {
                serde_json::to_writer_pretty(&mut out, verdict)?;
                writeln!(out)?;
            }
            Self::Plain => {
                if verdict.allowed {
                    writeln!(out, "✓ Traffic is allowed")?;
                } else {
                    writeln!(out, "✗ Traffic is blocked")?;
                }
                write_direction(&mut out, "egress", &verdict.egress)?;
                write_direction(&mut out, "ingress", &verdict.ingress)?;
                for warning in &verdict.warnings {
                    writeln!(out, "warning: {warning}")?;
                }
            }
        }
        Ok(())
    }
}

fn write_direction(out: &mut impl Write, name: &str, report: &DirectionReport) -> Result<()> {
    if !report.isolated {
        writeln!(out, "  {name} of {}: not isolated", report.endpoint)?;
        return Ok(());
    }

    let outcome = if report.allowed { "allowed" } else { "blocked" };
    writeln!(out, "  {name} of {}: {outcome}", report.endpoint)?;
    for policy in &report.policies {
        let decision = if policy.allowed { "allows" } else { "does not allow" };
        writeln!(out, "    {} {decision}", policy.name)?;
    }
    Ok(())
}

/// How a namespace topology is written to the terminal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GraphOutput {
    /// One line per ordered pair of pods.
    #[default]
    Plain,

    /// A Graphviz digraph with allowed edges in green and blocked edges dashed in red.
    Dot,

    Json,
}

// === impl GraphOutput ===

impl GraphOutput {
    pub fn write(self, topology: &Topology, mut out: impl Write) -> Result<()> {
        match self {
            Self::Json => {
                serde_json::to_writer_pretty(&mut out, topology)?;
                writeln!(out)?;
            }
            Self::Plain => {
                writeln!(
                    out,
                    "Namespace {}: {} pods, {} of {} connections allowed",
                    topology.namespace,
                    topology.pods.len(),
                    topology.allowed().count(),
                    topology.edges.len(),
                )?;
                for edge in &topology.edges {
                    let outcome = if edge.allowed { "allowed" } else { "blocked" };
                    writeln!(out, "  {} -> {}: {outcome}", edge.source, edge.destination)?;
                }
                for warning in &topology.warnings {
                    writeln!(out, "warning: {warning}")?;
                }
            }
            Self::Dot => {
                writeln!(out, "digraph \"{}\" {{", topology.namespace)?;
                for warning in &topology.warnings {
                    writeln!(out, "  // warning: {warning}")?;
                }
                for pod in &topology.pods {
                    writeln!(out, "  \"{pod}\" [label=\"{}\"];", pod.name)?;
                }
                for edge in &topology.edges {
                    let attrs = if edge.allowed {
                        format!("color=\"{ALLOW_COLOR}\"")
                    } else {
                        format!("color=\"{DENY_COLOR}\", style=dashed")
                    };
                    writeln!(
                        out,
                        "  \"{}\" -> \"{}\" [{attrs}];",
                        edge.source, edge.destination
                    )?;
                }
                writeln!(out, "}}")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for GraphOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "dot" => Ok(Self::Dot),
            "json" => Ok(Self::Json),
            s => Err(anyhow!("invalid graph format: {:?}", s)),
        }
    }
}

impl std::fmt::Display for GraphOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => "plain".fmt(f),
            Self::Dot => "dot".fmt(f),
            Self::Json => "json".fmt(f),
        }
    }
}

impl std::str::FromStr for Output {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            s => Err(anyhow!("invalid output format: {:?}", s)),
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => "plain".fmt(f),
            Self::Json => "json".fmt(f),
        }
    }
}
