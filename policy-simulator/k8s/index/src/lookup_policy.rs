use crate::Error;
use anyhow::anyhow;
use tracing::warn;

/// Determines how a failed peer lookup affects an evaluation.
///
/// Lookups that decide whether the local endpoint is isolated always fail the evaluation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LookupPolicy {
    /// The failed lookup is treated as returning nothing and recorded as a warning on the verdict.
    /// Connectivity may be under-reported, since a peer that resolves to nothing matches no one.
    #[default]
    Lenient,

    /// The evaluation fails.
    Strict,
}

// === impl LookupPolicy ===

impl LookupPolicy {
    /// Applies the policy to a failed lookup, returning an empty result when lenient.
    pub(crate) fn recover<T: Default>(
        self,
        error: anyhow::Error,
        context: String,
        warnings: &mut Vec<String>,
    ) -> Result<T, Error> {
        match self {
            Self::Strict => Err(Error::Lookup(error.context(context))),
            Self::Lenient => {
                warn!(error = %format_args!("{error:#}"), "{context}");
                warnings.push(format!("{context}: {error:#}"));
                Ok(T::default())
            }
        }
    }
}

impl std::str::FromStr for LookupPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            s => Err(anyhow!("invalid lookup policy: {:?}", s)),
        }
    }
}

impl std::fmt::Display for LookupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lenient => "lenient".fmt(f),
            Self::Strict => "strict".fmt(f),
        }
    }
}
