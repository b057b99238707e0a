use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Execution lane a step is routed through
///
/// Lanes isolate calls against the rate-limited source host from the
/// destination store and from catalog bookkeeping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Default,
    Source,
    Destination,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Default, Lane::Source, Lane::Destination];
}

impl Display for Lane {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Lane::Default => write!(f, "default"),
            Lane::Source => write!(f, "source"),
            Lane::Destination => write!(f, "destination"),
        }
    }
}

impl FromStr for Lane {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Lane::Default),
            "source" => Ok(Lane::Source),
            "destination" => Ok(Lane::Destination),
            _ => Err(anyhow::anyhow!("Invalid lane: {}", s)),
        }
    }
}
