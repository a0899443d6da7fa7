use crate::error::DistributionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selects how states are drawn from a [`super::DiscreteDistribution`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SampleMethod {
    /// Independent inverse-transform draws, one linear scan per draw.
    #[default]
    Default,
    /// Sorted uniforms built from order statistics, resolved in one forward sweep.
    #[serde(alias = "ripley")]
    OrderStatistics,
}

impl SampleMethod {
    pub const ALL: [SampleMethod; 2] = [SampleMethod::Default, SampleMethod::OrderStatistics];

    pub const fn name(self) -> &'static str {
        match self {
            SampleMethod::Default => "default",
            SampleMethod::OrderStatistics => "order_statistics",
        }
    }
}

impl fmt::Display for SampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleMethod {
    type Err = DistributionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(SampleMethod::Default),
            "order_statistics" | "ripley" => Ok(SampleMethod::OrderStatistics),
            other => Err(DistributionError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }
}
