use crate::error::DistributionError;
use crate::pdf::DiscreteDistribution;
use serde::Serialize;

/// Summary of a belief suitable for structured logs and run reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosteriorMetrics {
    pub states: usize,
    pub map_state: usize,
    pub map_probability: f64,
    /// Shannon entropy in nats.
    pub entropy: f64,
    /// `exp(entropy)`: how many equally likely states would carry the same uncertainty.
    pub effective_states: f64,
}

impl PosteriorMetrics {
    pub fn from_distribution(
        distribution: &DiscreteDistribution,
    ) -> Result<Self, DistributionError> {
        let probabilities = distribution.normalized_probabilities()?;
        let map_state = distribution.most_probable_state()?;

        let mut entropy = 0.0_f64;
        for probability in &probabilities {
            if *probability > 0.0 {
                entropy -= probability * probability.ln();
            }
        }

        Ok(Self {
            states: probabilities.len(),
            map_state,
            map_probability: probabilities[map_state],
            entropy,
            effective_states: entropy.exp(),
        })
    }
}
