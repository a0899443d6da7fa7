//! Discrete probability mass function with a cached cumulative table.

use super::SampleMethod;
use crate::error::DistributionError;
use rand::Rng;
use tracing::{trace, warn};

/// Maximum distance of the final cumulative entry from one before it is snapped to one.
pub const CUMULATIVE_TOLERANCE: f64 = 1e-5;

/// Probability mass over the states `0..N`.
///
/// The mass vector is stored unnormalized. Every mutation recomputes the normalizer and the
/// `N + 1` entry cumulative table used for inverse-transform sampling, so readers never see a
/// table that disagrees with the mass. When a mutation leaves no positive mass the previous
/// table is kept, the distribution is marked stale and queries fail with
/// [`DistributionError::Degenerate`] until a later mutation succeeds.
#[derive(Debug, Clone)]
pub struct DiscreteDistribution {
    mass: Vec<f64>,
    weight_sum: f64,
    cumulative: Vec<f64>,
    stale: Option<f64>,
}

impl DiscreteDistribution {
    /// Creates a uniform distribution over `num_states` states.
    ///
    /// # Panics
    ///
    /// Panics when `num_states` is zero. Use [`Self::from_probabilities`] for a checked
    /// constructor.
    pub fn new(num_states: usize) -> Self {
        assert!(num_states > 0, "a distribution needs at least one state");
        let share = 1.0 / num_states as f64;
        let mass = vec![share; num_states];
        let weight_sum = mass.iter().sum();
        let cumulative = (0..=num_states)
            .map(|index| index as f64 / num_states as f64)
            .collect();
        Self {
            mass,
            weight_sum,
            cumulative,
            stale: None,
        }
    }

    /// Creates a distribution from unnormalized weights.
    pub fn from_probabilities(mass: Vec<f64>) -> Result<Self, DistributionError> {
        if mass.is_empty() {
            return Err(DistributionError::NoStates);
        }
        let mut distribution = Self::new(mass.len());
        distribution.mass = mass;
        distribution.refresh()?;
        Ok(distribution)
    }

    pub fn state_count(&self) -> usize {
        self.mass.len()
    }

    /// Returns the (unnormalized) weight stored for `state`.
    pub fn probability_at(&self, state: usize) -> Result<f64, DistributionError> {
        self.check_index(state)?;
        self.ensure_fresh()?;
        Ok(self.mass[state])
    }

    /// Overwrites the weight of a single state and rebuilds the cumulative table.
    pub fn set_probability(&mut self, state: usize, value: f64) -> Result<(), DistributionError> {
        self.check_index(state)?;
        self.mass[state] = value;
        self.refresh()
    }

    /// Returns a copy of the mass vector.
    pub fn probabilities(&self) -> Vec<f64> {
        self.mass.clone()
    }

    /// Replaces the whole mass vector and rebuilds the cumulative table.
    pub fn set_probabilities(&mut self, values: &[f64]) -> Result<(), DistributionError> {
        if values.len() != self.mass.len() {
            return Err(DistributionError::DimensionMismatch {
                expected: self.mass.len(),
                actual: values.len(),
            });
        }
        self.mass.copy_from_slice(values);
        self.refresh()
    }

    pub(crate) fn mass(&self) -> &[f64] {
        &self.mass
    }

    /// Normalizer matching the current cumulative table.
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// The `N + 1` entry cumulative table: `cumulative[0] == 0`, `cumulative[N] == 1`.
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// True when the last mutation left no positive mass.
    pub fn is_stale(&self) -> bool {
        self.stale.is_some()
    }

    pub fn normalized_probabilities(&self) -> Result<Vec<f64>, DistributionError> {
        self.ensure_fresh()?;
        Ok(self.mass.iter().map(|mass| mass / self.weight_sum).collect())
    }

    /// State carrying the most mass; the lowest index wins ties.
    pub fn most_probable_state(&self) -> Result<usize, DistributionError> {
        self.ensure_fresh()?;
        let mut best = 0;
        for (state, mass) in self.mass.iter().enumerate().skip(1) {
            if *mass > self.mass[best] {
                best = state;
            }
        }
        Ok(best)
    }

    /// Draws a single state by inverting one uniform draw through the cumulative table.
    ///
    /// Only [`SampleMethod::Default`] is available for single draws.
    pub fn sample_one<R: Rng + ?Sized>(
        &self,
        method: SampleMethod,
        rng: &mut R,
    ) -> Result<usize, DistributionError> {
        match method {
            SampleMethod::Default => {
                self.ensure_fresh()?;
                let draw: f64 = rng.r#gen();
                Ok(self.locate(draw))
            }
            other => Err(DistributionError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }

    /// Draws `count` states.
    ///
    /// [`SampleMethod::Default`] repeats [`Self::sample_one`], costing `O(count * N)`.
    /// [`SampleMethod::OrderStatistics`] turns `count` uniforms into an ascending sequence and
    /// resolves them in a single forward sweep of the cumulative table, costing
    /// `O(count + N)`. Its output is sorted by state.
    pub fn sample_many<R: Rng + ?Sized>(
        &self,
        count: usize,
        method: SampleMethod,
        rng: &mut R,
    ) -> Result<Vec<usize>, DistributionError> {
        self.ensure_fresh()?;
        trace!(count, %method, states = self.mass.len(), "sampling states");
        match method {
            SampleMethod::Default => Ok((0..count)
                .map(|_| {
                    let draw: f64 = rng.r#gen();
                    self.locate(draw)
                })
                .collect()),
            SampleMethod::OrderStatistics => {
                let uniforms = ordered_uniforms(count, rng);
                let last = self.cumulative.len() - 1;
                let mut index = 1;
                Ok(uniforms
                    .iter()
                    .map(|&draw| {
                        while index < last && self.cumulative[index] <= draw {
                            index += 1;
                        }
                        index - 1
                    })
                    .collect())
            }
        }
    }

    /// Maps a uniform draw in `[0, 1)` to the state whose bucket contains it.
    ///
    /// Buckets are half-open: the answer is the first `k` with `cumulative[k + 1] > draw`.
    fn locate(&self, draw: f64) -> usize {
        // cumulative[0] is zero; starting at 1 keeps the answer a valid state even for draw == 0.
        let last = self.cumulative.len() - 1;
        let mut index = 1;
        while index < last && self.cumulative[index] <= draw {
            index += 1;
        }
        index - 1
    }

    fn refresh(&mut self) -> Result<(), DistributionError> {
        let weight_sum: f64 = self.mass.iter().sum();
        let has_negative = self.mass.iter().any(|mass| *mass < 0.0);
        if has_negative || weight_sum <= 0.0 || !weight_sum.is_finite() {
            warn!(
                weight_sum,
                has_negative,
                states = self.mass.len(),
                "probability mass is degenerate; keeping previous cumulative table"
            );
            self.stale = Some(weight_sum);
            return Err(DistributionError::Degenerate { weight_sum });
        }

        self.weight_sum = weight_sum;
        let mut running = 0.0;
        for (slot, mass) in self.cumulative[1..].iter_mut().zip(&self.mass) {
            running += mass / weight_sum;
            *slot = running;
        }

        let last = self.cumulative.len() - 1;
        debug_assert!(
            (self.cumulative[last] - 1.0).abs() <= CUMULATIVE_TOLERANCE,
            "cumulative table ends at {} instead of 1",
            self.cumulative[last]
        );
        self.cumulative[last] = 1.0;
        self.stale = None;
        Ok(())
    }

    fn check_index(&self, state: usize) -> Result<(), DistributionError> {
        if state < self.mass.len() {
            Ok(())
        } else {
            Err(DistributionError::OutOfRange {
                index: state,
                states: self.mass.len(),
            })
        }
    }

    /// Divides the mass by its normalizer. The cumulative table already describes the result,
    /// so only the stored mass and `weight_sum` change.
    pub(crate) fn rescale(&mut self) {
        if self.stale.is_some() {
            return;
        }
        let weight_sum = self.weight_sum;
        for mass in &mut self.mass {
            *mass /= weight_sum;
        }
        self.weight_sum = self.mass.iter().sum();
    }

    pub(crate) fn ensure_fresh(&self) -> Result<(), DistributionError> {
        match self.stale {
            Some(weight_sum) => Err(DistributionError::Degenerate { weight_sum }),
            None => Ok(()),
        }
    }
}

/// Produces `count` iid uniforms already sorted ascending.
///
/// The largest of `n` uniforms is distributed as `u^(1/n)`; given `u_(i+1)`, the next lower order
/// statistic is `u_(i+1) * u^(1/i)`.
fn ordered_uniforms<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<f64> {
    let mut uniforms: Vec<f64> = (0..count).map(|_| rng.r#gen::<f64>()).collect();
    let Some(last) = count.checked_sub(1) else {
        return uniforms;
    };
    uniforms[last] = uniforms[last].powf(1.0 / count as f64);
    for i in (0..last).rev() {
        uniforms[i] = uniforms[i].powf(1.0 / (i + 1) as f64) * uniforms[i + 1];
    }
    uniforms
}
