//! Transition and likelihood models consumed by the histogram filter.
//!
//! The filter only reads models; each exposes one probability query taking an optional extra
//! argument plus a capability flag saying whether that argument is ever needed.

use crate::error::ModelError;

/// Stochastic state-transition model `P(to | from[, control])`.
pub trait TransitionModel {
    /// True when the model ignores the control input.
    fn without_inputs(&self) -> bool;

    /// Probability of moving to `to` from `from`. `control` is `None` for models that
    /// report [`Self::without_inputs`].
    fn probability(&self, to: usize, from: usize, control: Option<usize>) -> f64;
}

/// Observation likelihood model `P(z | state[, sensor])`.
pub trait LikelihoodModel<Z: ?Sized> {
    /// True when the model ignores the sensor parameter.
    fn without_sensor_params(&self) -> bool;

    fn likelihood(&self, observation: &Z, state: usize, sensor: Option<usize>) -> f64;
}

/// Dense transition matrix stored row-per-source: `rows[from][to]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    states: usize,
    entries: Vec<f64>,
}

impl TransitionMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, ModelError> {
        let states = rows.len();
        if states == 0 {
            return Err(ModelError::Empty);
        }
        let mut entries = Vec::with_capacity(states * states);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != states {
                return Err(ModelError::NotSquare {
                    rows: states,
                    row,
                    cols: values.len(),
                });
            }
            for (col, value) in values.into_iter().enumerate() {
                check_probability(row, col, value)?;
                entries.push(value);
            }
        }
        Ok(Self { states, entries })
    }

    /// The transition that leaves every state where it is.
    pub fn identity(states: usize) -> Self {
        let mut entries = vec![0.0; states * states];
        for state in 0..states {
            entries[state * states + state] = 1.0;
        }
        Self { states, entries }
    }

    pub fn states(&self) -> usize {
        self.states
    }

    fn entry(&self, to: usize, from: usize) -> f64 {
        if to >= self.states || from >= self.states {
            return 0.0;
        }
        self.entries[from * self.states + to]
    }
}

impl TransitionModel for TransitionMatrix {
    fn without_inputs(&self) -> bool {
        true
    }

    fn probability(&self, to: usize, from: usize, _control: Option<usize>) -> f64 {
        self.entry(to, from)
    }
}

/// One transition matrix per discrete control input.
///
/// A missing or unknown control selects no matrix and every transition probability is zero,
/// which collapses the predicted mass.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlledTransition {
    matrices: Vec<TransitionMatrix>,
}

impl ControlledTransition {
    pub fn new(matrices: Vec<TransitionMatrix>) -> Result<Self, ModelError> {
        let Some(first) = matrices.first() else {
            return Err(ModelError::Empty);
        };
        let states = first.states();
        for (index, matrix) in matrices.iter().enumerate() {
            if matrix.states() != states {
                return Err(ModelError::RaggedTable {
                    row: index,
                    cols: matrix.states(),
                    expected: states,
                });
            }
        }
        Ok(Self { matrices })
    }

    pub fn controls(&self) -> usize {
        self.matrices.len()
    }

    pub fn states(&self) -> usize {
        self.matrices[0].states()
    }
}

impl TransitionModel for ControlledTransition {
    fn without_inputs(&self) -> bool {
        false
    }

    fn probability(&self, to: usize, from: usize, control: Option<usize>) -> f64 {
        control
            .and_then(|index| self.matrices.get(index))
            .map_or(0.0, |matrix| matrix.entry(to, from))
    }
}

/// Likelihood of discrete observations stored as `table[observation][state]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodTable {
    states: usize,
    rows: Vec<Vec<f64>>,
}

impl LikelihoodTable {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, ModelError> {
        let Some(first) = rows.first() else {
            return Err(ModelError::Empty);
        };
        let states = first.len();
        if states == 0 {
            return Err(ModelError::Empty);
        }
        for (row, values) in rows.iter().enumerate() {
            if values.len() != states {
                return Err(ModelError::RaggedTable {
                    row,
                    cols: values.len(),
                    expected: states,
                });
            }
            for (col, value) in values.iter().enumerate() {
                check_probability(row, col, *value)?;
            }
        }
        Ok(Self { states, rows })
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn observations(&self) -> usize {
        self.rows.len()
    }

    fn entry(&self, observation: usize, state: usize) -> f64 {
        self.rows
            .get(observation)
            .and_then(|row| row.get(state))
            .copied()
            .unwrap_or(0.0)
    }
}

impl LikelihoodModel<usize> for LikelihoodTable {
    fn without_sensor_params(&self) -> bool {
        true
    }

    fn likelihood(&self, observation: &usize, state: usize, _sensor: Option<usize>) -> f64 {
        self.entry(*observation, state)
    }
}

/// One likelihood table per sensor configuration, selected by the sensor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorLikelihood {
    tables: Vec<LikelihoodTable>,
}

impl SensorLikelihood {
    pub fn new(tables: Vec<LikelihoodTable>) -> Result<Self, ModelError> {
        let Some(first) = tables.first() else {
            return Err(ModelError::Empty);
        };
        let states = first.states();
        for (index, table) in tables.iter().enumerate() {
            if table.states() != states {
                return Err(ModelError::RaggedTable {
                    row: index,
                    cols: table.states(),
                    expected: states,
                });
            }
        }
        Ok(Self { tables })
    }

    pub fn sensors(&self) -> usize {
        self.tables.len()
    }

    pub fn states(&self) -> usize {
        self.tables[0].states()
    }

    /// Largest observation count across sensors.
    pub fn observations(&self) -> usize {
        self.tables
            .iter()
            .map(LikelihoodTable::observations)
            .max()
            .unwrap_or(0)
    }
}

impl LikelihoodModel<usize> for SensorLikelihood {
    fn without_sensor_params(&self) -> bool {
        false
    }

    fn likelihood(&self, observation: &usize, state: usize, sensor: Option<usize>) -> f64 {
        sensor
            .and_then(|index| self.tables.get(index))
            .map_or(0.0, |table| table.entry(*observation, state))
    }
}

fn check_probability(row: usize, col: usize, value: f64) -> Result<(), ModelError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::InvalidProbability { row, col, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_indexed_from_then_to() {
        let matrix = TransitionMatrix::new(vec![vec![0.7, 0.3], vec![0.4, 0.6]]).unwrap();
        assert!(matrix.without_inputs());
        assert_eq!(matrix.probability(1, 0, None), 0.3);
        assert_eq!(matrix.probability(0, 1, None), 0.4);
        assert_eq!(matrix.probability(5, 0, None), 0.0);
    }

    #[test]
    fn matrix_rejects_bad_shapes_and_values() {
        assert_eq!(TransitionMatrix::new(Vec::new()), Err(ModelError::Empty));
        assert_eq!(
            TransitionMatrix::new(vec![vec![1.0], vec![0.5, 0.5]]),
            Err(ModelError::NotSquare {
                rows: 2,
                row: 0,
                cols: 1
            })
        );
        assert!(matches!(
            TransitionMatrix::new(vec![vec![1.5]]),
            Err(ModelError::InvalidProbability { row: 0, col: 0, .. })
        ));
    }

    #[test]
    fn identity_keeps_state() {
        let matrix = TransitionMatrix::identity(3);
        assert_eq!(matrix.probability(2, 2, None), 1.0);
        assert_eq!(matrix.probability(1, 2, None), 0.0);
    }

    #[test]
    fn controlled_transition_selects_matrix_by_control() {
        let stay = TransitionMatrix::identity(2);
        let flip = TransitionMatrix::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let model = ControlledTransition::new(vec![stay, flip]).unwrap();
        assert!(!model.without_inputs());
        assert_eq!(model.controls(), 2);
        assert_eq!(model.probability(0, 0, Some(0)), 1.0);
        assert_eq!(model.probability(1, 0, Some(1)), 1.0);
        assert_eq!(model.probability(1, 0, Some(9)), 0.0);
        assert_eq!(model.probability(0, 0, None), 0.0);
    }

    #[test]
    fn controlled_transition_requires_matching_sizes() {
        let result = ControlledTransition::new(vec![
            TransitionMatrix::identity(2),
            TransitionMatrix::identity(3),
        ]);
        assert!(matches!(result, Err(ModelError::RaggedTable { row: 1, .. })));
    }

    #[test]
    fn likelihood_table_looks_up_observation_row() {
        let table = LikelihoodTable::new(vec![vec![0.8, 0.2], vec![0.2, 0.8]]).unwrap();
        assert!(table.without_sensor_params());
        assert_eq!(table.likelihood(&0, 0, None), 0.8);
        assert_eq!(table.likelihood(&1, 0, Some(4)), 0.2);
        assert_eq!(table.likelihood(&7, 0, None), 0.0);
    }

    #[test]
    fn sensor_likelihood_switches_table() {
        let sharp = LikelihoodTable::new(vec![vec![0.9, 0.1], vec![0.1, 0.9]]).unwrap();
        let blurry = LikelihoodTable::new(vec![vec![0.6, 0.4], vec![0.4, 0.6]]).unwrap();
        let model = SensorLikelihood::new(vec![sharp, blurry]).unwrap();
        assert!(!model.without_sensor_params());
        assert_eq!(model.sensors(), 2);
        assert_eq!(model.likelihood(&0, 0, Some(0)), 0.9);
        assert_eq!(model.likelihood(&0, 0, Some(1)), 0.6);
        assert_eq!(model.likelihood(&0, 0, None), 0.0);
    }
}
