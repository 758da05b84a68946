//! Layered threshold perceptron used as a car's brain.

use crate::geometry::Touch;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Number of control signals: forward, left, right, reverse.
pub const N_CONTROLS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    ShapeMismatch { expected: usize, actual: usize },
    Serialization(String),
    Deserialization(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ShapeMismatch { expected, actual } => {
                write!(f, "input length must be {expected}, but is {actual}")
            }
            NetworkError::Serialization(msg) => write!(f, "failed to encode network: {msg}"),
            NetworkError::Deserialization(msg) => write!(f, "malformed network: {msg}"),
        }
    }
}

impl Error for NetworkError {}

/// One weighted transition between two layers of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Weights indexed as `weights[input][output]`.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl Level {
    fn random<R: Rng + ?Sized>(n_inputs: usize, n_outputs: usize, rng: &mut R) -> Self {
        let weights = (0..n_inputs)
            .map(|_| (0..n_outputs).map(|_| rng.random_range(-1.0..=1.0)).collect())
            .collect();
        let biases = (0..n_outputs).map(|_| rng.random_range(-1.0..=1.0)).collect();
        Self { weights, biases }
    }

    pub fn new(weights: Vec<Vec<f64>>, biases: Vec<f64>) -> Result<Self, NetworkError> {
        let level = Self { weights, biases };
        level.validate()?;
        Ok(level)
    }

    pub fn input_count(&self) -> usize {
        self.weights.len()
    }

    pub fn output_count(&self) -> usize {
        self.biases.len()
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    fn feed(&self, inputs: &[f64]) -> Vec<f64> {
        (0..self.output_count())
            .map(|j| {
                let sum: f64 = inputs
                    .iter()
                    .zip(&self.weights)
                    .map(|(x, row)| x * row[j])
                    .sum();
                if sum - self.biases[j] > 0.0 { 1.0 } else { 0.0 }
            })
            .collect()
    }

    fn validate(&self) -> Result<(), NetworkError> {
        let n_outputs = self.output_count();
        if self.weights.is_empty() || n_outputs == 0 {
            return Err(NetworkError::Deserialization(
                "level must have at least one input and one output".into(),
            ));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != n_outputs) {
            return Err(NetworkError::Deserialization(format!(
                "weight row length must be {n_outputs}, but is {}",
                row.len()
            )));
        }
        let in_range = |v: &f64| v.is_finite() && (-1.0..=1.0).contains(v);
        if !self.weights.iter().flatten().all(in_range) || !self.biases.iter().all(in_range) {
            return Err(NetworkError::Deserialization(
                "weights and biases must lie in [-1, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Feedforward network of chained [`Level`]s.
///
/// The structure is fixed at construction. `Clone` is a deep copy, so a
/// cloned brain can be mutated without touching its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    levels: Vec<Level>,
}

impl NeuralNetwork {
    /// Create a network with uniformly random weights and biases in `[-1, 1]`.
    ///
    /// `neuron_counts` lists the width of every layer, inputs first.
    pub fn random<R: Rng + ?Sized>(neuron_counts: &[usize], rng: &mut R) -> Self {
        debug_assert!(neuron_counts.len() >= 2, "network needs at least two layers");
        let levels = neuron_counts
            .windows(2)
            .map(|pair| Level::random(pair[0], pair[1], rng))
            .collect();
        Self { levels }
    }

    pub fn from_levels(levels: Vec<Level>) -> Result<Self, NetworkError> {
        let network = Self { levels };
        network.validate()?;
        Ok(network)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn input_count(&self) -> usize {
        self.levels.first().map_or(0, Level::input_count)
    }

    pub fn output_count(&self) -> usize {
        self.levels.last().map_or(0, Level::output_count)
    }

    /// Widths of every layer, inputs first.
    pub fn layout(&self) -> Vec<usize> {
        let mut layout = vec![self.input_count()];
        layout.extend(self.levels.iter().map(Level::output_count));
        layout
    }

    /// Propagate `inputs` through every level with a hard threshold.
    ///
    /// Output `j` of a level is `1.0` when `Σ inputs[i] * weights[i][j] - biases[j] > 0`,
    /// otherwise `0.0`.
    pub fn forward(&self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
        let expected = self.input_count();
        if inputs.len() != expected {
            return Err(NetworkError::ShapeMismatch {
                expected,
                actual: inputs.len(),
            });
        }

        let mut signal = inputs.to_vec();
        for level in &self.levels {
            signal = level.feed(&signal);
        }
        Ok(signal)
    }

    /// Perturb every weight and bias by `U(-1, 1) * amount`, clamped to `[-1, 1]`.
    ///
    /// `amount` is clamped to `[0, 1]`; zero or NaN leaves the network untouched.
    pub fn mutate<R: Rng + ?Sized>(&mut self, amount: f64, rng: &mut R) {
        let amount = if amount.is_nan() {
            0.0
        } else {
            amount.clamp(0.0, 1.0)
        };
        if amount == 0.0 {
            return;
        }

        let mut perturb = |value: &mut f64| {
            *value = (*value + rng.random_range(-1.0..=1.0) * amount).clamp(-1.0, 1.0);
        };
        for level in &mut self.levels {
            level.weights.iter_mut().flatten().for_each(&mut perturb);
            level.biases.iter_mut().for_each(&mut perturb);
        }
    }

    fn validate(&self) -> Result<(), NetworkError> {
        if self.levels.is_empty() {
            return Err(NetworkError::Deserialization(
                "network must have at least one level".into(),
            ));
        }
        for (i_lvl, level) in self.levels.iter().enumerate() {
            level.validate().map_err(|err| match err {
                NetworkError::Deserialization(msg) => {
                    NetworkError::Deserialization(format!("level {i_lvl}: {msg}"))
                }
                other => other,
            })?;
        }
        for (i_lvl, pair) in self.levels.windows(2).enumerate() {
            let (n_out, n_in) = (pair[0].output_count(), pair[1].input_count());
            if n_out != n_in {
                return Err(NetworkError::Deserialization(format!(
                    "level {i_lvl} has {n_out} outputs but level {} has {n_in} inputs",
                    i_lvl + 1
                )));
            }
        }
        Ok(())
    }
}

/// Encode a brain as nested JSON numbers.
pub fn serialize(network: &NeuralNetwork) -> Result<String, NetworkError> {
    for (i_lvl, level) in network.levels.iter().enumerate() {
        let mut values = level.weights.iter().flatten().chain(&level.biases);
        if let Some(value) = values.find(|value| !value.is_finite()) {
            return Err(NetworkError::Serialization(format!(
                "level {i_lvl} holds non-finite value {value}"
            )));
        }
    }
    serde_json::to_string(network).map_err(|err| NetworkError::Serialization(err.to_string()))
}

/// Decode a brain produced by [`serialize`], validating its structure.
pub fn deserialize(data: &str) -> Result<NeuralNetwork, NetworkError> {
    let network: NeuralNetwork =
        serde_json::from_str(data).map_err(|err| NetworkError::Deserialization(err.to_string()))?;
    network.validate()?;
    Ok(network)
}

/// Turn sensor readings into network inputs.
///
/// A hit at offset `o` becomes `1 - o`; a clear ray becomes `0`.
pub fn inputs_from_readings(readings: &[Option<Touch>]) -> Vec<f64> {
    readings
        .iter()
        .map(|reading| reading.map_or(0.0, |touch| 1.0 - touch.offset))
        .collect()
}
