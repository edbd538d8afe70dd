//! Dense layers backing the inference functions.

use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LogicError, Result};

/// Affine map `x W + b` with `W` stored as `[in, out]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// Uniform initialization in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
    pub fn new<R: Rng>(input_dimension: usize, output_dimension: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (input_dimension.max(1) as f32).sqrt();
        let weight = Array2::from_shape_fn((input_dimension, output_dimension), |_| {
            rng.gen_range(-bound..=bound)
        });
        let bias = Array1::from_shape_fn(output_dimension, |_| rng.gen_range(-bound..=bound));
        Linear { weight, bias }
    }

    pub fn from_parts(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weight.ncols() != bias.len() {
            return Err(LogicError::FeatureMismatch {
                expected: weight.ncols(),
                found: bias.len(),
            });
        }
        Ok(Linear { weight, bias })
    }

    pub fn input_dimension(&self) -> usize {
        self.weight.nrows()
    }

    pub fn output_dimension(&self) -> usize {
        self.weight.ncols()
    }

    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    pub fn forward(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if rows.ncols() != self.input_dimension() {
            return Err(LogicError::FeatureMismatch {
                expected: self.input_dimension(),
                found: rows.ncols(),
            });
        }
        let mut out = rows.dot(&self.weight);
        out += &self.bias;
        Ok(out)
    }
}

/// Stack of `Linear + ReLU` hidden layers and a final plain `Linear`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    pub fn new<R: Rng>(
        input_dimension: usize,
        hidden_dimensions: &[usize],
        output_dimension: usize,
        rng: &mut R,
    ) -> Self {
        let mut widths = Vec::with_capacity(hidden_dimensions.len() + 2);
        widths.push(input_dimension);
        widths.extend_from_slice(hidden_dimensions);
        widths.push(output_dimension);

        let layers = widths
            .windows(2)
            .map(|pair| Linear::new(pair[0], pair[1], &mut *rng))
            .collect();
        Mlp { layers }
    }

    pub fn from_layers(layers: Vec<Linear>) -> Result<Self> {
        for pair in layers.windows(2) {
            if pair[0].output_dimension() != pair[1].input_dimension() {
                return Err(LogicError::FeatureMismatch {
                    expected: pair[1].input_dimension(),
                    found: pair[0].output_dimension(),
                });
            }
        }
        if layers.is_empty() {
            return Err(LogicError::Config("an MLP needs at least one layer".into()));
        }
        Ok(Mlp { layers })
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn input_dimension(&self) -> usize {
        self.layers.first().map_or(0, Linear::input_dimension)
    }

    pub fn output_dimension(&self) -> usize {
        self.layers.last().map_or(0, Linear::output_dimension)
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Linear::parameter_count).sum()
    }

    pub fn forward(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let last = self.layers.len().saturating_sub(1);
        let mut current = rows.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            current = layer.forward(current.view())?;
            if i < last {
                current.mapv_inplace(|x| x.max(0.0));
            }
        }
        Ok(current)
    }
}
