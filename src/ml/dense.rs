//! Dense network evaluation (CPU-only).
//!
//! Trained strikeout models are exported as small JSON networks:
//! - regressors: linear or ReLU MLP with a linear output (expected strikeouts)
//! - classifiers: same shape with a sigmoid output (P(over the line))
//!
//! Shapes are validated at load time so a bad export fails the load, not a
//! prediction.

use serde::{Deserialize, Serialize};

use crate::error::{KpropError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights shape: [out_dim][in_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn out_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let sum = row.iter().zip(x).fold(*b, |acc, (w, xi)| acc + w * xi);
                self.activation.apply(sum)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    /// Expected input dimension (must equal the schema length)
    pub input_dim: usize,

    /// Optional z-score normalization fitted at training time
    #[serde(default)]
    pub input_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub input_std: Option<Vec<f64>>,

    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Single linear layer: `bias + Σ w_i x_i`, optionally squashed.
    pub fn linear(weights: Vec<f64>, bias: f64, activation: Activation) -> Self {
        Self {
            input_dim: weights.len(),
            input_mean: None,
            input_std: None,
            layers: vec![DenseLayer {
                weights: vec![weights],
                bias: vec![bias],
                activation,
            }],
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(KpropError::Validation(msg));

        if self.input_dim == 0 {
            return fail("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return fail("layers must not be empty".to_string());
        }
        match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => {
                if mean.len() != self.input_dim || std.len() != self.input_dim {
                    return fail(format!(
                        "input_mean/input_std lengths {}/{} != input_dim {}",
                        mean.len(),
                        std.len(),
                        self.input_dim
                    ));
                }
                if std.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                    return fail("input_std must be finite and > 0".to_string());
                }
                if mean.iter().any(|v| !v.is_finite()) {
                    return fail("input_mean must be finite".to_string());
                }
            }
            (None, None) => {}
            _ => return fail("input_mean and input_std must be provided together".to_string()),
        }

        let mut expected_in = self.input_dim;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 {
                return fail(format!("layer[{idx}] out_dim must be > 0"));
            }
            if layer.bias.len() != layer.out_dim() {
                return fail(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.out_dim()
                ));
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != expected_in {
                    return fail(format!(
                        "layer[{idx}] weights row {r} len {} != expected in_dim {expected_in}",
                        row.len()
                    ));
                }
            }
            let non_finite = layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.bias)
                .any(|v| !v.is_finite());
            if non_finite {
                return fail(format!("layer[{idx}] contains non-finite parameters"));
            }
            expected_in = layer.out_dim();
        }
        if expected_in != 1 {
            return fail(format!(
                "strikeout models must have a scalar output, got output_dim={expected_in}"
            ));
        }
        Ok(())
    }

    /// Evaluate the network on one feature vector
    pub fn evaluate(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.input_dim {
            return Err(KpropError::Scoring(format!(
                "input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut x: Vec<f64> = match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => input
                .iter()
                .zip(mean.iter().zip(std))
                .map(|(v, (m, s))| (v - m) / s.max(1e-12))
                .collect(),
            _ => input.to_vec(),
        };

        for layer in &self.layers {
            x = layer.forward(&x);
        }

        match x.as_slice() {
            [out] if out.is_finite() => Ok(*out),
            [out] => Err(KpropError::Scoring(format!("non-finite model output {out}"))),
            _ => Err(KpropError::Scoring(format!(
                "expected scalar output, got {} values",
                x.len()
            ))),
        }
    }
}

/// Numerically-stable sigmoid.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_regressor_output() {
        let net = DenseNetwork::linear(vec![0.8, 0.5], 0.5, Activation::Linear);
        net.validate().unwrap();
        // 0.5 + 0.8*6 + 0.5*1 = 5.8
        assert!((net.evaluate(&[6.0, 1.0]).unwrap() - 5.8).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_classifier_centered() {
        let net = DenseNetwork::linear(vec![1.0, 2.0], 0.0, Activation::Sigmoid);
        let p0 = net.evaluate(&[0.0, 0.0]).unwrap();
        assert!((p0 - 0.5).abs() < 1e-12);
        assert!(net.evaluate(&[1.0, 0.0]).unwrap() > 0.5);
    }

    #[test]
    fn mlp_with_standardization() {
        let net = DenseNetwork {
            input_dim: 2,
            input_mean: Some(vec![5.0, 0.0]),
            input_std: Some(vec![2.0, 1.0]),
            layers: vec![
                DenseLayer {
                    weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                    bias: vec![0.0, 0.0],
                    activation: Activation::Relu,
                },
                DenseLayer {
                    weights: vec![vec![2.0, 1.0]],
                    bias: vec![6.0],
                    activation: Activation::Linear,
                },
            ],
        };
        net.validate().unwrap();
        // x = [(7-5)/2, -1] = [1, -1] → relu [1, 0] → 6 + 2 = 8
        assert!((net.evaluate(&[7.0, -1.0]).unwrap() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn validates_shapes() {
        let mut bad = DenseNetwork::linear(vec![1.0, 2.0], 0.0, Activation::Linear);
        bad.input_dim = 3;
        assert!(bad.validate().is_err());

        let mut multi = DenseNetwork::linear(vec![1.0], 0.0, Activation::Linear);
        multi.layers[0].weights.push(vec![1.0]);
        multi.layers[0].bias.push(0.0);
        assert!(multi.validate().is_err());
    }

    #[test]
    fn rejects_wrong_input_length() {
        let net = DenseNetwork::linear(vec![1.0, 2.0], 0.0, Activation::Linear);
        assert!(matches!(net.evaluate(&[1.0]), Err(KpropError::Scoring(_))));
    }
}
