//! Inference runtimes for exported strikeout models.
//!
//! Dense JSON networks are always available; ONNX graphs need the `onnx`
//! cargo feature.

pub mod dense;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use dense::{Activation, DenseLayer, DenseNetwork};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

use crate::error::Result;

/// A loaded, ready-to-evaluate model
#[derive(Debug, Clone)]
pub enum Estimator {
    Dense(DenseNetwork),
    #[cfg(feature = "onnx")]
    Onnx(OnnxModel),
}

impl Estimator {
    pub fn input_dim(&self) -> usize {
        match self {
            Estimator::Dense(net) => net.input_dim,
            #[cfg(feature = "onnx")]
            Estimator::Onnx(model) => model.input_dim(),
        }
    }

    /// Raw model output for one vector
    pub fn evaluate(&self, input: &[f64]) -> Result<f64> {
        match self {
            Estimator::Dense(net) => net.evaluate(input),
            #[cfg(feature = "onnx")]
            Estimator::Onnx(model) => model.evaluate(input),
        }
    }

    pub fn runtime(&self) -> &'static str {
        match self {
            Estimator::Dense(_) => "dense",
            #[cfg(feature = "onnx")]
            Estimator::Onnx(_) => "onnx",
        }
    }
}
