//! ONNX estimator (pure Rust via `tract-onnx`).
//!
//! Gradient-boosted and neural strikeout models exported from the training
//! pipeline arrive as ONNX graphs taking a `[1, n_features]` f32 tensor and
//! returning a single value.

use std::io::Cursor;

use tract_onnx::prelude::*;

use crate::error::{KpropError, Result};

#[derive(Clone)]
pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    input_dim: usize,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("input_dim", &self.input_dim)
            .finish()
    }
}

fn onnx_err(stage: &str) -> impl Fn(TractError) -> KpropError + '_ {
    move |e| KpropError::Internal(format!("onnx {stage} failed: {e}"))
}

impl OnnxModel {
    /// Build a runnable plan from raw graph bytes, fixed to `[1, input_dim]`.
    pub fn from_bytes(bytes: &[u8], input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(KpropError::Validation("input_dim must be > 0".to_string()));
        }

        let mut reader = Cursor::new(bytes);
        let plan = tract_onnx::onnx()
            .model_for_read(&mut reader)
            .map_err(onnx_err("load"))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, input_dim)),
            )
            .map_err(onnx_err("input fact"))?
            .into_optimized()
            .map_err(onnx_err("optimize"))?
            .into_runnable()
            .map_err(onnx_err("plan"))?;

        let model = Self { plan, input_dim };
        // a dry run on zeros catches graphs with the wrong output arity
        model.evaluate(&vec![0.0; input_dim])?;
        Ok(model)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Evaluate one feature vector, returning the scalar output.
    pub fn evaluate(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.input_dim {
            return Err(KpropError::Scoring(format!(
                "onnx input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let values: Vec<f32> = input.iter().map(|v| *v as f32).collect();
        let tensor = tract_ndarray::Array2::from_shape_vec((1, self.input_dim), values)
            .map_err(|e| KpropError::Internal(format!("onnx input reshape failed: {e}")))?
            .into_tvalue();

        let outputs = self.plan.run(tvec!(tensor)).map_err(onnx_err("run"))?;
        let first = outputs
            .first()
            .ok_or_else(|| KpropError::Scoring("onnx produced no outputs".to_string()))?;
        let view = first.to_array_view::<f32>().map_err(onnx_err("output decode"))?;

        let mut iter = view.iter();
        match (iter.next(), iter.next()) {
            (Some(v), None) if v.is_finite() => Ok(f64::from(*v)),
            (Some(v), None) => Err(KpropError::Scoring(format!("non-finite model output {v}"))),
            _ => Err(KpropError::Scoring(format!(
                "expected scalar output, got {} values",
                view.len()
            ))),
        }
    }
}
