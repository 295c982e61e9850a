use serde::{Serialize, Deserialize};
use std::f64::consts::E;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is vector-valued. Element-wise, `function()` yields the
    /// unnormalised numerator `e^x`; `apply()` performs the max-shifted
    /// normalisation over the whole layer.
    Softmax,
    Tanh,
}

impl ActivationFunction {
    /// Element-wise activation.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
            ActivationFunction::Softmax => x.exp(),
            ActivationFunction::Tanh => x.tanh(),
        }
    }

    /// Element-wise derivative of the activation with respect to `z`.
    ///
    /// For `Softmax` the Jacobian is not diagonal, so the layer handles it
    /// (see `softmax::jacobian_product`). Returning `1.0` here lets a
    /// combined Softmax + cross-entropy delta pass through unchanged.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Softmax => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }

    /// Applies the activation to a whole layer of pre-activations.
    ///
    /// This is the only correct entry point for `Softmax`: the exponentials
    /// are taken after subtracting the maximum so large logits cannot
    /// overflow.
    pub fn apply(&self, zs: &[f64], out: &mut [f64]) {
        debug_assert_eq!(zs.len(), out.len());
        match self {
            ActivationFunction::Softmax => {
                let max = zs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for (o, z) in out.iter_mut().zip(zs) {
                    *o = self.function(z - max);
                    sum += *o;
                }
                for o in out.iter_mut() {
                    *o /= sum;
                }
            }
            _ => {
                for (o, &z) in out.iter_mut().zip(zs) {
                    *o = self.function(z);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_derivative_matches_closed_form() {
        let s = ActivationFunction::Sigmoid;
        let x = 0.3;
        let fx = s.function(x);
        assert_relative_eq!(s.derivative(x), fx * (1.0 - fx));
        assert_relative_eq!(s.function(0.0), 0.5);
    }

    #[test]
    fn softmax_is_a_distribution_even_for_huge_logits() {
        let zs = [1000.0, 999.0, -1000.0, 0.0];
        let mut out = [0.0; 4];
        ActivationFunction::Softmax.apply(&zs, &mut out);
        assert!(out.iter().all(|p| p.is_finite() && *p >= 0.0));
        assert_relative_eq!(out.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(out[0] > out[1]);
    }

    #[test]
    fn relu_clamps_negatives() {
        let r = ActivationFunction::ReLU;
        assert_eq!(r.function(-2.0), 0.0);
        assert_eq!(r.function(3.0), 3.0);
        assert_eq!(r.derivative(-2.0), 0.0);
        assert_eq!(r.derivative(3.0), 1.0);
    }
}
