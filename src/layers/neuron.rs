/// A single trainable unit.
///
/// `z_value` and `activation` are overwritten by every forward pass and read
/// by the backward pass that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
    pub index: usize,
    pub bias: f64,
    pub weights: Vec<f64>,
    pub z_value: f64,
    pub activation: f64,
}

impl Neuron {
    pub fn new(index: usize, bias: f64, weights: Vec<f64>) -> Neuron {
        Neuron {
            index,
            bias,
            weights,
            z_value: 0.0,
            activation: 0.0,
        }
    }

    /// A unit without private weights (input, convolutional and pooling neurons).
    pub fn passive(index: usize) -> Neuron {
        Neuron::new(index, 0.0, Vec::new())
    }

    /// `bias + weights · input`.
    #[inline]
    pub fn weighted_sum(&self, input: &[f64]) -> f64 {
        self.bias + crate::math::vector::dot(&self.weights, input)
    }
}
