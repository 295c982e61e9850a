use crate::layers::layer::Layer;
use crate::math::vector::axpy;
use crate::train::gradient::LayerGradients;

/// Plain stochastic gradient descent: `w -= learning_rate * grad`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one update to a layer given its batch-averaged gradients,
    /// covering both per-neuron weights and shared units.
    pub fn step(&self, layer: &mut Layer, grads: &LayerGradients) {
        let rate = self.learning_rate;
        if layer.has_private_weights() {
            for (neuron, g) in layer.neurons.iter_mut().zip(&grads.neurons) {
                neuron.bias -= rate * g.bias;
                axpy(&mut neuron.weights, -rate, &g.weights);
            }
        }
        for ((bias, weights), g) in layer.shared_units_mut().into_iter().zip(&grads.shared) {
            *bias -= rate * g.bias;
            axpy(weights, -rate, &g.weights);
        }
    }
}
