use rand::Rng;

use crate::layers::layer::Layer;
use crate::layers::neuron::Neuron;
use crate::math::vector::{axpy, xavier};
use crate::train::gradient::LayerGradients;

/// `size` neurons with Xavier-initialised rows of length `fan_in` and zero biases.
pub(crate) fn neurons<R: Rng + ?Sized>(size: usize, fan_in: usize, rng: &mut R) -> Vec<Neuron> {
    (0..size)
        .map(|i| Neuron::new(i, 0.0, xavier(rng, fan_in, fan_in)))
        .collect()
}

/// z = w · x + b per neuron, then the layer activation over all of z
/// (element-wise, or the normalised exponential for softmax).
pub(crate) fn forward(layer: &mut Layer, input: &[f64]) {
    let zs: Vec<f64> = layer.neurons.iter().map(|n| n.weighted_sum(input)).collect();
    let mut activations = vec![0.0; zs.len()];
    layer.activation.apply(&zs, &mut activations);
    layer.store(&zs, &activations);
}

/// Given δ = ∂L/∂z, accumulates `db += δ` and `dW += δ ⊗ x`, and returns
/// `Wᵀ δ` for the previous layer.
pub(crate) fn backward(
    layer: &Layer,
    delta: &[f64],
    input: &[f64],
    grads: &mut LayerGradients,
) -> Vec<f64> {
    let mut input_delta = vec![0.0; input.len()];
    for ((neuron, grad), &d) in layer.neurons.iter().zip(grads.neurons.iter_mut()).zip(delta) {
        grad.bias += d;
        axpy(&mut grad.weights, d, input);
        axpy(&mut input_delta, d, &neuron.weights);
    }
    input_delta
}
