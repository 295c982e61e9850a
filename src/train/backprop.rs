//! Per-example forward and backward passes.

use crate::error::Result;
use crate::layers::layer::{LayerKind, Upstream};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::loss_type::LossType;
use crate::network::network::Network;
use crate::train::gradient::LayerGradients;

/// Runs one example forward, then backward, adding its gradients into
/// `grads` (one entry per layer, as from [`gradient::zeroed`]).
///
/// `input` and `target` are full-width vectors; one-hot expansion happens
/// before this point. Returns the network output.
///
/// [`gradient::zeroed`]: crate::train::gradient::zeroed
pub fn accumulate_example(
    network: &mut Network,
    input: &[f64],
    target: &[f64],
    grads: &mut [LayerGradients],
) -> Result<Vec<f64>> {
    let output = network.feedforward(input)?;
    backward(network, &output, target, grads);
    Ok(output)
}

/// Feeds a whole sequence from a clean recurrent state, backpropagating
/// after every step. Returns the output of each step.
pub fn accumulate_sequence(
    network: &mut Network,
    steps: &[(Vec<f64>, Vec<f64>)],
    grads: &mut [LayerGradients],
) -> Result<Vec<Vec<f64>>> {
    network.reset_state();
    steps
        .iter()
        .map(|(input, target)| accumulate_example(network, input, target, grads))
        .collect()
}

fn backward(network: &Network, output: &[f64], target: &[f64], grads: &mut [LayerGradients]) {
    let Some(last) = network.layers.len().checked_sub(1) else {
        return;
    };
    let combined = network.layers[last].kind == LayerKind::SoftMax && network.loss == LossType::CrossEntropy;
    let mut delta = if combined {
        CrossEntropyLoss::softmax_delta(output, target)
    } else {
        network.loss.derivative(output, target)
    };
    let mut pre_activation = combined;

    for i in (1..=last).rev() {
        let below = network.layers[i - 1].activations();
        let upstream = if pre_activation {
            Upstream::PreActivation(&delta)
        } else {
            Upstream::Activation(&delta)
        };
        delta = network.layers[i].backpropagate(upstream, &below, &mut grads[i]);
        pre_activation = false;
    }
}
