//! Simple (Elman) recurrent layers trained with truncated backpropagation
//! through time.
//!
//! Each neuron owns one weight row over `[x_t; h_{t-1}]` that is reused at
//! every timestep; the cell keeps a bounded window of past steps so the
//! backward pass can walk back at most `BPTT_TRUNCATE` steps.

use std::collections::VecDeque;

use crate::layers::layer::{Layer, LayerState, BPTT_TRUNCATE};
use crate::math::vector::axpy;
use crate::train::gradient::LayerGradients;

/// Everything the backward pass needs to know about one forward step.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentStep {
    pub input: Vec<f64>,
    pub prev_state: Vec<f64>,
    pub z: Vec<f64>,
    pub state: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurrentCell {
    /// Oldest first; never longer than `BPTT_TRUNCATE + 1`.
    pub steps: VecDeque<RecurrentStep>,
}

impl RecurrentCell {
    /// The hidden state left by the last step, or zeros at sequence start.
    pub fn last_state(&self, size: usize) -> Vec<f64> {
        self.steps
            .back()
            .map_or_else(|| vec![0.0; size], |s| s.state.clone())
    }

    fn push(&mut self, step: RecurrentStep) {
        self.steps.push_back(step);
        while self.steps.len() > BPTT_TRUNCATE + 1 {
            self.steps.pop_front();
        }
    }
}

pub(crate) fn forward(layer: &mut Layer, input: &[f64]) {
    let Layer { neurons, state, activation, size, .. } = layer;
    let LayerState::Recurrent(cell) = state else {
        return;
    };
    let prev_state = cell.last_state(*size);
    let joined = [input, prev_state.as_slice()].concat();
    let z: Vec<f64> = neurons.iter().map(|n| n.weighted_sum(&joined)).collect();
    let mut h = vec![0.0; z.len()];
    activation.apply(&z, &mut h);
    for ((n, &zv), &hv) in neurons.iter_mut().zip(&z).zip(&h) {
        n.z_value = zv;
        n.activation = hv;
    }
    cell.push(RecurrentStep {
        input: input.to_vec(),
        prev_state,
        z,
        state: h,
    });
}

/// `dh` is ∂L/∂h for the most recent step. Walks back through the retained
/// window, accumulating every step's contribution into the one shared
/// weight row per neuron, and returns ∂L/∂x for the most recent step.
pub(crate) fn backward(layer: &Layer, dh: &[f64], grads: &mut LayerGradients) -> Vec<f64> {
    let LayerState::Recurrent(cell) = &layer.state else {
        return Vec::new();
    };
    let Some(last) = cell.steps.back() else {
        return Vec::new();
    };
    let input_width = last.input.len();
    let mut input_delta = vec![0.0; input_width];
    let mut dz: Vec<f64> = dh
        .iter()
        .zip(&last.z)
        .map(|(d, &z)| d * layer.activation.derivative(z))
        .collect();

    for (k, step) in cell.steps.iter().enumerate().rev() {
        let mut dh_prev = vec![0.0; layer.size];
        for ((neuron, grad), &d) in layer.neurons.iter().zip(grads.neurons.iter_mut()).zip(&dz) {
            grad.bias += d;
            let (gx, gh) = grad.weights.split_at_mut(input_width);
            axpy(gx, d, &step.input);
            axpy(gh, d, &step.prev_state);
            let (wx, wh) = neuron.weights.split_at(input_width);
            if k + 1 == cell.steps.len() {
                axpy(&mut input_delta, d, wx);
            }
            axpy(&mut dh_prev, d, wh);
        }
        if k == 0 {
            break;
        }
        let earlier = &cell.steps[k - 1];
        dz = dh_prev
            .iter()
            .zip(&earlier.z)
            .map(|(d, &z)| d * layer.activation.derivative(z))
            .collect();
    }
    input_delta
}
