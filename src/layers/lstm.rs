//! Long short-term memory layers.
//!
//! The layer's own neurons are the candidate (tanh) units; the input,
//! forget and output gates live in the cell as three further banks of
//! `size` neurons. Every unit has one weight row over `[x_t; h_{t-1}]`
//! shared by all timesteps.

use std::collections::VecDeque;

use rand::Rng;

use crate::activation::ActivationFunction;
use crate::layers::layer::{Layer, LayerState, BPTT_TRUNCATE};
use crate::layers::neuron::Neuron;
use crate::math::vector::{axpy, xavier};
use crate::train::gradient::{Gradient, LayerGradients};

/// Gate banks in the order they are stored in `LstmCell::gates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Input = 0,
    Forget = 1,
    Output = 2,
}

const GATES: [Gate; 3] = [Gate::Input, Gate::Forget, Gate::Output];

#[derive(Debug, Clone, PartialEq)]
pub struct LstmStep {
    pub input: Vec<f64>,
    pub prev_state: Vec<f64>,
    pub prev_cell: Vec<f64>,
    pub input_gate: Vec<f64>,
    pub forget_gate: Vec<f64>,
    pub output_gate: Vec<f64>,
    pub candidate: Vec<f64>,
    pub cell: Vec<f64>,
    pub state: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LstmCell {
    /// `3 × size` gate neurons: all input gates, then forget, then output.
    pub gates: Vec<Neuron>,
    pub steps: VecDeque<LstmStep>,
}

impl LstmCell {
    pub(crate) fn new<R: Rng + ?Sized>(size: usize, fan_in: usize, rng: &mut R) -> LstmCell {
        let mut gates = Vec::with_capacity(GATES.len() * size);
        for gate in GATES {
            // Forget gates start open so early gradients can flow.
            let bias = if gate == Gate::Forget { 1.0 } else { 0.0 };
            for _ in 0..size {
                gates.push(Neuron::new(gates.len(), bias, xavier(rng, fan_in, fan_in)));
            }
        }
        LstmCell { gates, steps: VecDeque::new() }
    }

    pub fn gate(&self, gate: Gate, size: usize) -> &[Neuron] {
        let start = gate as usize * size;
        &self.gates[start..start + size]
    }

    /// Hidden and cell state left by the last step, or zeros.
    pub fn last_state(&self, size: usize) -> (Vec<f64>, Vec<f64>) {
        match self.steps.back() {
            Some(s) => (s.state.clone(), s.cell.clone()),
            None => (vec![0.0; size], vec![0.0; size]),
        }
    }

    fn push(&mut self, step: LstmStep) {
        self.steps.push_back(step);
        while self.steps.len() > BPTT_TRUNCATE + 1 {
            self.steps.pop_front();
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    ActivationFunction::Sigmoid.function(x)
}

pub(crate) fn forward(layer: &mut Layer, input: &[f64]) {
    let Layer { neurons, state, size, .. } = layer;
    let size = *size;
    let LayerState::Lstm(cell) = state else {
        return;
    };
    let (prev_state, prev_cell) = cell.last_state(size);
    let joined = [input, prev_state.as_slice()].concat();

    let mut gate_values = [vec![0.0; size], vec![0.0; size], vec![0.0; size]];
    for (g, values) in gate_values.iter_mut().enumerate() {
        for (j, v) in values.iter_mut().enumerate() {
            let unit = &mut cell.gates[g * size + j];
            unit.z_value = unit.weighted_sum(&joined);
            unit.activation = sigmoid(unit.z_value);
            *v = unit.activation;
        }
    }
    let [input_gate, forget_gate, output_gate] = gate_values;

    let mut candidate = vec![0.0; size];
    let mut cell_state = vec![0.0; size];
    let mut h = vec![0.0; size];
    for (j, n) in neurons.iter_mut().enumerate() {
        n.z_value = n.weighted_sum(&joined);
        candidate[j] = n.z_value.tanh();
        cell_state[j] = forget_gate[j] * prev_cell[j] + input_gate[j] * candidate[j];
        h[j] = output_gate[j] * cell_state[j].tanh();
        n.activation = h[j];
    }

    cell.push(LstmStep {
        input: input.to_vec(),
        prev_state,
        prev_cell,
        input_gate,
        forget_gate,
        output_gate,
        candidate,
        cell: cell_state,
        state: h,
    });
}

/// Truncated BPTT through the retained window. `dh` is ∂L/∂h for the most
/// recent step; candidate gradients go to `grads.neurons`, gate gradients
/// to `grads.shared` in `LstmCell::gates` order.
pub(crate) fn backward(layer: &Layer, dh: &[f64], grads: &mut LayerGradients) -> Vec<f64> {
    let LayerState::Lstm(cell) = &layer.state else {
        return Vec::new();
    };
    let Some(last) = cell.steps.back() else {
        return Vec::new();
    };
    let size = layer.size;
    let input_width = last.input.len();
    let mut input_delta = vec![0.0; input_width];
    let mut dh = dh.to_vec();
    let mut dc = vec![0.0; size];

    for (k, step) in cell.steps.iter().enumerate().rev() {
        let joined = [step.input.as_slice(), step.prev_state.as_slice()].concat();
        let mut dh_prev = vec![0.0; size];
        let mut dx = vec![0.0; input_width];

        for j in 0..size {
            let tanh_c = step.cell[j].tanh();
            let (i, f, o, g) = (
                step.input_gate[j],
                step.forget_gate[j],
                step.output_gate[j],
                step.candidate[j],
            );
            let d_cell = dc[j] + dh[j] * o * (1.0 - tanh_c * tanh_c);
            // ∂L/∂z for the input, forget and output gates and the candidate.
            let dz_gates = [
                d_cell * g * i * (1.0 - i),
                d_cell * step.prev_cell[j] * f * (1.0 - f),
                dh[j] * tanh_c * o * (1.0 - o),
            ];
            let dz_candidate = d_cell * i * (1.0 - g * g);
            dc[j] = d_cell * f;

            for gate in GATES {
                let idx = gate as usize * size + j;
                let d = dz_gates[gate as usize];
                accumulate(&mut grads.shared[idx], &cell.gates[idx], d, &joined, &mut dx, &mut dh_prev);
            }
            accumulate(&mut grads.neurons[j], &layer.neurons[j], dz_candidate, &joined, &mut dx, &mut dh_prev);
        }

        if k + 1 == cell.steps.len() {
            input_delta = dx;
        }
        dh = dh_prev;
    }
    input_delta
}

/// Adds one unit's contribution: its own gradient, plus its share of the
/// error flowing back to the input and the previous hidden state.
fn accumulate(
    grad: &mut Gradient,
    unit: &Neuron,
    d: f64,
    joined: &[f64],
    dx: &mut [f64],
    dh_prev: &mut [f64],
) {
    grad.bias += d;
    axpy(&mut grad.weights, d, joined);
    let (wx, wh) = unit.weights.split_at(dx.len());
    axpy(dx, d, wx);
    axpy(dh_prev, d, wh);
}
