use std::fmt;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::{NetworkError, Result};
use crate::layers::conv::{self, ConvolutionState};
use crate::layers::flags::Flags;
use crate::layers::lstm::{self, LstmCell};
use crate::layers::neuron::Neuron;
use crate::layers::params::LayerParameters;
use crate::layers::pooling::{self, PoolingState};
use crate::layers::recurrent::{self, RecurrentCell};
use crate::layers::{dense, softmax};
use crate::train::gradient::LayerGradients;

/// How many earlier timesteps a recurrent layer keeps for backpropagation
/// through time.
pub const BPTT_TRUNCATE: usize = 4;

/// The six layer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    FullyConnected,
    Convolutional,
    Pooling,
    Recurrent,
    Lstm,
    #[serde(rename = "softmax")]
    SoftMax,
}

impl LayerKind {
    pub const ALL: [LayerKind; 6] = [
        LayerKind::FullyConnected,
        LayerKind::Convolutional,
        LayerKind::Pooling,
        LayerKind::Recurrent,
        LayerKind::Lstm,
        LayerKind::SoftMax,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LayerKind::FullyConnected => "fully_connected",
            LayerKind::Convolutional => "convolutional",
            LayerKind::Pooling => "pooling",
            LayerKind::Recurrent => "recurrent",
            LayerKind::Lstm => "lstm",
            LayerKind::SoftMax => "softmax",
        }
    }

    pub fn from_label(label: &str) -> Option<LayerKind> {
        LayerKind::ALL.into_iter().find(|k| k.label() == label)
    }

    /// Stable numeric tag used by the binary save format.
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<LayerKind> {
        LayerKind::ALL.get(tag as usize).copied()
    }

    pub fn is_recurrent(self) -> bool {
        matches!(self, LayerKind::Recurrent | LayerKind::Lstm)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-kind side state. Dense and softmax layers need none.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerState {
    Plain,
    Convolution(ConvolutionState),
    Pooling(PoolingState),
    Recurrent(RecurrentCell),
    Lstm(LstmCell),
}

/// The error arriving at a layer from above during backpropagation.
#[derive(Debug, Clone, Copy)]
pub enum Upstream<'a> {
    /// ∂L/∂a: the layer still has to apply its own activation derivative.
    Activation(&'a [f64]),
    /// ∂L/∂z: already differentiated through the activation (the combined
    /// softmax + cross-entropy case).
    PreActivation(&'a [f64]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub index: usize,
    pub size: usize,
    pub params: Option<LayerParameters>,
    pub activation: ActivationFunction,
    pub neurons: Vec<Neuron>,
    pub flags: Flags,
    pub state: LayerState,
}

impl Layer {
    /// Builds the layer at position `index`, deriving its input width and any
    /// geometry from `prev`. Layer 0 is the input layer and has no weights.
    pub(crate) fn build<R: Rng + ?Sized>(
        kind: LayerKind,
        index: usize,
        size: usize,
        params: Option<LayerParameters>,
        prev: Option<&Layer>,
        rng: &mut R,
    ) -> Result<Layer> {
        let Some(prev) = prev else {
            if kind != LayerKind::FullyConnected || size == 0 {
                return Err(NetworkError::InvalidFirstLayer { kind, size });
            }
            return Ok(Layer {
                kind,
                index,
                size,
                params,
                activation: ActivationFunction::Identity,
                neurons: (0..size).map(Neuron::passive).collect(),
                flags: Flags::empty(),
                state: LayerState::Plain,
            });
        };

        match kind {
            LayerKind::Convolutional => return conv::build(index, params, prev, rng),
            LayerKind::Pooling => return pooling::build(index, params, prev),
            _ => {}
        }

        if size == 0 {
            return Err(NetworkError::InvalidLayerSize { index, size });
        }
        let (activation, fan_in, state) = match kind {
            LayerKind::SoftMax => (ActivationFunction::Softmax, prev.size, LayerState::Plain),
            LayerKind::Recurrent => (
                ActivationFunction::Tanh,
                prev.size + size,
                LayerState::Recurrent(RecurrentCell::default()),
            ),
            LayerKind::Lstm => (
                ActivationFunction::Tanh,
                prev.size + size,
                LayerState::Lstm(LstmCell::new(size, prev.size + size, rng)),
            ),
            _ => (ActivationFunction::Sigmoid, prev.size, LayerState::Plain),
        };

        Ok(Layer {
            kind,
            index,
            size,
            params,
            activation,
            neurons: dense::neurons(size, fan_in, rng),
            flags: Flags::empty(),
            state,
        })
    }

    pub fn is_input(&self) -> bool {
        self.index == 0
    }

    /// True when each neuron owns a private weight row that training updates.
    pub fn has_private_weights(&self) -> bool {
        !self.is_input()
            && matches!(
                self.kind,
                LayerKind::FullyConnected | LayerKind::SoftMax | LayerKind::Recurrent | LayerKind::Lstm
            )
    }

    /// The input width this layer was built for, `None` for the input layer.
    pub fn input_width(&self) -> Option<usize> {
        if self.is_input() {
            return None;
        }
        match &self.state {
            LayerState::Convolution(state) => Some(state.geometry.input_len()),
            LayerState::Pooling(state) => Some(state.geometry.input_len()),
            _ => {
                let row = self.neurons.first().map_or(0, |n| n.weights.len());
                if self.kind.is_recurrent() {
                    row.checked_sub(self.size)
                } else {
                    Some(row)
                }
            }
        }
    }

    pub fn activations(&self) -> Vec<f64> {
        self.neurons.iter().map(|n| n.activation).collect()
    }

    pub fn z_values(&self) -> Vec<f64> {
        self.neurons.iter().map(|n| n.z_value).collect()
    }

    /// Computes this layer's activations from the previous layer's.
    pub fn feedforward(&mut self, input: &[f64]) {
        if self.is_input() {
            for (n, &x) in self.neurons.iter_mut().zip(input) {
                n.z_value = x;
                n.activation = x;
            }
            return;
        }
        match self.kind {
            LayerKind::FullyConnected | LayerKind::SoftMax => dense::forward(self, input),
            LayerKind::Convolutional => conv::forward(self, input),
            LayerKind::Pooling => pooling::forward(self, input),
            LayerKind::Recurrent => recurrent::forward(self, input),
            LayerKind::Lstm => lstm::forward(self, input),
        }
    }

    /// Accumulates this layer's gradients into `grads` and returns ∂L/∂a for
    /// the previous layer. `input` must be the activations this layer saw in
    /// the matching forward pass.
    pub fn backpropagate(
        &self,
        upstream: Upstream<'_>,
        input: &[f64],
        grads: &mut LayerGradients,
    ) -> Vec<f64> {
        match self.kind {
            // Recurrent kinds differentiate through every retained step
            // themselves, so they take the activation-space error.
            LayerKind::Recurrent => recurrent::backward(self, upstream_values(upstream), grads),
            LayerKind::Lstm => lstm::backward(self, upstream_values(upstream), grads),
            _ => {
                let delta = self.delta_z(upstream);
                match self.kind {
                    LayerKind::Convolutional => conv::backward(self, &delta, input, grads),
                    LayerKind::Pooling => pooling::backward(self, &delta),
                    _ => dense::backward(self, &delta, input, grads),
                }
            }
        }
    }

    /// Converts an upstream error into ∂L/∂z for this layer.
    fn delta_z(&self, upstream: Upstream<'_>) -> Vec<f64> {
        match upstream {
            Upstream::PreActivation(delta) => delta.to_vec(),
            Upstream::Activation(delta) if self.activation == ActivationFunction::Softmax => {
                softmax::jacobian_product(&self.activations(), delta)
            }
            Upstream::Activation(delta) => delta
                .iter()
                .zip(&self.neurons)
                .map(|(d, n)| d * self.activation.derivative(n.z_value))
                .collect(),
        }
    }

    /// Forgets recurrent history so the next forward pass starts a new sequence.
    pub fn reset_state(&mut self) {
        match &mut self.state {
            LayerState::Recurrent(cell) => cell.steps.clear(),
            LayerState::Lstm(cell) => cell.steps.clear(),
            _ => {}
        }
    }

    /// Trainable units that do not belong to a single neuron: convolution
    /// filters and LSTM gates, as `(bias, weights)` pairs.
    pub fn shared_units(&self) -> Vec<(f64, &[f64])> {
        match &self.state {
            LayerState::Convolution(state) => state
                .shared
                .biases
                .iter()
                .zip(&state.shared.weights)
                .map(|(b, w)| (*b, w.as_slice()))
                .collect(),
            LayerState::Lstm(cell) => cell.gates.iter().map(|n| (n.bias, n.weights.as_slice())).collect(),
            _ => Vec::new(),
        }
    }

    pub fn shared_units_mut(&mut self) -> Vec<(&mut f64, &mut Vec<f64>)> {
        match &mut self.state {
            LayerState::Convolution(state) => state
                .shared
                .biases
                .iter_mut()
                .zip(state.shared.weights.iter_mut())
                .collect(),
            LayerState::Lstm(cell) => cell.gates.iter_mut().map(|n| (&mut n.bias, &mut n.weights)).collect(),
            _ => Vec::new(),
        }
    }

    /// Total count of trainable weights and biases.
    pub fn parameter_count(&self) -> usize {
        let private: usize = if self.has_private_weights() {
            self.neurons.iter().map(|n| n.weights.len() + 1).sum()
        } else {
            0
        };
        let shared: usize = self.shared_units().iter().map(|(_, w)| w.len() + 1).sum();
        private + shared
    }

    /// Writes freshly computed pre-activations and activations into the neurons.
    pub(crate) fn store(&mut self, zs: &[f64], activations: &[f64]) {
        for ((n, &z), &a) in self.neurons.iter_mut().zip(zs).zip(activations) {
            n.z_value = z;
            n.activation = a;
        }
    }
}

fn upstream_values(upstream: Upstream<'_>) -> &[f64] {
    match upstream {
        Upstream::Activation(d) | Upstream::PreActivation(d) => d,
    }
}
