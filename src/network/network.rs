use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{NetworkError, Result};
use crate::layers::flags::Flags;
use crate::layers::layer::{Layer, LayerKind, LayerState};
use crate::layers::params::LayerParameters;
use crate::loss::loss_type::LossType;
use crate::loss::onehot;

/// Lifecycle of a network with respect to training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Untrained,
    Trained,
    Training,
    Error,
}

#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub layers: Vec<Layer>,
    pub loss: LossType,
    pub flags: Flags,
    pub(crate) status: NetworkStatus,
    pub(crate) current_epoch: usize,
    pub(crate) current_batch: usize,
    /// Drives weight initialisation and per-epoch shuffling.
    pub(crate) rng: StdRng,
}

impl Network {
    /// An empty network whose weights and shuffles are seeded from entropy.
    pub fn new(name: &str) -> Network {
        Network::with_rng(name, StdRng::from_entropy())
    }

    /// An empty network whose initial weights and shuffle order are fully
    /// determined by `seed`.
    pub fn with_seed(name: &str, seed: u64) -> Network {
        Network::with_rng(name, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: &str, rng: StdRng) -> Network {
        Network {
            name: name.to_string(),
            layers: Vec::new(),
            loss: LossType::Quadratic,
            flags: Flags::empty(),
            status: NetworkStatus::Untrained,
            current_epoch: 0,
            current_batch: 0,
            rng,
        }
    }

    /// Appends a layer. Convolutional and pooling layers take their size from
    /// `params` and the previous layer, so `size` is ignored for them.
    ///
    /// On error the network is left exactly as it was.
    pub fn add_layer(
        &mut self,
        kind: LayerKind,
        size: usize,
        params: Option<LayerParameters>,
    ) -> Result<&mut Layer> {
        let index = self.layers.len();
        let layer = Layer::build(kind, index, size, params, self.layers.last(), &mut self.rng)?;
        debug!(
            "{}: added {} layer {} of size {} ({} parameters)",
            self.name,
            kind,
            index,
            layer.size,
            layer.parameter_count()
        );
        if kind == LayerKind::SoftMax {
            self.loss = LossType::CrossEntropy;
        }
        if kind.is_recurrent() {
            self.flags.insert(Flags::RECURRENT);
        }
        self.layers.push(layer);
        let last = self.layers.len() - 1;
        Ok(&mut self.layers[last])
    }

    pub fn add_convolutional_layer(&mut self, params: LayerParameters) -> Result<&mut Layer> {
        self.add_layer(LayerKind::Convolutional, 0, Some(params))
    }

    pub fn add_pooling_layer(&mut self, params: LayerParameters) -> Result<&mut Layer> {
        self.add_layer(LayerKind::Pooling, 0, Some(params))
    }

    /// Number of layers.
    pub fn size(&self) -> usize {
        self.layers.len()
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    pub fn output_layer(&self) -> Option<&Layer> {
        self.layers.last()
    }

    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    pub fn current_batch(&self) -> usize {
        self.current_batch
    }

    pub(crate) fn set_status(&mut self, status: NetworkStatus) {
        self.status = status;
    }

    pub fn is_recurrent(&self) -> bool {
        self.flags.contains(Flags::RECURRENT)
    }

    /// Marks raw inputs as class indices to be expanded to one-hot vectors.
    pub fn set_onehot_input(&mut self, on: bool) {
        self.flags.set(Flags::ONEHOT, on);
    }

    /// Marks the output layer's targets as class indices.
    pub fn set_onehot_output(&mut self, on: bool) {
        if let Some(layer) = self.layers.last_mut() {
            layer.flags.set(Flags::ONEHOT, on);
        }
    }

    pub fn onehot_input(&self) -> bool {
        self.flags.contains(Flags::ONEHOT)
    }

    pub fn onehot_output(&self) -> bool {
        self.layers.last().map_or(false, |l| l.flags.contains(Flags::ONEHOT))
    }

    /// Values one input occupies in a flat dataset buffer.
    pub fn input_element_size(&self) -> usize {
        if self.onehot_input() { 1 } else { self.input_size() }
    }

    /// Values one target occupies in a flat dataset buffer.
    pub fn target_element_size(&self) -> usize {
        if self.onehot_output() { 1 } else { self.output_size() }
    }

    pub fn element_size(&self) -> usize {
        self.input_element_size() + self.target_element_size()
    }

    /// Turns a raw dataset input into a full-width input vector.
    pub fn encode_input(&self, raw: &[f64]) -> Result<Vec<f64>> {
        onehot::encode(raw, self.input_size(), self.onehot_input())
    }

    /// Turns a raw dataset target into a full-width target vector.
    pub fn encode_target(&self, raw: &[f64]) -> Result<Vec<f64>> {
        onehot::encode(raw, self.output_size(), self.onehot_output())
    }

    /// Checks that every layer is shape-compatible with its predecessor.
    pub fn verify(&self) -> Result<()> {
        let Some(first) = self.layers.first() else {
            return Err(NetworkError::EmptyNetwork);
        };
        if first.kind != LayerKind::FullyConnected || first.size == 0 {
            return Err(NetworkError::InvalidFirstLayer { kind: first.kind, size: first.size });
        }
        for (index, pair) in self.layers.windows(2).enumerate() {
            let (prev, layer) = (&pair[0], &pair[1]);
            let index = index + 1;
            if layer.size == 0 || layer.neurons.len() != layer.size {
                return Err(NetworkError::InvalidLayerSize { index, size: layer.size });
            }
            let expected = layer.input_width().unwrap_or(0);
            if expected != prev.size {
                return Err(NetworkError::ShapeMismatch { index, expected, actual: prev.size });
            }
            let rows_match = match &layer.state {
                LayerState::Recurrent(_) | LayerState::Lstm(_) => {
                    layer.neurons.iter().all(|n| n.weights.len() == expected + layer.size)
                }
                LayerState::Plain => layer.neurons.iter().all(|n| n.weights.len() == expected),
                _ => true,
            };
            if !rows_match {
                return Err(NetworkError::ShapeMismatch { index, expected, actual: prev.size });
            }
        }
        Ok(())
    }

    /// Pushes `input` through every layer and returns the output activations.
    ///
    /// Fails, and flags the network as errored, if `input` is not exactly
    /// `input_size()` long.
    pub fn feedforward(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        if self.layers.is_empty() {
            self.status = NetworkStatus::Error;
            return Err(NetworkError::EmptyNetwork);
        }
        if input.len() != self.input_size() {
            self.status = NetworkStatus::Error;
            return Err(NetworkError::InputSize { expected: self.input_size(), actual: input.len() });
        }
        let mut current = input.to_vec();
        for layer in &mut self.layers {
            layer.feedforward(&current);
            current = layer.activations();
        }
        Ok(current)
    }

    /// Clears recurrent history; call between independent sequences.
    pub fn reset_state(&mut self) {
        for layer in &mut self.layers {
            layer.reset_state();
        }
    }

    /// Same architecture and flags, freshly initialised weights.
    pub fn clone_layout(&self) -> Result<Network> {
        let mut copy = Network::new(&self.name);
        copy.flags = self.flags;
        for layer in &self.layers {
            let added = copy.add_layer(layer.kind, layer.size, layer.params.clone())?;
            added.flags = layer.flags;
        }
        copy.loss = self.loss;
        Ok(copy)
    }

    /// Total count of trainable weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }
}
