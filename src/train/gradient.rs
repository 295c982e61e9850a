use crate::layers::layer::Layer;
use crate::network::network::Network;
use crate::math::vector::axpy;

/// Accumulated gradient for one trainable unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub bias: f64,
    pub weights: Vec<f64>,
}

impl Gradient {
    pub fn zeros(len: usize) -> Gradient {
        Gradient { bias: 0.0, weights: vec![0.0; len] }
    }

    fn add(&mut self, other: &Gradient) {
        self.bias += other.bias;
        axpy(&mut self.weights, 1.0, &other.weights);
    }

    fn scale(&mut self, factor: f64) {
        self.bias *= factor;
        for w in &mut self.weights {
            *w *= factor;
        }
    }
}

/// All gradients of one layer for the current batch.
///
/// `neurons` lines up with the layer's neurons when they own private weights
/// (empty otherwise); `shared` lines up with `Layer::shared_units`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerGradients {
    pub neurons: Vec<Gradient>,
    pub shared: Vec<Gradient>,
}

impl LayerGradients {
    pub fn zeroed(layer: &Layer) -> LayerGradients {
        let neurons = if layer.has_private_weights() {
            layer.neurons.iter().map(|n| Gradient::zeros(n.weights.len())).collect()
        } else {
            Vec::new()
        };
        let shared = layer
            .shared_units()
            .iter()
            .map(|(_, w)| Gradient::zeros(w.len()))
            .collect();
        LayerGradients { neurons, shared }
    }

    pub fn add(&mut self, other: &LayerGradients) {
        for (a, b) in self.neurons.iter_mut().zip(&other.neurons) {
            a.add(b);
        }
        for (a, b) in self.shared.iter_mut().zip(&other.shared) {
            a.add(b);
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.neurons.iter_mut().chain(self.shared.iter_mut()).for_each(|g| g.scale(factor));
    }
}

/// Fresh zeroed gradients for every layer of `network`.
pub fn zeroed(network: &Network) -> Vec<LayerGradients> {
    network.layers.iter().map(LayerGradients::zeroed).collect()
}
