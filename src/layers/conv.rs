//! Convolutional layers: a bank of filters whose weights are shared by
//! every spatial position they are applied to.

use log::debug;
use rand::Rng;

use crate::activation::ActivationFunction;
use crate::error::{NetworkError, Result};
use crate::layers::flags::Flags;
use crate::layers::layer::{Layer, LayerKind, LayerState};
use crate::layers::neuron::Neuron;
use crate::layers::params::{output_dim, LayerParameters, Param};
use crate::math::vector::xavier;
use crate::train::gradient::LayerGradients;

/// Spatial layout shared by convolutional and pooling layers.
///
/// Inputs and outputs are stored channel-major: `[channel][row][column]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub channels: usize,
    pub input_width: usize,
    pub input_height: usize,
    pub region: usize,
    pub stride: usize,
    pub padding: usize,
    pub features: usize,
    pub output_width: usize,
    pub output_height: usize,
}

impl Geometry {
    pub fn input_plane(&self) -> usize {
        self.input_width * self.input_height
    }

    pub fn output_plane(&self) -> usize {
        self.output_width * self.output_height
    }

    pub fn input_len(&self) -> usize {
        self.channels * self.input_plane()
    }

    pub fn output_len(&self) -> usize {
        self.features * self.output_plane()
    }

    pub fn output_index(&self, feature: usize, oy: usize, ox: usize) -> usize {
        feature * self.output_plane() + oy * self.output_width + ox
    }

    /// Visits every in-bounds cell of the window anchored at output
    /// position (`oy`, `ox`) within one input plane, passing the kernel
    /// offset `ky * region + kx` and the plane offset `iy * width + ix`.
    /// Cells falling in the zero padding are skipped.
    pub fn for_each_tap(&self, oy: usize, ox: usize, mut visit: impl FnMut(usize, usize)) {
        let top = (oy * self.stride) as isize - self.padding as isize;
        let left = (ox * self.stride) as isize - self.padding as isize;
        for ky in 0..self.region {
            let iy = top + ky as isize;
            if iy < 0 || iy >= self.input_height as isize {
                continue;
            }
            for kx in 0..self.region {
                let ix = left + kx as isize;
                if ix < 0 || ix >= self.input_width as isize {
                    continue;
                }
                visit(ky * self.region + kx, iy as usize * self.input_width + ix as usize);
            }
        }
    }
}

/// Filter bank for a convolutional layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedParams {
    pub feature_count: usize,
    /// `channels × region²`.
    pub weights_size: usize,
    pub biases: Vec<f64>,
    pub weights: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionState {
    pub geometry: Geometry,
    pub shared: SharedParams,
}

/// Channel count, width and height of whatever `prev` produces.
///
/// A layer carrying output geometry (convolution or pooling) is used as is;
/// anything else is read as one square channel.
fn input_map(index: usize, prev: &Layer) -> Result<(usize, usize, usize)> {
    if let Some(p) = &prev.params {
        if let (Some(c), Some(w), Some(h)) = (
            p.get_usize(Param::FeatureCount),
            p.get_usize(Param::OutputWidth),
            p.get_usize(Param::OutputHeight),
        ) {
            if matches!(prev.kind, LayerKind::Convolutional | LayerKind::Pooling) {
                return Ok((c, w, h));
            }
        }
    }
    let side = (prev.size as f64).sqrt().round() as usize;
    if side * side != prev.size {
        return Err(NetworkError::NonSquareInput { index, size: prev.size });
    }
    Ok((1, side, side))
}

/// Derives the geometry of a convolutional (`pooling == false`) or pooling
/// layer from its options and the previous layer, and writes the derived
/// values back into `params`.
pub(crate) fn derive_geometry(
    index: usize,
    params: &mut LayerParameters,
    prev: &Layer,
    pooling: bool,
) -> Result<Geometry> {
    let (channels, input_width, input_height) = input_map(index, prev)?;
    let region = params
        .get_usize(Param::RegionSize)
        .ok_or(NetworkError::MissingParameter { index, param: Param::RegionSize.name() })?;
    let default_stride = if pooling { region } else { 1 };
    let stride = params
        .get_usize(Param::Stride)
        .filter(|s| *s > 0)
        .unwrap_or(default_stride);
    let padding = params.get_usize(Param::Padding).unwrap_or(0);
    let features = if pooling {
        channels
    } else {
        params
            .get_usize(Param::FeatureCount)
            .ok_or(NetworkError::MissingParameter { index, param: Param::FeatureCount.name() })?
    };
    if features == 0 {
        return Err(NetworkError::InvalidLayerSize { index, size: 0 });
    }

    let dims = (
        output_dim(input_width, region, stride, padding),
        output_dim(input_height, region, stride, padding),
    );
    let (Some(output_width), Some(output_height)) = dims else {
        return Err(NetworkError::EmptyGeometry {
            index,
            detail: format!(
                "{input_width}x{input_height} input, region {region}, stride {stride}, padding {padding}"
            ),
        });
    };

    params.set(Param::FeatureCount, features as f64);
    params.set(Param::Stride, stride as f64);
    params.set(Param::Padding, padding as f64);
    params.set(Param::InputWidth, input_width as f64);
    params.set(Param::InputHeight, input_height as f64);
    params.set(Param::OutputWidth, output_width as f64);
    params.set(Param::OutputHeight, output_height as f64);

    Ok(Geometry {
        channels,
        input_width,
        input_height,
        region,
        stride,
        padding,
        features,
        output_width,
        output_height,
    })
}

pub(crate) fn build<R: Rng + ?Sized>(
    index: usize,
    params: Option<LayerParameters>,
    prev: &Layer,
    rng: &mut R,
) -> Result<Layer> {
    let mut params = params
        .ok_or(NetworkError::MissingParameter { index, param: Param::RegionSize.name() })?;
    let geometry = derive_geometry(index, &mut params, prev, false)?;
    let weights_size = geometry.channels * geometry.region * geometry.region;
    let shared = SharedParams {
        feature_count: geometry.features,
        weights_size,
        biases: vec![0.0; geometry.features],
        weights: (0..geometry.features)
            .map(|_| xavier(rng, weights_size, weights_size))
            .collect(),
    };
    let activation = if params.use_relu() {
        ActivationFunction::ReLU
    } else {
        ActivationFunction::Identity
    };
    let size = geometry.output_len();
    debug!(
        "layer {index}: convolution {}x{}x{} -> {}x{}x{} ({} filters of {})",
        geometry.channels,
        geometry.input_width,
        geometry.input_height,
        geometry.features,
        geometry.output_width,
        geometry.output_height,
        geometry.features,
        weights_size
    );

    Ok(Layer {
        kind: LayerKind::Convolutional,
        index,
        size,
        params: Some(params),
        activation,
        neurons: (0..size).map(Neuron::passive).collect(),
        flags: Flags::empty(),
        state: LayerState::Convolution(ConvolutionState { geometry, shared }),
    })
}

pub(crate) fn forward(layer: &mut Layer, input: &[f64]) {
    let zs = {
        let LayerState::Convolution(state) = &layer.state else {
            return;
        };
        let g = &state.geometry;
        let kernel = g.region * g.region;
        let mut zs = vec![0.0; g.output_len()];
        for (f, filter) in state.shared.weights.iter().enumerate() {
            for oy in 0..g.output_height {
                for ox in 0..g.output_width {
                    let mut z = state.shared.biases[f];
                    for c in 0..g.channels {
                        let plane = &input[c * g.input_plane()..(c + 1) * g.input_plane()];
                        let w = &filter[c * kernel..(c + 1) * kernel];
                        g.for_each_tap(oy, ox, |k, pos| z += w[k] * plane[pos]);
                    }
                    zs[g.output_index(f, oy, ox)] = z;
                }
            }
        }
        zs
    };
    let mut activations = vec![0.0; zs.len()];
    layer.activation.apply(&zs, &mut activations);
    layer.store(&zs, &activations);
}

/// Each filter weight was used at every output position of its feature
/// map, so its gradient is the sum over those positions of
/// `δ(position) × input(position + offset)`.
pub(crate) fn backward(
    layer: &Layer,
    delta: &[f64],
    input: &[f64],
    grads: &mut LayerGradients,
) -> Vec<f64> {
    let mut input_delta = vec![0.0; input.len()];
    let LayerState::Convolution(state) = &layer.state else {
        return input_delta;
    };
    let g = &state.geometry;
    let kernel = g.region * g.region;
    for (f, filter) in state.shared.weights.iter().enumerate() {
        let grad = &mut grads.shared[f];
        for oy in 0..g.output_height {
            for ox in 0..g.output_width {
                let d = delta[g.output_index(f, oy, ox)];
                if d == 0.0 {
                    continue;
                }
                grad.bias += d;
                for c in 0..g.channels {
                    let base = c * g.input_plane();
                    let w = &filter[c * kernel..(c + 1) * kernel];
                    let gw = &mut grad.weights[c * kernel..(c + 1) * kernel];
                    g.for_each_tap(oy, ox, |k, pos| {
                        gw[k] += d * input[base + pos];
                        input_delta[base + pos] += d * w[k];
                    });
                }
            }
        }
    }
    input_delta
}
