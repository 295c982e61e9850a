use log::debug;

use crate::activation::ActivationFunction;
use crate::error::{NetworkError, Result};
use crate::layers::conv::{derive_geometry, Geometry};
use crate::layers::flags::Flags;
use crate::layers::layer::{Layer, LayerKind, LayerState};
use crate::layers::neuron::Neuron;
use crate::layers::params::{LayerParameters, Param, PoolingMode};

#[derive(Debug, Clone, PartialEq)]
pub struct PoolingState {
    pub geometry: Geometry,
    pub mode: PoolingMode,
    /// For max pooling, the input index that won each output's window in
    /// the last forward pass. Backpropagation routes through these only.
    pub winners: Vec<usize>,
}

pub(crate) fn build(index: usize, params: Option<LayerParameters>, prev: &Layer) -> Result<Layer> {
    let mut params = params
        .ok_or(NetworkError::MissingParameter { index, param: Param::RegionSize.name() })?;
    let geometry = derive_geometry(index, &mut params, prev, true)?;
    let mode = params.pooling_mode();
    let size = geometry.output_len();
    debug!(
        "layer {index}: {mode:?} pooling {}x{} -> {}x{} over {} maps",
        geometry.input_width, geometry.input_height, geometry.output_width, geometry.output_height, geometry.features
    );
    Ok(Layer {
        kind: LayerKind::Pooling,
        index,
        size,
        params: Some(params),
        activation: ActivationFunction::Identity,
        neurons: (0..size).map(Neuron::passive).collect(),
        flags: Flags::empty(),
        state: LayerState::Pooling(PoolingState { geometry, mode, winners: vec![0; size] }),
    })
}

pub(crate) fn forward(layer: &mut Layer, input: &[f64]) {
    let zs = {
        let LayerState::Pooling(state) = &mut layer.state else {
            return;
        };
        let g = state.geometry;
        let mut zs = vec![0.0; g.output_len()];
        for f in 0..g.features {
            let base = f * g.input_plane();
            for oy in 0..g.output_height {
                for ox in 0..g.output_width {
                    let out = g.output_index(f, oy, ox);
                    match state.mode {
                        PoolingMode::Max => {
                            let mut best = f64::NEG_INFINITY;
                            let mut winner = base;
                            g.for_each_tap(oy, ox, |_, pos| {
                                if input[base + pos] > best {
                                    best = input[base + pos];
                                    winner = base + pos;
                                }
                            });
                            zs[out] = best;
                            state.winners[out] = winner;
                        }
                        PoolingMode::Average => {
                            let (mut sum, mut count) = (0.0, 0usize);
                            g.for_each_tap(oy, ox, |_, pos| {
                                sum += input[base + pos];
                                count += 1;
                            });
                            zs[out] = sum / count.max(1) as f64;
                        }
                    }
                }
            }
        }
        zs
    };
    layer.store(&zs, &zs);
}

/// Pooling has no weights: the error is handed back to the input that won
/// the max, or shared evenly across the window for average pooling.
pub(crate) fn backward(layer: &Layer, delta: &[f64]) -> Vec<f64> {
    let LayerState::Pooling(state) = &layer.state else {
        return Vec::new();
    };
    let g = &state.geometry;
    let mut input_delta = vec![0.0; g.input_len()];
    match state.mode {
        PoolingMode::Max => {
            for (&winner, &d) in state.winners.iter().zip(delta) {
                input_delta[winner] += d;
            }
        }
        PoolingMode::Average => {
            for f in 0..g.features {
                let base = f * g.input_plane();
                for oy in 0..g.output_height {
                    for ox in 0..g.output_width {
                        let mut cells = Vec::with_capacity(g.region * g.region);
                        g.for_each_tap(oy, ox, |_, pos| cells.push(base + pos));
                        let share = delta[g.output_index(f, oy, ox)] / cells.len().max(1) as f64;
                        for cell in cells {
                            input_delta[cell] += share;
                        }
                    }
                }
            }
        }
    }
    input_delta
}
