use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layers::flags::Flags;
use crate::layers::layer::LayerKind;
use crate::layers::params::{LayerParameters, Param, PoolingMode};
use crate::loss::loss_type::LossType;
use crate::network::network::Network;

/// Options for a convolutional or pooling layer. Omitted fields fall back
/// to the same defaults `add_convolutional_layer` / `add_pooling_layer` use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionSpec {
    /// Filter count; ignored for pooling, which keeps the input's channels.
    #[serde(default = "default_features")]
    pub features: usize,
    #[serde(default = "default_region")]
    pub region: usize,
    /// `0` selects the default: 1 for convolution, `region` for pooling.
    #[serde(default)]
    pub stride: usize,
    #[serde(default)]
    pub padding: usize,
    #[serde(default)]
    pub use_relu: bool,
    #[serde(default)]
    pub pooling: Option<PoolingMode>,
}

fn default_features() -> usize {
    20
}

fn default_region() -> usize {
    5
}

impl ConvolutionSpec {
    fn to_params(&self) -> LayerParameters {
        let mut params = LayerParameters::convolutional(
            self.features,
            self.region,
            self.stride,
            self.padding,
            self.use_relu,
        );
        if let Some(PoolingMode::Average) = self.pooling {
            params.set(Param::PoolingMode, 1.0);
        }
        params
    }

    fn from_params(params: &LayerParameters, pooling: bool) -> ConvolutionSpec {
        let get = |p: Param| params.get_usize(p).unwrap_or(0);
        ConvolutionSpec {
            features: get(Param::FeatureCount),
            region: get(Param::RegionSize),
            stride: get(Param::Stride),
            padding: get(Param::Padding),
            use_relu: params.use_relu(),
            pooling: pooling.then(|| params.pooling_mode()),
        }
    }
}

/// One layer of a [`NetworkSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub kind: LayerKind,
    /// Neuron count; derived (and ignored) for convolutional and pooling layers.
    #[serde(default)]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convolution: Option<ConvolutionSpec>,
    /// Targets for this layer are class indices rather than full vectors.
    #[serde(default)]
    pub onehot: bool,
}

/// A serializable description of a network layout, independent of any
/// trained weights.
///
/// ```json
/// {
///   "name": "digits",
///   "layers": [
///     { "kind": "fully_connected", "size": 784 },
///     { "kind": "convolutional", "convolution": { "features": 20, "region": 5 } },
///     { "kind": "pooling", "convolution": { "region": 2 } },
///     { "kind": "softmax", "size": 10, "onehot": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub layers: Vec<LayerSpec>,
    /// Overrides the loss chosen from the layer kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<LossType>,
    #[serde(default)]
    pub onehot_input: bool,
}

impl NetworkSpec {
    /// Builds a network with weights drawn from `seed`, or from entropy.
    pub fn build(&self, seed: Option<u64>) -> Result<Network> {
        let mut network = match seed {
            Some(seed) => Network::with_seed(&self.name, seed),
            None => Network::new(&self.name),
        };
        for layer in &self.layers {
            let params = layer.convolution.as_ref().map(ConvolutionSpec::to_params);
            let built = network.add_layer(layer.kind, layer.size, params)?;
            built.flags.set(Flags::ONEHOT, layer.onehot);
        }
        if let Some(loss) = self.loss {
            network.loss = loss;
        }
        network.set_onehot_input(self.onehot_input);
        Ok(network)
    }

    /// Describes the layout of an existing network.
    pub fn from_network(network: &Network) -> NetworkSpec {
        let layers = network
            .layers
            .iter()
            .map(|layer| {
                let shaped = matches!(layer.kind, LayerKind::Convolutional | LayerKind::Pooling);
                LayerSpec {
                    kind: layer.kind,
                    size: layer.size,
                    convolution: layer
                        .params
                        .as_ref()
                        .filter(|_| shaped)
                        .map(|p| ConvolutionSpec::from_params(p, layer.kind == LayerKind::Pooling)),
                    onehot: layer.flags.contains(Flags::ONEHOT),
                }
            })
            .collect();
        NetworkSpec {
            name: network.name.clone(),
            layers,
            loss: Some(network.loss),
            onehot_input: network.onehot_input(),
        }
    }

    /// Writes the spec as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<NetworkSpec> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGITS: &str = r#"{
        "name": "digits",
        "layers": [
            { "kind": "fully_connected", "size": 784 },
            { "kind": "convolutional", "convolution": { "features": 4, "region": 5 } },
            { "kind": "pooling", "convolution": { "region": 2 } },
            { "kind": "softmax", "size": 10, "onehot": true }
        ]
    }"#;

    #[test]
    fn builds_from_json() {
        let spec: NetworkSpec = serde_json::from_str(DIGITS).unwrap();
        let net = spec.build(Some(1)).unwrap();
        assert_eq!(net.layers[1].size, 4 * 24 * 24);
        assert_eq!(net.layers[2].size, 4 * 12 * 12);
        assert_eq!(net.loss, LossType::CrossEntropy);
        assert!(net.onehot_output());
        assert!(!net.onehot_input());
    }

    #[test]
    fn from_network_rebuilds_the_same_layout() {
        let spec: NetworkSpec = serde_json::from_str(DIGITS).unwrap();
        let net = spec.build(Some(1)).unwrap();
        let described = NetworkSpec::from_network(&net);
        let rebuilt = described.build(Some(2)).unwrap();
        let shape = |n: &Network| n.layers.iter().map(|l| (l.kind, l.size)).collect::<Vec<_>>();
        assert_eq!(shape(&rebuilt), shape(&net));
        assert_eq!(described.layers[2].convolution.as_ref().unwrap().stride, 2);
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let bad = r#"{ "name": "x", "layers": [ { "kind": "dropout", "size": 3 } ] }"#;
        assert!(serde_json::from_str::<NetworkSpec>(bad).is_err());
    }
}
