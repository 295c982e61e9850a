//! Binary save format.
//!
//! Everything is little-endian. The header is the magic `PSNN`, a `u32`
//! format version, the network name (`u32` length + UTF-8), the network
//! flags (`u32`), the loss tag (`u8`) and the layer count (`u32`). Each layer
//! then stores its kind tag (`u8`), size and flags (`u32`), its parameter
//! block (`u32` count + `f64`s), its neurons' bias and weights when it owns
//! them, and finally its shared units (convolution filters, LSTM gates).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;

use crate::error::{NetworkError, Result};
use crate::layers::conv::derive_geometry;
use crate::layers::flags::Flags;
use crate::layers::layer::{Layer, LayerKind};
use crate::layers::params::LayerParameters;
use crate::loss::loss_type::LossType;
use crate::network::network::Network;

pub const MAGIC: &[u8; 4] = b"PSNN";
pub const FORMAT_VERSION: u32 = 1;

const MAX_NAME_LEN: usize = 1 << 16;
const MAX_PARAMETERS: usize = 64;
const MAX_LAYER_SIZE: usize = 1 << 24;
const MAX_LAYER_WEIGHTS: usize = 1 << 26;

impl Network {
    /// Writes the network to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!("saved network '{}' ({} layers) to {}", self.name, self.size(), path.display());
        Ok(())
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        write_len(w, self.name.len())?;
        w.write_all(self.name.as_bytes())?;
        w.write_u32::<LittleEndian>(self.flags.bits())?;
        w.write_u8(self.loss.tag())?;
        write_len(w, self.layers.len())?;
        for layer in &self.layers {
            write_layer(w, layer)?;
        }
        Ok(())
    }

    /// Reads a network saved with [`Network::save`]. The result is a new
    /// value; nothing is modified if the file is truncated or corrupt.
    pub fn load(path: impl AsRef<Path>) -> Result<Network> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let network = Network::read_from(&mut reader)?;
        info!(
            "loaded network '{}' ({} layers, {} parameters) from {}",
            network.name,
            network.size(),
            network.parameter_count(),
            path.display()
        );
        Ok(network)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Network> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(NetworkError::Corrupt("not a network file".into()));
        }
        let version = r.read_u32::<LittleEndian>().map_err(truncated)?;
        if version != FORMAT_VERSION {
            return Err(NetworkError::Corrupt(format!("unsupported format version {version}")));
        }

        let name_len = read_len(r)?;
        if name_len > MAX_NAME_LEN {
            return Err(NetworkError::Corrupt(format!("name length {name_len}")));
        }
        let mut name = vec![0u8; name_len];
        r.read_exact(&mut name).map_err(truncated)?;
        let name = String::from_utf8(name)
            .map_err(|_| NetworkError::Corrupt("name is not valid UTF-8".into()))?;

        let flags = read_flags(r, "network")?;
        let loss_tag = r.read_u8().map_err(truncated)?;
        let loss = LossType::from_tag(loss_tag)
            .ok_or_else(|| NetworkError::Corrupt(format!("unknown loss tag {loss_tag}")))?;
        let layer_count = read_len(r)?;
        if layer_count == 0 {
            return Err(NetworkError::Corrupt("network has no layers".into()));
        }

        let mut network = Network::new(&name);
        for index in 0..layer_count {
            read_layer(r, &mut network, index)?;
        }
        network.flags = flags;
        network.loss = loss;
        network.verify().map_err(|e| NetworkError::Corrupt(e.to_string()))?;
        Ok(network)
    }
}

fn write_len<W: Write>(w: &mut W, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length does not fit in u32"))?;
    w.write_u32::<LittleEndian>(len)?;
    Ok(())
}

fn write_unit<W: Write>(w: &mut W, bias: f64, weights: &[f64]) -> Result<()> {
    w.write_f64::<LittleEndian>(bias)?;
    write_len(w, weights.len())?;
    for &v in weights {
        w.write_f64::<LittleEndian>(v)?;
    }
    Ok(())
}

fn write_layer<W: Write>(w: &mut W, layer: &Layer) -> Result<()> {
    w.write_u8(layer.kind.tag())?;
    write_len(w, layer.size)?;
    w.write_u32::<LittleEndian>(layer.flags.bits())?;

    let values = layer.params.as_ref().map_or(&[][..], LayerParameters::values);
    write_len(w, values.len())?;
    for &v in values {
        w.write_f64::<LittleEndian>(v)?;
    }

    if layer.has_private_weights() {
        write_len(w, layer.neurons.len())?;
        for n in &layer.neurons {
            write_unit(w, n.bias, &n.weights)?;
        }
    } else {
        write_len(w, 0)?;
    }

    let shared = layer.shared_units();
    write_len(w, shared.len())?;
    for (bias, weights) in shared {
        write_unit(w, bias, weights)?;
    }
    Ok(())
}

fn truncated(e: io::Error) -> NetworkError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        NetworkError::Corrupt("file is truncated".into())
    } else {
        NetworkError::Io(e)
    }
}

fn read_len<R: Read>(r: &mut R) -> Result<usize> {
    Ok(r.read_u32::<LittleEndian>().map_err(truncated)? as usize)
}

fn read_flags<R: Read>(r: &mut R, owner: &str) -> Result<Flags> {
    let bits = r.read_u32::<LittleEndian>().map_err(truncated)?;
    Flags::from_bits(bits).ok_or_else(|| NetworkError::Corrupt(format!("{owner}: unknown flag bits {bits:#x}")))
}

/// Rejects a layer header whose weights would exceed `MAX_LAYER_WEIGHTS`,
/// before anything is allocated for it.
fn check_weight_count(
    network: &Network,
    index: usize,
    kind: LayerKind,
    size: usize,
    params: Option<&LayerParameters>,
) -> Result<()> {
    let Some(prev) = network.layers.last() else {
        return Ok(());
    };
    let weights = match kind {
        LayerKind::Pooling => Some(0),
        LayerKind::Convolutional => {
            let Some(params) = params else {
                return Ok(());
            };
            let mut params = params.clone();
            let g = derive_geometry(index, &mut params, prev, false)
                .map_err(|e| NetworkError::Corrupt(format!("layer {index}: {e}")))?;
            let outputs = g
                .output_width
                .checked_mul(g.output_height)
                .and_then(|plane| plane.checked_mul(g.features));
            expect_len("neurons", index, size, outputs.unwrap_or(usize::MAX))?;
            g.region
                .checked_mul(g.region)
                .and_then(|k| k.checked_mul(g.channels))
                .and_then(|k| k.checked_add(1))
                .and_then(|k| k.checked_mul(g.features))
        }
        LayerKind::Recurrent => prev.size.checked_add(size + 1).and_then(|row| row.checked_mul(size)),
        LayerKind::Lstm => prev
            .size
            .checked_add(size + 1)
            .and_then(|row| row.checked_mul(size))
            .and_then(|w| w.checked_mul(4)),
        LayerKind::FullyConnected | LayerKind::SoftMax => {
            (prev.size + 1).checked_mul(size)
        }
    };
    match weights {
        Some(w) if w <= MAX_LAYER_WEIGHTS => Ok(()),
        _ => Err(NetworkError::Corrupt(format!("layer {index}: too many weights for size {size}"))),
    }
}

fn expect_len(what: &str, index: usize, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(NetworkError::Corrupt(format!(
            "layer {index}: expected {expected} {what}, found {actual}"
        )));
    }
    Ok(())
}

/// Reads one unit into `bias` and `weights`, whose length is already fixed
/// by the rebuilt layer.
fn read_unit<R: Read>(r: &mut R, index: usize, bias: &mut f64, weights: &mut [f64]) -> Result<()> {
    *bias = r.read_f64::<LittleEndian>().map_err(truncated)?;
    expect_len("weights", index, weights.len(), read_len(r)?)?;
    r.read_f64_into::<LittleEndian>(weights).map_err(truncated)?;
    Ok(())
}

fn read_layer<R: Read>(r: &mut R, network: &mut Network, index: usize) -> Result<()> {
    let tag = r.read_u8().map_err(truncated)?;
    let kind = LayerKind::from_tag(tag)
        .ok_or_else(|| NetworkError::Corrupt(format!("layer {index}: unknown kind tag {tag}")))?;
    let size = read_len(r)?;
    if size > MAX_LAYER_SIZE {
        return Err(NetworkError::Corrupt(format!("layer {index}: size {size}")));
    }
    let flags = read_flags(r, &format!("layer {index}"))?;

    let count = read_len(r)?;
    if count > MAX_PARAMETERS {
        return Err(NetworkError::Corrupt(format!("layer {index}: {count} parameters")));
    }
    let mut values = vec![0.0; count];
    r.read_f64_into::<LittleEndian>(&mut values).map_err(truncated)?;
    let params = (!values.is_empty()).then(|| LayerParameters::from_values(values));
    check_weight_count(network, index, kind, size, params.as_ref())?;

    let layer = network
        .add_layer(kind, size, params)
        .map_err(|e| NetworkError::Corrupt(format!("layer {index}: {e}")))?;
    expect_len("neurons", index, size, layer.size)?;
    layer.flags = flags;

    let private = read_len(r)?;
    let expected = if layer.has_private_weights() { layer.neurons.len() } else { 0 };
    expect_len("weighted neurons", index, expected, private)?;
    for n in layer.neurons.iter_mut().take(private) {
        read_unit(r, index, &mut n.bias, &mut n.weights)?;
    }

    let shared = read_len(r)?;
    let units = layer.shared_units_mut();
    expect_len("shared units", index, units.len(), shared)?;
    for (bias, weights) in units {
        read_unit(r, index, bias, weights)?;
    }
    Ok(())
}
