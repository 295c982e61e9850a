pub mod params;
pub mod flags;
pub mod neuron;
pub mod layer;
pub mod dense;
pub mod conv;
pub mod pooling;
pub mod recurrent;
pub mod lstm;
pub mod softmax;

pub use flags::Flags;
pub use layer::{Layer, LayerKind, LayerState, Upstream, BPTT_TRUNCATE};
pub use neuron::Neuron;
pub use params::{LayerParameters, Param, PoolingMode, UNSET};
