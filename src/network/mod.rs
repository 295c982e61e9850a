pub mod network;
pub mod serialize;
pub mod spec;

pub use network::{Network, NetworkStatus};
pub use spec::{ConvolutionSpec, LayerSpec, NetworkSpec};
