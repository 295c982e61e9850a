pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod data;
pub mod optim;
pub mod train;

/// Library version, as reported by the command-line front end.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Convenience re-exports
pub use activation::ActivationFunction;
pub use data::{Dataset, Example, Sample};
pub use error::{NetworkError, Result};
pub use layers::{Flags, Layer, LayerKind, LayerParameters, Param, PoolingMode};
pub use loss::LossType;
pub use network::{Network, NetworkSpec, NetworkStatus};
pub use optim::Sgd;
pub use train::{test, train, train_network, EpochStats, TestReport, TrainConfig, TrainingFlags};
