pub mod gradient;
pub mod backprop;
pub mod trainer;
pub mod epoch_stats;
pub mod evaluate;
pub mod train_config;
pub mod loop_fn;

pub use backprop::{accumulate_example, accumulate_sequence};
pub use trainer::{train, train_network};
pub use epoch_stats::EpochStats;
pub use evaluate::{test, TestReport};
pub use gradient::{Gradient, LayerGradients};
pub use train_config::{TrainConfig, TrainingFlags};
pub use loop_fn::train_loop;
