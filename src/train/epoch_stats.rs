use serde::{Serialize, Deserialize};

/// Per-epoch training statistics returned by `train_loop`, one per
/// completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over every example seen this epoch, measured
    /// before each batch's update.
    pub train_loss: f64,
    /// Fraction of training examples predicted correctly, in [0, 1].
    pub train_accuracy: f64,
    /// Mean validation loss, if a validation set was provided.
    pub val_loss: Option<f64>,
    /// Validation accuracy, if a validation set was provided.
    pub val_accuracy: Option<f64>,
    /// Learning rate in effect during this epoch.
    pub learning_rate: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
