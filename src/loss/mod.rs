pub mod quadratic;
pub mod cross_entropy;
pub mod loss_type;
pub mod onehot;

pub use quadratic::QuadraticLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::LossType;
