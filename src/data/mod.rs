pub mod dataset;

pub use dataset::{Dataset, Example, Sample};
