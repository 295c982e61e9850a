use thiserror::Error;

use crate::layers::layer::LayerKind;

/// Everything that can go wrong while building, running, training or
/// persisting a network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("the first layer must be a fully connected input layer with size > 0 (got {kind} of size {size})")]
    InvalidFirstLayer { kind: LayerKind, size: usize },

    #[error("layer {index}: invalid size {size}")]
    InvalidLayerSize { index: usize, size: usize },

    #[error("layer {index}: missing parameter {param}")]
    MissingParameter { index: usize, param: &'static str },

    #[error("layer {index}: previous layer of size {size} is not a square map")]
    NonSquareInput { index: usize, size: usize },

    #[error("layer {index}: output geometry is empty ({detail})")]
    EmptyGeometry { index: usize, detail: String },

    #[error("layer {index}: expects {expected} inputs but previous layer produces {actual}")]
    ShapeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("network has no layers")]
    EmptyNetwork,

    #[error("input length {actual} does not match network input size {expected}")]
    InputSize { expected: usize, actual: usize },

    #[error("dataset length {len} is not a multiple of element size {element_size}")]
    DatasetLength { len: usize, element_size: usize },

    #[error("dataset holds {available} elements, {requested} requested")]
    DatasetTooShort { available: usize, requested: usize },

    #[error("label {label} is not a valid class index for width {width}")]
    InvalidLabel { label: f64, width: usize },

    #[error("malformed sequence data: {0}")]
    MalformedSequence(String),

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("corrupt network file: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
