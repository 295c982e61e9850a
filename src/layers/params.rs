use serde::{Serialize, Deserialize};

/// Marks a parameter slot that was never set, so that a legitimate `0`
/// (e.g. zero padding) can be told apart from "use the default".
pub const UNSET: f64 = -9999999.99;

/// Number of slots in a convolutional/pooling parameter block.
pub const CONV_PARAMETER_COUNT: usize = 10;

/// Semantic indices into a `LayerParameters` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    FeatureCount = 0,
    RegionSize = 1,
    Stride = 2,
    InputWidth = 3,
    InputHeight = 4,
    OutputWidth = 5,
    OutputHeight = 6,
    Padding = 7,
    UseRelu = 8,
    /// 0 selects max pooling, 1 average pooling.
    PoolingMode = 9,
}

impl Param {
    pub fn name(self) -> &'static str {
        match self {
            Param::FeatureCount => "feature_count",
            Param::RegionSize => "region_size",
            Param::Stride => "stride",
            Param::InputWidth => "input_width",
            Param::InputHeight => "input_height",
            Param::OutputWidth => "output_width",
            Param::OutputHeight => "output_height",
            Param::Padding => "padding",
            Param::UseRelu => "use_relu",
            Param::PoolingMode => "pooling_mode",
        }
    }
}

/// How a pooling layer reduces its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMode {
    Max,
    Average,
}

/// A fixed-order numeric parameter block attached to a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParameters {
    values: Vec<f64>,
}

impl LayerParameters {
    /// A block of `count` unset slots.
    pub fn new(count: usize) -> Self {
        LayerParameters { values: vec![UNSET; count] }
    }

    /// Wraps raw values, e.g. as read back from a saved network.
    pub fn from_values(values: Vec<f64>) -> Self {
        LayerParameters { values }
    }

    /// Parameters for a convolutional or pooling layer. Geometry slots are
    /// left unset and filled in when the layer is added to a network.
    pub fn convolutional(
        feature_count: usize,
        region_size: usize,
        stride: usize,
        padding: usize,
        use_relu: bool,
    ) -> Self {
        let mut params = LayerParameters::new(CONV_PARAMETER_COUNT);
        params.set(Param::FeatureCount, feature_count as f64);
        params.set(Param::RegionSize, region_size as f64);
        params.set(Param::Stride, stride as f64);
        params.set(Param::Padding, padding as f64);
        params.set(Param::UseRelu, if use_relu { 1.0 } else { 0.0 });
        params
    }

    /// Returns the value at `param`, or `None` when the slot is missing or unset.
    pub fn get(&self, param: Param) -> Option<f64> {
        self.values
            .get(param as usize)
            .copied()
            .filter(|v| *v != UNSET)
    }

    /// Reads a slot as a non-negative integer.
    pub fn get_usize(&self, param: Param) -> Option<usize> {
        self.get(param).filter(|v| *v >= 0.0).map(|v| v as usize)
    }

    /// Sets `param`, growing the block with unset slots if needed.
    pub fn set(&mut self, param: Param, value: f64) {
        let idx = param as usize;
        if self.values.len() <= idx {
            self.values.resize(idx + 1, UNSET);
        }
        self.values[idx] = value;
    }

    /// Appends a value at the end of the block.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn use_relu(&self) -> bool {
        self.get(Param::UseRelu).map_or(false, |v| v != 0.0)
    }

    pub fn pooling_mode(&self) -> PoolingMode {
        match self.get(Param::PoolingMode) {
            Some(v) if v == 1.0 => PoolingMode::Average,
            _ => PoolingMode::Max,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sliding-window output length:
/// `floor((input - region + 2 * padding) / stride) + 1`.
///
/// Returns `None` when the window does not fit at least once.
pub fn output_dim(input: usize, region: usize, stride: usize, padding: usize) -> Option<usize> {
    if stride == 0 || region == 0 {
        return None;
    }
    let padded = padding.checked_mul(2)?.checked_add(input)?;
    let span = padded.checked_sub(region)?;
    Some(span / stride + 1)
}
