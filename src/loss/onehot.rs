use crate::error::{NetworkError, Result};

/// Expands a class index into a vector of `width` zeros with a single 1.
pub fn expand(label: f64, width: usize) -> Result<Vec<f64>> {
    if label < 0.0 || label.fract() != 0.0 || label as usize >= width {
        return Err(NetworkError::InvalidLabel { label, width });
    }
    let mut v = vec![0.0; width];
    v[label as usize] = 1.0;
    Ok(v)
}

/// Either expands a single class index (`onehot`) or checks that `raw`
/// already has the full `width`.
pub fn encode(raw: &[f64], width: usize, onehot: bool) -> Result<Vec<f64>> {
    if onehot {
        match raw {
            [label] => expand(*label, width),
            _ => Err(NetworkError::InputSize { expected: 1, actual: raw.len() }),
        }
    } else if raw.len() != width {
        Err(NetworkError::InputSize { expected: width, actual: raw.len() })
    } else {
        Ok(raw.to_vec())
    }
}
