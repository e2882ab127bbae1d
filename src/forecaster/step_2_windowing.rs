// External crates
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::{Array1, Array2};

// Internal modules
use crate::error::{ForecastError, Result};

/// A fixed-length slice of a series paired with the value that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPair {
    pub window: Vec<f64>,
    pub target: f64,
}

/// Slices a series into overlapping windows and their next-value targets
///
/// # Arguments
///
/// * `series` - Ordered observations, oldest first
/// * `sequence_length` - Number of observations per window
///
/// # Returns
///
/// Returns `series.len() - sequence_length` pairs in series order, or an input
/// error when the series is too short to produce a single pair
pub fn make_windows(series: &[f64], sequence_length: usize) -> Result<Vec<WindowPair>> {
    if sequence_length == 0 {
        return Err(ForecastError::input("Sequence length must be at least 1"));
    }
    if series.len() <= sequence_length {
        return Err(ForecastError::input(format!(
            "Series has {} observations, need at least {} for sequence_length {}",
            series.len(),
            sequence_length + 1,
            sequence_length
        )));
    }

    let pairs = series
        .windows(sequence_length + 1)
        .map(|chunk| WindowPair {
            window: chunk[..sequence_length].to_vec(),
            target: chunk[sequence_length],
        })
        .collect();

    Ok(pairs)
}

/// Stacks window pairs into model-ready tensors
///
/// # Returns
///
/// Returns features of shape [num_pairs, sequence_length, 1] and targets of
/// shape [num_pairs, 1]
pub fn pairs_to_tensors<B: Backend>(
    pairs: &[WindowPair],
    device: &B::Device,
) -> Result<(Tensor<B, 3>, Tensor<B, 2>)> {
    let num_pairs = pairs.len();
    let sequence_length = match pairs.first() {
        Some(pair) => pair.window.len(),
        None => return Err(ForecastError::input("No windows to convert to tensors")),
    };
    if pairs.iter().any(|p| p.window.len() != sequence_length) {
        return Err(ForecastError::input("All windows must share one length"));
    }

    let features = Array2::from_shape_fn((num_pairs, sequence_length), |(i, t)| {
        pairs[i].window[t] as f32
    });
    let targets: Array1<f32> = pairs.iter().map(|p| p.target as f32).collect();

    // Both arrays are freshly built in standard layout
    let feature_buf = features
        .as_slice()
        .ok_or_else(|| ForecastError::Model("Feature matrix is not contiguous".to_string()))?;
    let target_buf = targets
        .as_slice()
        .ok_or_else(|| ForecastError::Model("Target vector is not contiguous".to_string()))?;

    let features = Tensor::<B, 1>::from_floats(feature_buf, device)
        .reshape([num_pairs, sequence_length, 1]);
    let targets = Tensor::<B, 1>::from_floats(target_buf, device).reshape([num_pairs, 1]);

    Ok((features, targets))
}

/// Converts a single window into a batch of one: [1, window.len(), 1]
pub fn window_to_tensor<B: Backend>(window: &[f64], device: &B::Device) -> Tensor<B, 3> {
    let buf: Vec<f32> = window.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_floats(buf.as_slice(), device).reshape([1, window.len(), 1])
}
