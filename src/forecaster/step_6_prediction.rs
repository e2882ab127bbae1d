// External imports
use burn::tensor::backend::Backend;
use burn::tensor::cast::ToElement;
use std::collections::VecDeque;

// Internal imports
use super::step_1_scaler::MinMaxScaler;
use super::step_2_windowing::window_to_tensor;
use super::step_4_lstm_model_arch::PriceLstm;
use crate::error::{ForecastError, Result};

/// Single-step prediction on one normalized window
pub fn predict_next_step<B: Backend>(
    model: &PriceLstm<B>,
    window: &[f64],
    device: &B::Device,
) -> f64 {
    let input = window_to_tensor::<B>(window, device);
    model.predict(input).into_scalar().to_f64()
}

/// Generate multiple future predictions using autoregressive forecasting
///
/// Each prediction is appended to the rolling window and the oldest value is
/// dropped, so errors compound over the horizon.
///
/// # Arguments
///
/// * `model` - Trained model in inference mode
/// * `normalized` - Normalized history, at least `sequence_length` long
/// * `sequence_length` - Window length the model was trained on
/// * `steps` - Number of future values to produce
/// * `device` - Device to run prediction on
///
/// # Returns
///
/// Returns exactly `steps` normalized predictions
pub fn generate_forecast<B: Backend>(
    model: &PriceLstm<B>,
    normalized: &[f64],
    sequence_length: usize,
    steps: usize,
    device: &B::Device,
) -> Result<Vec<f64>> {
    if normalized.len() < sequence_length {
        return Err(ForecastError::input(format!(
            "Series has {} observations, need at least {} to seed the forecast window",
            normalized.len(),
            sequence_length
        )));
    }

    let mut buffer: VecDeque<f64> = normalized[normalized.len() - sequence_length..]
        .iter()
        .copied()
        .collect();
    let mut predictions = Vec::with_capacity(steps);

    for _ in 0..steps {
        let next = predict_next_step(model, buffer.make_contiguous(), device);
        predictions.push(next);
        buffer.pop_front();
        buffer.push_back(next);
    }

    Ok(predictions)
}

/// Convert predictions back to original scale
pub fn denormalize_predictions(predictions: &[f64], scaler: &MinMaxScaler) -> Result<Vec<f64>> {
    scaler.inverse_transform_series(predictions)
}
