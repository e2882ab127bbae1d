// External imports
use serde::{Deserialize, Serialize};

// Internal imports
use crate::error::{ForecastError, Result};

/// Fitted bounds of a min-max scaler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub min: f64,
    pub max: f64,
}

impl ScalerState {
    /// Width of the fitted range, zero for a constant series
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Whether the fitted series had no movement at all
    pub fn is_degenerate(&self) -> bool {
        self.range().abs() < f64::EPSILON
    }
}

/// Min-max scaler mapping a series onto [0, 1]
///
/// The map is affine and deliberately unclamped: values outside the fitted
/// range land outside [0, 1] and still round-trip through
/// [`MinMaxScaler::inverse_transform`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxScaler {
    state: Option<ScalerState>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler bounds on a series, replacing any previous fit
    ///
    /// # Arguments
    ///
    /// * `series` - Observations to take the minimum and maximum from
    ///
    /// # Returns
    ///
    /// Returns the fitted state, or an input error for an empty or non-finite series
    pub fn fit(&mut self, series: &[f64]) -> Result<ScalerState> {
        if series.is_empty() {
            return Err(ForecastError::input("Cannot fit scaler on an empty series"));
        }
        if let Some(pos) = series.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::input(format!(
                "Series contains a non-finite value at index {}",
                pos
            )));
        }

        let (min, max) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let state = ScalerState { min, max };
        if state.is_degenerate() {
            log::warn!(
                "Constant series ({}), all values will normalize to 0",
                min
            );
        }
        self.state = Some(state);
        Ok(state)
    }

    /// Fitted bounds, if any
    pub fn state(&self) -> Option<ScalerState> {
        self.state
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn fitted(&self) -> Result<ScalerState> {
        self.state
            .ok_or_else(|| ForecastError::state("Scaler has not been fitted; call train first"))
    }

    /// Map a raw value to the normalized scale
    pub fn transform(&self, value: f64) -> Result<f64> {
        let state = self.fitted()?;
        if state.is_degenerate() {
            return Ok(0.0);
        }
        Ok((value - state.min) / state.range())
    }

    /// Map a normalized value back to the raw scale
    pub fn inverse_transform(&self, normalized: f64) -> Result<f64> {
        let state = self.fitted()?;
        Ok(normalized * state.range() + state.min)
    }

    /// Normalize a whole series
    pub fn transform_series(&self, series: &[f64]) -> Result<Vec<f64>> {
        series.iter().map(|&v| self.transform(v)).collect()
    }

    /// Denormalize a whole series
    pub fn inverse_transform_series(&self, normalized: &[f64]) -> Result<Vec<f64>> {
        normalized
            .iter()
            .map(|&v| self.inverse_transform(v))
            .collect()
    }
}
