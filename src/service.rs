//! Per-symbol prediction service
//!
//! Keeps one [`PricePredictor`] per symbol, each behind its own lock, and runs
//! the train-then-predict flow used to answer a price prediction request.
//! Predictors are never evicted, so the registry is capped at
//! `max_symbols` entries (default [`constants::MAX_TRACKED_SYMBOLS`]); a request
//! for a new symbol past the cap fails with an input error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use burn::tensor::backend::AutodiffBackend;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{ForecastError, Result};
use crate::forecaster::step_5_train_model::TrainingConfig;
use crate::forecaster::{ForecasterConfig, PricePredictor};

/// Forecast for one symbol, anchored to the date of its last observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    pub symbol: String,
    pub predictions: Vec<f64>,
    pub last_date: Option<String>,
}

/// Training diagnostics returned next to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: PricePrediction,
    pub losses: Vec<f64>,
}

type SharedPredictor<B> = Arc<Mutex<PricePredictor<B>>>;

pub struct PredictionService<B: AutodiffBackend> {
    forecaster: ForecasterConfig,
    training: TrainingConfig,
    device: B::Device,
    max_symbols: usize,
    predictors: Mutex<HashMap<String, SharedPredictor<B>>>,
}

impl<B: AutodiffBackend> PredictionService<B> {
    pub fn new(forecaster: ForecasterConfig, training: TrainingConfig, device: B::Device) -> Result<Self> {
        forecaster.validate()?;
        training.validate()?;
        Ok(Self {
            forecaster,
            training,
            device,
            max_symbols: constants::MAX_TRACKED_SYMBOLS,
            predictors: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_max_symbols(mut self, max_symbols: usize) -> Self {
        self.max_symbols = max_symbols;
        self
    }

    /// Predictor for `symbol`, created on first use
    fn predictor(&self, symbol: &str) -> Result<SharedPredictor<B>> {
        let mut predictors = self
            .predictors
            .lock()
            .map_err(|_| ForecastError::state("Predictor registry lock poisoned"))?;

        if let Some(existing) = predictors.get(symbol) {
            return Ok(Arc::clone(existing));
        }
        if predictors.len() >= self.max_symbols {
            return Err(ForecastError::input(format!(
                "Cannot track {}: already holding {} symbols",
                symbol, self.max_symbols
            )));
        }

        let predictor = PricePredictor::new(self.forecaster.clone(), self.device.clone())?;
        let shared = Arc::new(Mutex::new(predictor));
        predictors.insert(symbol.to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Number of symbols with a predictor
    pub fn symbols(&self) -> Result<usize> {
        self.predictors
            .lock()
            .map(|p| p.len())
            .map_err(|_| ForecastError::state("Predictor registry lock poisoned"))
    }

    /// Retrain the symbol's predictor on `series` and forecast `steps` values
    ///
    /// Train and predict run under the same per-symbol lock, so a concurrent
    /// request for the same symbol cannot swap the scaler or weights between them.
    pub fn predict_price(
        &self,
        symbol: &str,
        series: &[f64],
        last_date: Option<NaiveDate>,
        steps: usize,
    ) -> Result<PredictionOutcome> {
        if symbol.trim().is_empty() {
            return Err(ForecastError::input("Symbol must not be empty"));
        }
        if series.is_empty() {
            return Err(ForecastError::input(format!("No data found for {}", symbol)));
        }

        let shared = self.predictor(symbol)?;
        let mut predictor = shared
            .lock()
            .map_err(|_| ForecastError::state(format!("Predictor lock for {} poisoned", symbol)))?;

        info!("Training predictor for {} on {} observations", symbol, series.len());
        let losses = predictor.train(series, &self.training)?;
        let predictions = predictor.predict(series, steps)?;

        Ok(PredictionOutcome {
            prediction: PricePrediction {
                symbol: symbol.to_string(),
                predictions,
                last_date: last_date.map(|d| d.format(constants::DATE_FORMAT).to_string()),
            },
            losses,
        })
    }
}
