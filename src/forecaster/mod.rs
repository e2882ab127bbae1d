/// # Sequence Forecaster
///
/// Turns a univariate price series into a trained recurrent model and produces
/// multi-step forecasts by feeding each prediction back into the input window.
///
/// ## Module Structure:
///
/// 1. **step_1_scaler**: Min-max scaling onto [0, 1] and back
/// 2. **step_2_windowing**: Window/target pairs and their tensor form
/// 3. **step_3_lstm_cell**: Stacked LSTM with zeroed state per call
/// 4. **step_4_lstm_model_arch**: LSTM stack plus linear projection to one value
/// 5. **step_5_train_model**: Adam training loop over contiguous batches
/// 6. **step_6_prediction**: Autoregressive multi-step forecasting
///
/// [`PricePredictor`] ties the steps together and owns the fitted scaler and
/// the model weights. All randomness (initial weights, dropout masks) comes
/// from an `StdRng` seeded with `ForecasterConfig::seed` at the start of each
/// `new` and `train`, never from the backend's process-wide generator, so the
/// same seed gives the same losses and forecasts whatever other threads do.
/// An instance itself is not meant to be shared: `train` takes `&mut self`,
/// so concurrent use needs one instance per symbol or an external lock.
pub mod step_1_scaler;
pub mod step_2_windowing;
pub mod step_3_lstm_cell;
pub mod step_4_lstm_model_arch;
pub mod step_5_train_model;
pub mod step_6_prediction;

// External imports
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Internal imports
use crate::constants;
use crate::error::{ForecastError, Result};
use step_1_scaler::MinMaxScaler;
use step_2_windowing::{make_windows, pairs_to_tensors};
use step_4_lstm_model_arch::{PriceLstm, PriceLstmConfig};
use step_5_train_model::{train_model, TrainingConfig};
use step_6_prediction::{denormalize_predictions, generate_forecast};

/// Construction-time settings of a [`PricePredictor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecasterConfig {
    /// Window length used for both training and inference
    pub sequence_length: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    /// Seeds weight initialization and dropout masks
    pub seed: u64,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            sequence_length: constants::SEQUENCE_LENGTH,
            hidden_size: constants::HIDDEN_SIZE,
            num_layers: constants::NUM_LAYERS,
            dropout: constants::DROPOUT,
            seed: constants::DEFAULT_SEED,
        }
    }
}

impl ForecasterConfig {
    pub fn with_sequence_length(mut self, sequence_length: usize) -> Self {
        self.sequence_length = sequence_length;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(ForecastError::input("sequence_length must be at least 1"));
        }
        if self.hidden_size == 0 {
            return Err(ForecastError::input("hidden_size must be at least 1"));
        }
        if self.num_layers == 0 {
            return Err(ForecastError::input("num_layers must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::input(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    pub fn model_config(&self) -> PriceLstmConfig {
        PriceLstmConfig::new(self.hidden_size, self.num_layers, self.dropout)
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

/// Trainable univariate forecaster
#[derive(Debug)]
pub struct PricePredictor<B: AutodiffBackend> {
    config: ForecasterConfig,
    device: B::Device,
    model: PriceLstm<B>,
    scaler: MinMaxScaler,
}

impl<B: AutodiffBackend> PricePredictor<B> {
    /// Create an untrained predictor on the given device
    pub fn new(config: ForecasterConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let model = config.model_config().init::<B>(&mut rng, &device);

        Ok(Self {
            config,
            device,
            model,
            scaler: MinMaxScaler::new(),
        })
    }

    pub fn config(&self) -> &ForecasterConfig {
        &self.config
    }

    pub fn sequence_length(&self) -> usize {
        self.config.sequence_length
    }

    pub fn model(&self) -> &PriceLstm<B> {
        &self.model
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    pub fn is_trained(&self) -> bool {
        self.scaler.is_fitted()
    }

    /// Train from scratch on a series
    ///
    /// Refits the scaler and re-initializes the weights, so nothing from an
    /// earlier call survives. State is only replaced once training succeeds.
    ///
    /// # Arguments
    ///
    /// * `series` - Observations, oldest first, at least `sequence_length + 1` long
    /// * `training` - Epochs, batch size and learning rate
    ///
    /// # Returns
    ///
    /// Returns the average loss of every epoch
    pub fn train(&mut self, series: &[f64], training: &TrainingConfig) -> Result<Vec<f64>> {
        training.validate()?;
        let sequence_length = self.config.sequence_length;
        if series.len() <= sequence_length {
            return Err(ForecastError::input(format!(
                "Training needs at least {} observations for sequence_length {}, got {}",
                sequence_length + 1,
                sequence_length,
                series.len()
            )));
        }

        info!("Normalizing {} observations", series.len());
        let mut scaler = MinMaxScaler::new();
        scaler.fit(series)?;
        let normalized = scaler.transform_series(series)?;

        let pairs = make_windows(&normalized, sequence_length)?;
        let (features, targets) = pairs_to_tensors::<B>(&pairs, &self.device)?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let model = self.config.model_config().init::<B>(&mut rng, &self.device);
        let (model, losses) = train_model(model, features, targets, training, &mut rng)?;

        self.model = model;
        self.scaler = scaler;
        Ok(losses)
    }

    /// Forecast `steps` values past the end of `series`
    ///
    /// The series is scaled with the bounds fitted by the last `train` call. It
    /// does not have to be the training series; values outside the fitted range
    /// are scaled without clamping.
    ///
    /// # Returns
    ///
    /// Returns exactly `steps` forecasts in original units
    pub fn predict(&self, series: &[f64], steps: usize) -> Result<Vec<f64>> {
        let state = self
            .scaler
            .state()
            .ok_or_else(|| ForecastError::state("predict called before train"))?;

        let sequence_length = self.config.sequence_length;
        if series.len() < sequence_length {
            return Err(ForecastError::input(format!(
                "Prediction needs at least {} observations, got {}",
                sequence_length,
                series.len()
            )));
        }

        let recent = &series[series.len() - sequence_length..];
        if let Some(v) = recent.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::input(format!(
                "Prediction window contains a non-finite value ({})",
                v
            )));
        }
        if recent.iter().any(|&v| v < state.min || v > state.max) {
            warn!(
                "Prediction window leaves the fitted range [{}, {}]",
                state.min, state.max
            );
        }

        let normalized = self.scaler.transform_series(recent)?;
        let model = self.model.valid();
        let predictions = generate_forecast(&model, &normalized, sequence_length, steps, &self.device)?;

        denormalize_predictions(&predictions, &self.scaler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn small_config() -> ForecasterConfig {
        ForecasterConfig {
            sequence_length: 5,
            hidden_size: 8,
            num_layers: 2,
            dropout: 0.2,
            seed: 7,
        }
    }

    #[test]
    fn test_predict_before_train_is_state_error() {
        let predictor = PricePredictor::<TestBackend>::new(small_config(), NdArrayDevice::Cpu).unwrap();
        assert!(!predictor.is_trained());
        let series: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert!(matches!(
            predictor.predict(&series, 3),
            Err(ForecastError::State(_))
        ));
    }

    #[test]
    fn test_train_rejects_short_series() {
        let mut predictor = PricePredictor::<TestBackend>::new(small_config(), NdArrayDevice::Cpu).unwrap();
        let result = predictor.train(&[1.0, 2.0, 3.0], &TrainingConfig::new(5, 32, 0.01));
        assert!(matches!(result, Err(ForecastError::Input(_))));
        assert!(!predictor.is_trained());

        let exact = [1.0, 2.0, 3.0, 4.0, 5.0];
        let result = predictor.train(&exact, &TrainingConfig::new(5, 32, 0.01));
        assert!(matches!(result, Err(ForecastError::Input(_))));
    }

    #[test]
    fn test_train_then_predict() {
        let mut predictor = PricePredictor::<TestBackend>::new(small_config(), NdArrayDevice::Cpu).unwrap();
        let series: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let losses = predictor.train(&series, &TrainingConfig::new(3, 8, 0.01)).unwrap();
        assert_eq!(losses.len(), 3);
        assert!(predictor.is_trained());

        let forecast = predictor.predict(&series, 4).unwrap();
        assert_eq!(forecast.len(), 4);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_predict_rejects_short_series() {
        let mut predictor = PricePredictor::<TestBackend>::new(small_config(), NdArrayDevice::Cpu).unwrap();
        let series: Vec<f64> = (0..12).map(|i| i as f64).collect();
        predictor.train(&series, &TrainingConfig::new(1, 4, 0.01)).unwrap();
        assert!(matches!(
            predictor.predict(&series[..4], 2),
            Err(ForecastError::Input(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(ForecasterConfig::default().validate().is_ok());
        assert!(small_config().with_sequence_length(0).validate().is_err());
        let mut bad = small_config();
        bad.dropout = 1.0;
        assert!(bad.validate().is_err());
        assert!(PricePredictor::<TestBackend>::new(bad, NdArrayDevice::Cpu).is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecaster.json");
        std::fs::write(&path, r#"{ "sequence_length": 20, "seed": 3 }"#).unwrap();

        let config = ForecasterConfig::from_json_file(&path).unwrap();
        assert_eq!(config.sequence_length, 20);
        assert_eq!(config.seed, 3);
        assert_eq!(config.hidden_size, constants::HIDDEN_SIZE);
    }
}
