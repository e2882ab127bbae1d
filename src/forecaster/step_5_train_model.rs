// External imports
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::cast::ToElement;
use burn::tensor::Tensor;
use log::{debug, info};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_4_lstm_model_arch::PriceLstm;
use crate::constants;
use crate::error::{ForecastError, Result};

/// Configuration for training the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Adam denominator term
    pub adam_epsilon: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: constants::EPOCHS,
            batch_size: constants::BATCH_SIZE,
            learning_rate: constants::LEARNING_RATE,
            adam_epsilon: constants::ADAM_EPSILON,
        }
    }
}

impl TrainingConfig {
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f64) -> Self {
        Self {
            epochs,
            batch_size,
            learning_rate,
            adam_epsilon: constants::ADAM_EPSILON,
        }
    }

    pub fn optimizer_config(&self) -> AdamConfig {
        AdamConfig::new().with_epsilon(self.adam_epsilon)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ForecastError::input("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::input("batch_size must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::input(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.adam_epsilon.is_finite() && self.adam_epsilon > 0.0) {
            return Err(ForecastError::input("adam_epsilon must be positive"));
        }
        Ok(())
    }
}

/// Splits a tensor into contiguous batches along the first dimension; the
/// last batch holds the remainder
fn get_batches<B: Backend, const D: usize>(data: &Tensor<B, D>, batch_size: usize) -> Vec<Tensor<B, D>> {
    let num_samples = data.dims()[0];
    let mut batches = Vec::with_capacity(num_samples.div_ceil(batch_size));
    let mut start = 0;
    while start < num_samples {
        let end = usize::min(start + batch_size, num_samples);
        batches.push(data.clone().narrow(0, start, end - start));
        start = end;
    }
    batches
}

/// Mean squared error between predictions and targets
pub fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = predictions - targets;
    (diff.clone() * diff).mean()
}

/// Fits the model on windowed data with Adam
///
/// Batches are walked in window order every epoch; there is no shuffling.
///
/// # Arguments
///
/// * `model` - Freshly initialized model to train
/// * `features` - Windows of shape [num_pairs, sequence_length, 1]
/// * `targets` - Next values of shape [num_pairs, 1]
/// * `config` - Epochs, batch size and learning rate
/// * `rng` - Source of the dropout masks
///
/// # Returns
///
/// Returns the trained model and the mean batch loss of every epoch
pub fn train_model<B: AutodiffBackend>(
    mut model: PriceLstm<B>,
    features: Tensor<B, 3>,
    targets: Tensor<B, 2>,
    config: &TrainingConfig,
    rng: &mut StdRng,
) -> Result<(PriceLstm<B>, Vec<f64>)> {
    config.validate()?;
    if features.dims()[0] != targets.dims()[0] {
        return Err(ForecastError::input(format!(
            "Feature and target counts differ: {} vs {}",
            features.dims()[0],
            targets.dims()[0]
        )));
    }

    let feature_batches = get_batches(&features, config.batch_size);
    let target_batches = get_batches(&targets, config.batch_size);
    info!(
        "Training on {} windows in {} batches for {} epochs",
        features.dims()[0],
        feature_batches.len(),
        config.epochs
    );

    let mut optimizer = config.optimizer_config().init::<B, PriceLstm<B>>();
    let mut loss_history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        let mut epoch_loss = 0.0;
        for (batch_features, batch_targets) in feature_batches.iter().zip(target_batches.iter()) {
            let predictions = model.forward(batch_features.clone(), Some(&mut *rng));
            let loss = mse_loss(predictions, batch_targets.clone());
            epoch_loss += loss.clone().into_scalar().to_f64();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let avg_loss = epoch_loss / feature_batches.len() as f64;
        if !avg_loss.is_finite() {
            return Err(ForecastError::Model(format!(
                "Training diverged at epoch {} (loss = {})",
                epoch, avg_loss
            )));
        }
        loss_history.push(avg_loss);

        if epoch % constants::LOSS_LOG_INTERVAL == 0 {
            debug!("Epoch [{}/{}], Loss: {:.6}", epoch, config.epochs, avg_loss);
        }
    }

    info!(
        "Training completed, final loss {:.6}",
        loss_history.last().copied().unwrap_or_default()
    );
    Ok((model, loss_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecaster::step_2_windowing::{make_windows, pairs_to_tensors};
    use crate::forecaster::step_4_lstm_model_arch::PriceLstmConfig;
    use burn_autodiff::Autodiff;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use rand::SeedableRng;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_get_batches_keeps_remainder() {
        let device = NdArrayDevice::Cpu;
        let data = Tensor::<NdArray<f32>, 2>::zeros([70, 1], &device);
        let sizes: Vec<usize> = get_batches(&data, 32).iter().map(|b| b.dims()[0]).collect();
        assert_eq!(sizes, vec![32, 32, 6]);
    }

    #[test]
    fn test_mse_loss_value() {
        let device = NdArrayDevice::Cpu;
        let preds = Tensor::<NdArray<f32>, 1>::from_floats([1.0, 2.0, 3.0].as_slice(), &device)
            .reshape([3, 1]);
        let targets = Tensor::<NdArray<f32>, 1>::from_floats([1.0, 0.0, 6.0].as_slice(), &device)
            .reshape([3, 1]);
        let loss = mse_loss(preds, targets).into_scalar().to_f64();
        assert!((loss - 13.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_train_returns_one_loss_per_epoch() {
        let device = NdArrayDevice::Cpu;
        let series: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).sin() * 0.5 + 0.5).collect();
        let pairs = make_windows(&series, 5).unwrap();
        let (features, targets) = pairs_to_tensors::<TestBackend>(&pairs, &device).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let model = PriceLstmConfig::new(8, 1, 0.0).init::<TestBackend>(&mut rng, &device);
        let config = TrainingConfig::new(4, 16, 0.01);
        let (_, losses) = train_model(model, features, targets, &config, &mut rng).unwrap();

        assert_eq!(losses.len(), 4);
        assert!(losses.iter().all(|l| l.is_finite() && *l >= 0.0));
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());
        assert!(TrainingConfig::new(0, 32, 0.01).validate().is_err());
        assert!(TrainingConfig::new(10, 0, 0.01).validate().is_err());
        assert!(TrainingConfig::new(10, 32, 0.0).validate().is_err());
        assert!(TrainingConfig::new(10, 32, f64::NAN).validate().is_err());
        let mut bad = TrainingConfig::default();
        bad.adam_epsilon = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_adam_epsilon_defaults_to_1e_8() {
        assert_eq!(TrainingConfig::default().adam_epsilon, 1e-8);
        assert_eq!(TrainingConfig::new(5, 8, 0.1).adam_epsilon, 1e-8);

        let config: TrainingConfig = serde_json::from_str(r#"{ "epochs": 3 }"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.adam_epsilon, 1e-8);
    }
}
