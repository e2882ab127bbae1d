// External imports
use burn::module::Module;
use burn::nn::Linear;
use burn::tensor::{backend::Backend, Tensor};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_3_lstm_cell::{seeded_linear, StackedLstm};
use crate::constants;

/// Recurrent regressor mapping a window of normalized prices to the next one
#[derive(Module, Debug)]
pub struct PriceLstm<B: Backend> {
    hidden_size: usize,
    lstm: StackedLstm<B>,
    output_layer: Linear<B>,
}

impl<B: Backend> PriceLstm<B> {
    /// Create a new model
    ///
    /// # Arguments
    ///
    /// * `hidden_size` - Size of each LSTM layer's hidden state
    /// * `num_layers` - Number of stacked LSTM layers
    /// * `dropout` - Dropout rate between LSTM layers during training
    /// * `rng` - Source of the initial weights
    /// * `device` - Device to place tensors on
    pub fn new(
        hidden_size: usize,
        num_layers: usize,
        dropout: f64,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Self {
        // Univariate series: one feature per time step
        let lstm = StackedLstm::new(1, hidden_size, num_layers, dropout, rng, device);
        let output_layer = seeded_linear(hidden_size, 1, rng, device);

        Self {
            hidden_size,
            lstm,
            output_layer,
        }
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, 1]
    /// * `dropout_rng` - Training mode when present, dropout masks are drawn from it
    ///
    /// # Returns
    ///
    /// Returns the output tensor of shape [batch_size, 1]
    pub fn forward(&self, x: Tensor<B, 3>, dropout_rng: Option<&mut StdRng>) -> Tensor<B, 2> {
        let [batch_size, sequence_length, _] = x.dims();

        let lstm_out = self.lstm.forward(x, dropout_rng);

        // Only the last step's hidden output feeds the projection
        let last_output = lstm_out
            .narrow(1, sequence_length - 1, 1)
            .reshape([batch_size, self.hidden_size]);

        self.output_layer.forward(last_output)
    }

    /// Inference-mode forward pass
    pub fn predict(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        self.forward(x, None)
    }

    #[cfg(test)]
    pub(crate) fn flat_weights(&self) -> Vec<f32> {
        let mut out = self.lstm.flat_weights();
        out.extend(super::step_3_lstm_cell::linear_values(&self.output_layer));
        out
    }
}

/// Configuration for [`PriceLstm`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLstmConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
}

impl Default for PriceLstmConfig {
    fn default() -> Self {
        Self {
            hidden_size: constants::HIDDEN_SIZE,
            num_layers: constants::NUM_LAYERS,
            dropout: constants::DROPOUT,
        }
    }
}

impl PriceLstmConfig {
    pub fn new(hidden_size: usize, num_layers: usize, dropout: f64) -> Self {
        Self {
            hidden_size,
            num_layers,
            dropout,
        }
    }

    /// Initialize a model with weights drawn from `rng`
    pub fn init<B: Backend>(&self, rng: &mut StdRng, device: &B::Device) -> PriceLstm<B> {
        PriceLstm::new(self.hidden_size, self.num_layers, self.dropout, rng, device)
    }
}
