// External imports
use burn::module::{Module, Param};
use burn::nn::Linear;
use burn::tensor::{activation, backend::Backend, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

/// Linear layer with uniform(-1/sqrt(fan_in), 1/sqrt(fan_in)) weights and bias
/// drawn from `rng` rather than the backend's process-wide generator
pub fn seeded_linear<B: Backend>(
    d_input: usize,
    d_output: usize,
    rng: &mut StdRng,
    device: &B::Device,
) -> Linear<B> {
    let bound = 1.0 / (d_input as f64).sqrt();
    let mut draw = |n: usize| -> Vec<f32> {
        (0..n)
            .map(|_| rng.random_range(-bound..bound) as f32)
            .collect()
    };

    let weight = Tensor::<B, 1>::from_floats(draw(d_input * d_output).as_slice(), device)
        .reshape([d_input, d_output]);
    let bias = Tensor::<B, 1>::from_floats(draw(d_output).as_slice(), device);

    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

/// A single LSTM layer
///
/// All four gates share one input projection and one recurrent projection of
/// width `4 * hidden_size`, split as [input, forget, cell, output].
#[derive(Module, Debug)]
pub struct LstmLayer<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    input_weights: Linear<B>,
    hidden_weights: Linear<B>,
}

impl<B: Backend> LstmLayer<B> {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng, device: &B::Device) -> Self {
        let gate_size = 4 * hidden_size;
        let input_weights = seeded_linear(input_size, gate_size, rng, device);
        let hidden_weights = seeded_linear(hidden_size, gate_size, rng, device);

        Self {
            input_size,
            hidden_size,
            input_weights,
            hidden_weights,
        }
    }

    /// Runs the layer over a sequence starting from zeroed hidden and cell state
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, input_size]
    ///
    /// # Returns
    ///
    /// Returns the hidden state at every step, shape [batch_size, sequence_length, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let device = x.device();
        let [batch_size, seq_len, _] = x.dims();
        let hidden = self.hidden_size;

        let mut h = Tensor::<B, 2>::zeros([batch_size, hidden], &device);
        let mut c = Tensor::<B, 2>::zeros([batch_size, hidden], &device);
        let mut steps = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, self.input_size]);

            let gates = self.input_weights.forward(x_t) + self.hidden_weights.forward(h);

            let i = activation::sigmoid(gates.clone().narrow(1, 0, hidden));
            let f = activation::sigmoid(gates.clone().narrow(1, hidden, hidden));
            let g = activation::tanh(gates.clone().narrow(1, 2 * hidden, hidden));
            let o = activation::sigmoid(gates.narrow(1, 3 * hidden, hidden));

            c = f * c + i * g;
            h = o * activation::tanh(c.clone());

            steps.push(h.clone().reshape([batch_size, 1, hidden]));
        }

        Tensor::cat(steps, 1)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    #[cfg(test)]
    pub(crate) fn flat_weights(&self) -> Vec<f32> {
        let mut out = linear_values(&self.input_weights);
        out.extend(linear_values(&self.hidden_weights));
        out
    }
}

#[cfg(test)]
pub(crate) fn linear_values<B: Backend>(linear: &Linear<B>) -> Vec<f32> {
    let mut out = linear
        .weight
        .val()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap();
    if let Some(bias) = &linear.bias {
        out.extend(bias.val().into_data().convert::<f32>().to_vec::<f32>().unwrap());
    }
    out
}

/// Stack of LSTM layers with dropout on the outputs of every layer but the last
#[derive(Module, Debug)]
pub struct StackedLstm<B: Backend> {
    layers: Vec<LstmLayer<B>>,
    dropout: f64,
}

impl<B: Backend> StackedLstm<B> {
    /// Create a stacked LSTM
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of features per time step
    /// * `hidden_size` - Size of each layer's hidden state
    /// * `num_layers` - Depth of the stack, at least 1
    /// * `dropout` - Dropout probability between layers
    /// * `rng` - Source of the initial weights
    /// * `device` - Device to place tensors on
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f64,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Self {
        let layers = (0..num_layers.max(1))
            .map(|layer| {
                let layer_input = if layer == 0 { input_size } else { hidden_size };
                LstmLayer::new(layer_input, hidden_size, rng, device)
            })
            .collect();

        Self { layers, dropout }
    }

    /// Inverted dropout with a mask drawn from `rng`
    fn apply_dropout(&self, x: Tensor<B, 3>, rng: &mut StdRng) -> Tensor<B, 3> {
        if self.dropout <= 0.0 {
            return x;
        }
        let dims = x.dims();
        let keep = 1.0 - self.dropout;
        let scale = (1.0 / keep) as f32;
        let mask: Vec<f32> = (0..dims.iter().product::<usize>())
            .map(|_| if rng.random::<f64>() < keep { scale } else { 0.0 })
            .collect();
        let mask = Tensor::<B, 1>::from_floats(mask.as_slice(), &x.device()).reshape(dims);
        x * mask
    }

    /// Forward pass through every layer
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, input_size]
    /// * `dropout_rng` - Training mode when present: inter-layer dropout masks
    ///   are drawn from it. Inference passes `None`.
    ///
    /// # Returns
    ///
    /// Returns the top layer's hidden states, shape [batch_size, sequence_length, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>, mut dropout_rng: Option<&mut StdRng>) -> Tensor<B, 3> {
        let last = self.layers.len() - 1;
        let mut out = x;
        for (idx, layer) in self.layers.iter().enumerate() {
            out = layer.forward(out);
            if idx < last {
                if let Some(rng) = dropout_rng.as_deref_mut() {
                    out = self.apply_dropout(out, rng);
                }
            }
        }
        out
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[cfg(test)]
    pub(crate) fn flat_weights(&self) -> Vec<f32> {
        self.layers.iter().flat_map(|l| l.flat_weights()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(5)
    }

    #[test]
    fn test_layer_output_shape() {
        let device = NdArrayDevice::Cpu;
        let layer = LstmLayer::<TestBackend>::new(1, 8, &mut rng(), &device);
        let x = Tensor::<TestBackend, 3>::ones([4, 6, 1], &device);
        assert_eq!(layer.forward(x).dims(), [4, 6, 8]);
    }

    #[test]
    fn test_stacked_output_shape() {
        let device = NdArrayDevice::Cpu;
        let lstm = StackedLstm::<TestBackend>::new(1, 16, 3, 0.2, &mut rng(), &device);
        assert_eq!(lstm.num_layers(), 3);
        let x = Tensor::<TestBackend, 3>::zeros([2, 10, 1], &device);
        assert_eq!(lstm.forward(x, None).dims(), [2, 10, 16]);
    }

    #[test]
    fn test_seeded_linear_is_reproducible_and_bounded() {
        let device = NdArrayDevice::Cpu;
        let a = seeded_linear::<TestBackend>(16, 4, &mut rng(), &device);
        let b = seeded_linear::<TestBackend>(16, 4, &mut rng(), &device);
        let values = linear_values(&a);
        assert_eq!(values, linear_values(&b));
        assert_eq!(values.len(), 16 * 4 + 4);
        assert!(values.iter().all(|v| v.abs() <= 0.25));
    }

    #[test]
    fn test_hidden_state_is_bounded() {
        let device = NdArrayDevice::Cpu;
        let lstm = StackedLstm::<TestBackend>::new(1, 8, 2, 0.0, &mut rng(), &device);
        let x = Tensor::<TestBackend, 3>::ones([1, 5, 1], &device) * 100.0;
        let data = lstm.forward(x, None).into_data().convert::<f32>();
        // h = o * tanh(c) with o in (0, 1)
        assert!(data
            .as_slice::<f32>()
            .unwrap()
            .iter()
            .all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_state_does_not_leak_between_calls() {
        let device = NdArrayDevice::Cpu;
        let lstm = StackedLstm::<TestBackend>::new(1, 8, 2, 0.2, &mut rng(), &device);
        let x = Tensor::<TestBackend, 3>::ones([1, 5, 1], &device) * 0.5;

        let first = lstm.forward(x.clone(), None).into_data().convert::<f32>();
        let _ = lstm.forward(Tensor::ones([1, 5, 1], &device), None);
        let second = lstm.forward(x, None).into_data().convert::<f32>();
        assert_eq!(first.as_slice::<f32>().unwrap(), second.as_slice::<f32>().unwrap());
    }

    #[test]
    fn test_dropout_masks_follow_the_rng() {
        let device = NdArrayDevice::Cpu;
        let lstm = StackedLstm::<TestBackend>::new(1, 8, 2, 0.5, &mut rng(), &device);
        let x = Tensor::<TestBackend, 3>::ones([2, 4, 1], &device) * 0.5;

        let run = |seed: u64| {
            let mut dropout_rng = StdRng::seed_from_u64(seed);
            lstm.forward(x.clone(), Some(&mut dropout_rng))
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .unwrap()
        };
        assert_eq!(run(1), run(1));
        assert_ne!(run(1), run(2));

        let inference = lstm.forward(x.clone(), None).into_data().convert::<f32>();
        assert_ne!(run(1), inference.to_vec::<f32>().unwrap());
    }
}
