// Model parameters
pub const SEQUENCE_LENGTH: usize = 10; // Number of time steps to look back
pub const HIDDEN_SIZE: usize = 64;
pub const NUM_LAYERS: usize = 2;
pub const DROPOUT: f64 = 0.2; // Applied between stacked LSTM layers while training
pub const DEFAULT_SEED: u64 = 42;

// Training parameters
pub const EPOCHS: usize = 100;
pub const BATCH_SIZE: usize = 32;
pub const LEARNING_RATE: f64 = 0.01;
pub const ADAM_EPSILON: f32 = 1e-8;
pub const LOSS_LOG_INTERVAL: usize = 10; // Epochs between loss log lines

// Forecasting
pub const FORECAST_STEPS: usize = 5;

// Data loading
pub const CLOSE_COLUMN_ALIASES: [&str; 6] = [
    "close",
    "adj close",
    "adj_close",
    "adjusted_close",
    "closeprice",
    "close_price",
];
pub const DATE_COLUMN_ALIASES: [&str; 5] = ["date", "datetime", "timestamp", "time", "day"];
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Service
pub const MAX_TRACKED_SYMBOLS: usize = 1024;

// Reports
pub const EXPERIMENT_DIR: &str = "experiments";
