pub mod constants;
pub mod error;
pub mod forecaster;
pub mod service;
pub mod util {
    pub mod file_utils;
    pub mod model_logger;
}

pub use error::{ForecastError, Result};
pub use forecaster::step_5_train_model::TrainingConfig;
pub use forecaster::{ForecasterConfig, PricePredictor};
