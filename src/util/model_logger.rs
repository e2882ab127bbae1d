use std::fs;
use std::path::{Path, PathBuf};
use std::io::Write;

use chrono::Local;
use serde::{Serialize, Deserialize};

use crate::constants::EXPERIMENT_DIR;
use crate::error::Result;
use crate::forecaster::ForecasterConfig;
use crate::forecaster::step_5_train_model::TrainingConfig;

/// Record of one train-and-forecast run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub timestamp: String,
    pub symbol: String,
    pub forecaster: ForecasterConfig,
    pub training: TrainingConfig,
    pub observations: usize,
    pub losses: Vec<f64>,
    pub forecast: Vec<f64>,
    pub training_time_seconds: Option<f64>,
    pub notes: String,
}

impl TrainingReport {
    pub fn new(
        symbol: &str,
        forecaster: &ForecasterConfig,
        training: &TrainingConfig,
        observations: usize,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            symbol: symbol.to_string(),
            forecaster: forecaster.clone(),
            training: training.clone(),
            observations,
            losses: Vec::new(),
            forecast: Vec::new(),
            training_time_seconds: None,
            notes: String::new(),
        }
    }

    pub fn set_losses(&mut self, losses: Vec<f64>) {
        self.losses = losses;
    }

    pub fn set_forecast(&mut self, forecast: Vec<f64>) {
        self.forecast = forecast;
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    /// Relative loss drop between the first and last epoch
    pub fn loss_improvement(&self) -> Option<f64> {
        match (self.losses.first(), self.losses.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => Some((first - last) / first),
            _ => None,
        }
    }

    pub fn save(&self, experiment_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(experiment_dir)?;

        let filename = format!(
            "{}_l{}_h{}_d{}_e{}_report.json",
            file_stem(&self.symbol),
            self.forecaster.sequence_length,
            self.forecaster.hidden_size,
            self.forecaster.num_layers,
            self.training.epochs,
        );

        let file_path = experiment_dir.join(filename);
        let json = serde_json::to_string_pretty(&self)?;
        let mut file = fs::File::create(&file_path)?;
        file.write_all(json.as_bytes())?;

        Ok(file_path)
    }
}

/// Symbol reduced to `[A-Za-z0-9_-]` so it cannot leave the report directory
fn file_stem(symbol: &str) -> String {
    let stem: String = symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "series".to_string()
    } else {
        stem
    }
}

/// Timestamped directory under `root` for this run's reports
pub fn create_experiment_dir(root: Option<&Path>) -> Result<PathBuf> {
    let root = root.unwrap_or_else(|| Path::new(EXPERIMENT_DIR));
    let dir = root.join(Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
