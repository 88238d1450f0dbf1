//! Seated posture classification from eight pressure channels (`L1..L4` under
//! the left side of the seat, `R1..R4` under the right).
//!
//! The crate has two halves that share one artifact bundle:
//!
//! * an offline pipeline that reads labeled recordings, fits the scaler and the
//!   label mapping, trains a small feed-forward network and saves all three;
//! * an HTTP service that loads the bundle once and answers predictions.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use posture::{load_dataset, ArtifactBundle, SensorReading, Trainer};
//! use std::path::Path;
//!
//! let (dataset, _report) = load_dataset(Path::new("data"))?;
//! let trainer = Trainer::builder().epochs(50).build()?;
//! let outcome = trainer.fit(&dataset)?;
//! outcome.bundle.save("artifacts")?;
//!
//! let bundle = ArtifactBundle::load("artifacts")?;
//! let result = bundle.predict(&SensorReading::new([512.0; 8]))?;
//! println!("Predicted posture: {}", result.predicted_posture);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A loaded bundle is immutable and can be shared across threads using `Arc`:
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use posture::{ArtifactBundle, SensorReading};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let bundle = Arc::new(ArtifactBundle::load("artifacts")?);
//!
//! let mut handles = vec![];
//! for i in 0..3 {
//!     let bundle = Arc::clone(&bundle);
//!     handles.push(thread::spawn(move || {
//!         bundle.predict(&SensorReading::new([i as f64; 8])).unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod preprocessing;
pub mod service;

pub use bundle::{ArtifactBundle, ArtifactKind, BundleError, BundleInfo, PredictionResult};
pub use classifier::{
    ClassifierError, ConfusionMatrix, EpochStats, Mlp, PostureModel, TrainConfig, Trainer,
    TrainerBuilder, TrainingError, TrainingOutcome, TrainingReport,
};
pub use config::{default_artifacts_dir, ServiceConfig};
pub use dataset::{
    load_dataset, Dataset, DatasetError, LabeledSample, LoadReport, SensorReading, CHANNELS,
};
pub use preprocessing::{LabelMapping, PreprocessingError, ScalerParams};
pub use service::{router, serve, ServiceError, ServiceState};

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
