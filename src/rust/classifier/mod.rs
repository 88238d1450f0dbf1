mod error;
mod metrics;
mod model;
mod optim;
mod split;
mod trainer;
mod utils;
pub mod builder;

pub use builder::{TrainConfig, TrainerBuilder};
pub use error::{ClassifierError, TrainingError};
pub use metrics::{ConfusionMatrix, EpochStats, Evaluation, TrainingReport};
pub use model::{DenseLayer, Mlp, PostureModel};
pub use split::{stratified_split, validation_holdout, Split};
pub use trainer::{Trainer, TrainingOutcome};

pub(crate) use utils::argmax;
