//! The deployable unit: scaler parameters, label mapping and model weights
//! from one training run, saved and loaded together.
//!
//! Every member file carries the bundle id, the SHA-256 of all three members'
//! contents. Loading refuses members whose ids disagree (files from different
//! runs) and members whose contents no longer hash to their id.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{argmax, ClassifierError, Mlp, PostureModel};
use crate::dataset::{SensorReading, NUM_CHANNELS};
use crate::preprocessing::{LabelMapping, ScalerParams};

pub const MODEL_FILE: &str = "posture_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const LABELS_FILE: &str = "label_mapping.json";

/// Allowed deviation of a probability distribution's sum from 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Scaler,
    Labels,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] =
        [ArtifactKind::Model, ArtifactKind::Scaler, ArtifactKind::Labels];

    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Model => MODEL_FILE,
            ArtifactKind::Scaler => SCALER_FILE,
            ArtifactKind::Labels => LABELS_FILE,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Labels => "label_mapping",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Missing {kind} artifact: {path} not found")]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Corrupt {kind} artifact at {path}: {reason}")]
    Corrupt {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },
    #[error("{kind} artifact belongs to bundle {actual}, expected {expected}")]
    BundleMismatch {
        kind: ArtifactKind,
        expected: String,
        actual: String,
    },
    #[error("Hash mismatch: bundle id is {expected} but contents hash to {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("Inconsistent bundle: {0}")]
    Inconsistent(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk envelope shared by the three member files.
#[derive(Serialize, Deserialize)]
struct ArtifactFile<T> {
    bundle_id: String,
    kind: String,
    content: T,
}

/// Outcome of one prediction, keyed by canonical label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_posture: String,
    pub probabilities: BTreeMap<String, f64>,
}

/// Summary of a loaded bundle.
#[derive(Debug, Clone, Serialize)]
pub struct BundleInfo {
    pub bundle_id: String,
    pub labels: Vec<String>,
    pub num_features: usize,
    pub num_classes: usize,
}

/// Scaler parameters, label mapping and model produced by one fitting run.
///
/// The only constructor takes all three at once and there are no setters, so
/// members of different runs cannot be combined after the fact.
#[derive(Debug, Clone)]
pub struct ArtifactBundle<M = Mlp> {
    bundle_id: String,
    scaler: ScalerParams,
    labels: LabelMapping,
    model: M,
}

impl<M: PostureModel + Serialize> ArtifactBundle<M> {
    /// Assembles a bundle and derives its id from the members' contents.
    pub fn new(scaler: ScalerParams, labels: LabelMapping, model: M) -> Result<Self, BundleError> {
        check_consistency(&scaler, &labels, &model)?;
        let bundle_id = compute_bundle_id(&scaler, &labels, &model)?;
        Ok(Self {
            bundle_id,
            scaler,
            labels,
            model,
        })
    }

    /// Writes the three member files into `dir`, creating it if needed.
    ///
    /// Each file is written beside its final path and renamed into place.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), BundleError> {
        let dir = dir.as_ref();
        log::info!("Saving artifact bundle {} to {:?}", self.bundle_id, dir);
        fs::create_dir_all(dir)?;

        self.write_member(dir, ArtifactKind::Scaler, &self.scaler)?;
        self.write_member(dir, ArtifactKind::Labels, &self.labels)?;
        self.write_member(dir, ArtifactKind::Model, &self.model)?;
        Ok(())
    }

    fn write_member<T: Serialize>(
        &self,
        dir: &Path,
        kind: ArtifactKind,
        content: &T,
    ) -> Result<(), BundleError> {
        let path = dir.join(kind.file_name());
        let envelope = ArtifactFile {
            bundle_id: self.bundle_id.clone(),
            kind: kind.tag().to_string(),
            content,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        log::info!("  {} saved as {:?} ({} bytes)", kind, path, bytes.len());
        Ok(())
    }
}

impl ArtifactBundle<Mlp> {
    /// Loads a bundle saved by `save`.
    ///
    /// # Errors
    /// - `MissingArtifact` if any of the three files is absent
    /// - `Corrupt` if a file cannot be parsed or is tagged as the wrong member
    /// - `BundleMismatch` if the files were produced by different runs
    /// - `IntegrityMismatch` if the contents were altered after saving
    /// - `Inconsistent` if the members disagree on shape
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, BundleError> {
        let dir = dir.as_ref();
        log::info!("Loading artifact bundle from {:?}", dir);

        for (kind, path) in artifact_paths(dir) {
            if !path.exists() {
                log::error!("Missing {} artifact at {:?}", kind, path);
                return Err(BundleError::MissingArtifact { kind, path });
            }
        }

        let model: ArtifactFile<Mlp> = read_member(dir, ArtifactKind::Model)?;
        let scaler: ArtifactFile<ScalerParams> = read_member(dir, ArtifactKind::Scaler)?;
        let labels: ArtifactFile<LabelMapping> = read_member(dir, ArtifactKind::Labels)?;

        let expected = model.bundle_id;
        let members = [
            (ArtifactKind::Scaler, &scaler.bundle_id),
            (ArtifactKind::Labels, &labels.bundle_id),
        ];
        for (kind, actual) in members {
            if *actual != expected {
                return Err(BundleError::BundleMismatch {
                    kind,
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }

        model
            .content
            .validate()
            .map_err(|e| BundleError::Inconsistent(e.to_string()))?;
        let bundle = Self::new(scaler.content, labels.content, model.content)?;
        if bundle.bundle_id != expected {
            log::error!("Bundle hash mismatch: expected {}, got {}", expected, bundle.bundle_id);
            return Err(BundleError::IntegrityMismatch {
                expected,
                actual: bundle.bundle_id,
            });
        }

        log::info!("Artifact bundle {} loaded", bundle.bundle_id);
        log::info!("Known labels: {:?}", bundle.labels.labels());
        Ok(bundle)
    }
}

impl<M: PostureModel> ArtifactBundle<M> {
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn scaler(&self) -> &ScalerParams {
        &self.scaler
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn info(&self) -> BundleInfo {
        BundleInfo {
            bundle_id: self.bundle_id.clone(),
            labels: self.labels.labels().to_vec(),
            num_features: self.model.num_features(),
            num_classes: self.model.num_classes(),
        }
    }

    /// Scales `reading`, runs the model and decodes the result through the
    /// label mapping.
    pub fn predict(&self, reading: &SensorReading) -> Result<PredictionResult, ClassifierError> {
        let features = self.scaler.transform(reading);
        let probabilities = self.model.predict_proba(features.view())?;

        if probabilities.len() != self.labels.len() {
            return Err(ClassifierError::PredictionError(format!(
                "Model returned {} probabilities for {} labels",
                probabilities.len(),
                self.labels.len()
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ClassifierError::PredictionError(
                "Model returned a negative or non-finite probability".into(),
            ));
        }
        let sum = probabilities.sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ClassifierError::PredictionError(format!(
                "Probabilities sum to {}, expected 1",
                sum
            )));
        }

        let best = argmax(probabilities.view());
        let predicted_posture = self
            .labels
            .decode(best)
            .ok_or_else(|| ClassifierError::PredictionError(format!("No label at index {}", best)))?
            .to_string();
        let probabilities = self
            .labels
            .labels()
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(PredictionResult {
            predicted_posture,
            probabilities,
        })
    }
}

/// Paths of the three member files of a bundle stored in `dir`.
pub fn artifact_paths(dir: &Path) -> [(ArtifactKind, PathBuf); 3] {
    ArtifactKind::ALL.map(|kind| (kind, dir.join(kind.file_name())))
}

/// Whether all three member files exist in `dir`.
pub fn is_complete(dir: &Path) -> bool {
    artifact_paths(dir).iter().all(|(_, path)| path.exists())
}

fn read_member<T: DeserializeOwned>(
    dir: &Path,
    kind: ArtifactKind,
) -> Result<ArtifactFile<T>, BundleError> {
    let path = dir.join(kind.file_name());
    let bytes = fs::read(&path)?;
    let file: ArtifactFile<T> = serde_json::from_slice(&bytes).map_err(|e| BundleError::Corrupt {
        kind,
        path: path.clone(),
        reason: e.to_string(),
    })?;
    if file.kind != kind.tag() {
        return Err(BundleError::Corrupt {
            kind,
            path,
            reason: format!("file is tagged as '{}'", file.kind),
        });
    }
    log::info!("  {} read from {:?} ({} bytes)", kind, path, bytes.len());
    Ok(file)
}

fn check_consistency<M: PostureModel>(
    scaler: &ScalerParams,
    labels: &LabelMapping,
    model: &M,
) -> Result<(), BundleError> {
    scaler
        .validate()
        .map_err(|e| BundleError::Inconsistent(e.to_string()))?;
    labels
        .validate()
        .map_err(|e| BundleError::Inconsistent(e.to_string()))?;
    if model.num_features() != NUM_CHANNELS {
        return Err(BundleError::Inconsistent(format!(
            "model expects {} features, scaler produces {}",
            model.num_features(),
            NUM_CHANNELS
        )));
    }
    if model.num_classes() != labels.len() {
        return Err(BundleError::Inconsistent(format!(
            "model outputs {} classes but the label mapping has {}",
            model.num_classes(),
            labels.len()
        )));
    }
    Ok(())
}

fn compute_bundle_id<M: Serialize>(
    scaler: &ScalerParams,
    labels: &LabelMapping,
    model: &M,
) -> Result<String, BundleError> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(scaler)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(labels)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(model)?);
    Ok(format!("{:x}", hasher.finalize()))
}
