use std::fmt;
use std::sync::Arc;

use log::{error, info};

use crate::bundle::{ArtifactBundle, BundleError};
use crate::classifier::{Mlp, PostureModel};

/// Lifecycle of the service's bundle.
///
/// Built once during startup and never mutated afterwards, so request
/// handlers read it through an `Arc` without locking.
#[derive(Debug)]
pub enum ServiceState<M = Mlp> {
    Uninitialized,
    Loading,
    Ready(Arc<ArtifactBundle<M>>),
    Failed(String),
}

impl<M: PostureModel> ServiceState<M> {
    /// Runs `loader` and returns the resulting READY or FAILED state.
    pub fn start<F>(loader: F) -> Self
    where
        F: FnOnce() -> Result<ArtifactBundle<M>, BundleError>,
    {
        let mut state = Self::Uninitialized;
        state.transition(Self::Loading);

        let next = match loader() {
            Ok(bundle) => {
                info!(
                    "Serving bundle {} with labels {:?}",
                    bundle.bundle_id(),
                    bundle.labels().labels()
                );
                Self::Ready(Arc::new(bundle))
            }
            Err(e) => {
                error!("Failed to load artifact bundle: {}", e);
                Self::Failed(e.to_string())
            }
        };
        state.transition(next);
        state
    }

    fn transition(&mut self, next: Self) {
        info!("Service state: {} -> {}", self.name(), next.name());
        *self = next;
    }

    pub fn ready(bundle: ArtifactBundle<M>) -> Self {
        ServiceState::Ready(Arc::new(bundle))
    }

    pub fn bundle(&self) -> Option<&Arc<ArtifactBundle<M>>> {
        match self {
            ServiceState::Ready(bundle) => Some(bundle),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ServiceState::Ready(_))
    }
}

impl<M> ServiceState<M> {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "UNINITIALIZED",
            ServiceState::Loading => "LOADING",
            ServiceState::Ready(_) => "READY",
            ServiceState::Failed(_) => "FAILED",
        }
    }
}

impl<M> fmt::Display for ServiceState<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Failed(reason) => write!(f, "FAILED ({})", reason),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_failed_loader() {
        let state: ServiceState<Mlp> = ServiceState::start(|| {
            Err(BundleError::MissingArtifact {
                kind: crate::bundle::ArtifactKind::Scaler,
                path: PathBuf::from("scaler.json"),
            })
        });
        assert!(!state.is_ready());
        assert!(state.bundle().is_none());
        assert_eq!(state.name(), "FAILED");
        assert!(state.to_string().contains("scaler.json"));
    }

    #[test]
    fn test_ready_loader() {
        use crate::preprocessing::{LabelMapping, ScalerParams};
        let bundle = ArtifactBundle::new(
            ScalerParams::new([0.0; 8], [1.0; 8]).unwrap(),
            LabelMapping::new(vec!["straight".into(), "lean_left".into()]).unwrap(),
            Mlp::new(8, &[4], 2, 0).unwrap(),
        )
        .unwrap();
        let id = bundle.bundle_id().to_string();

        let state = ServiceState::start(move || Ok(bundle));
        assert!(state.is_ready());
        assert_eq!(state.bundle().map(|b| b.bundle_id().to_string()), Some(id));
    }
}
