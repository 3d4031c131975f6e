// src/profiling/repository.rs
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::anomaly::{AnomalyDetector, IsolationForest};
use super::feature_extraction::AssignmentFeatures;
use super::grader_profile::GraderProfile;
use super::regressor::{ForestRegressor, Regressor};
use super::types::{AnomalyAssessment, GradePrediction, ProfileStats, TrainingReport, TrainingSample};
use crate::error::{ModelLoadError, ProfileError, StoreError};
use crate::models::GraderId;

/// Key-value persistence for serialized profiles.
pub trait ModelStore: Send + Sync {
    fn load(&self, grader_id: &GraderId) -> Result<Option<Value>, StoreError>;
    fn save(&self, grader_id: &GraderId, state: &Value) -> Result<(), StoreError>;
}

/// One `marking_model_<grader>.json` file per grader under a directory.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Bytes outside `[A-Za-z0-9-]` become `_XX` hex escapes, so distinct ids
    /// never share a file and none can leave `dir`.
    pub fn path_for(&self, grader_id: &GraderId) -> PathBuf {
        let mut safe_id = String::with_capacity(grader_id.0.len());
        for byte in grader_id.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe_id.push(byte as char);
            } else {
                let _ = write!(safe_id, "_{:02X}", byte);
            }
        }
        self.dir.join(format!("marking_model_{}.json", safe_id))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl ModelStore for FileModelStore {
    fn load(&self, grader_id: &GraderId) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(grader_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, grader_id: &GraderId, state: &Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(grader_id);
        let tmp_path = path.with_extension("json.tmp");
        let serialized = serde_json::to_string_pretty(state)?;

        // Write then rename so readers never see a half-written profile
        fs::write(&tmp_path, serialized).map_err(|e| io_error(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| io_error(&path, e))?;
        debug!("Saved profile for grader {} to {}", grader_id, path.display());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    entries: Mutex<HashMap<GraderId, Value>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelStore for InMemoryModelStore {
    fn load(&self, grader_id: &GraderId) -> Result<Option<Value>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("model store lock poisoned".into()))?;
        Ok(entries.get(grader_id).cloned())
    }

    fn save(&self, grader_id: &GraderId, state: &Value) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("model store lock poisoned".into()))?;
        entries.insert(grader_id.clone(), state.clone());
        Ok(())
    }
}

/// Owns every grader profile and their persistence.
///
/// Profiles are loaded lazily on first access; unreadable state is logged and replaced by an
/// untrained profile.
pub struct ProfileRepository<R = ForestRegressor, A = IsolationForest> {
    store: Box<dyn ModelStore>,
    profiles: HashMap<GraderId, GraderProfile<R, A>>,
}

impl<R, A> ProfileRepository<R, A>
where
    R: Regressor + Serialize + DeserializeOwned,
    A: AnomalyDetector + Serialize + DeserializeOwned,
{
    pub fn new(store: Box<dyn ModelStore>) -> Self {
        Self {
            store,
            profiles: HashMap::new(),
        }
    }

    pub fn with_file_store(dir: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileModelStore::new(dir)))
    }

    /// Returns the cached profile, loading it from the store on first access.
    pub fn get_profile(&mut self, grader_id: &GraderId) -> &GraderProfile<R, A> {
        if !self.profiles.contains_key(grader_id) {
            let profile = self.load_or_new(grader_id);
            self.profiles.insert(grader_id.clone(), profile);
        }
        &self.profiles[grader_id]
    }

    /// Trains a fresh candidate and installs it only after it has been persisted.
    pub fn train(
        &mut self,
        grader_id: &GraderId,
        samples: &[TrainingSample],
    ) -> Result<TrainingReport, ProfileError> {
        let previous_version = self.get_profile(grader_id).version();

        let mut candidate =
            GraderProfile::<R, A>::new(grader_id.clone()).with_version(previous_version);
        let report = candidate.train(samples)?;

        let state = candidate.to_json()?;
        self.store.save(grader_id, &state)?;

        info!(
            "Persisted profile v{} for grader {} ({} samples)",
            report.version, grader_id, report.samples_used
        );
        self.profiles.insert(grader_id.clone(), candidate);
        Ok(report)
    }

    pub fn predict(
        &mut self,
        grader_id: &GraderId,
        features: &AssignmentFeatures,
    ) -> Result<GradePrediction, ProfileError> {
        self.get_profile(grader_id).predict(features)
    }

    pub fn detect_anomaly(
        &mut self,
        grader_id: &GraderId,
        actual_score: f64,
        features: &AssignmentFeatures,
    ) -> Result<AnomalyAssessment, ProfileError> {
        self.get_profile(grader_id).detect_anomaly(actual_score, features)
    }

    pub fn stats(&mut self, grader_id: &GraderId) -> ProfileStats {
        self.get_profile(grader_id).stats()
    }

    fn load_or_new(&self, grader_id: &GraderId) -> GraderProfile<R, A> {
        match self.try_load(grader_id) {
            Ok(Some(profile)) => {
                info!(
                    "Loaded profile v{} for grader {}",
                    profile.version(),
                    grader_id
                );
                profile
            }
            Ok(None) => {
                debug!("No stored profile for grader {}, starting untrained", grader_id);
                GraderProfile::new(grader_id.clone())
            }
            Err(e) => {
                warn!(
                    "Could not load profile for grader {}: {}. Starting untrained.",
                    grader_id, e
                );
                GraderProfile::new(grader_id.clone())
            }
        }
    }

    fn try_load(&self, grader_id: &GraderId) -> Result<Option<GraderProfile<R, A>>, ModelLoadError> {
        match self.store.load(grader_id)? {
            Some(value) => Ok(Some(GraderProfile::from_json(value)?)),
            None => Ok(None),
        }
    }
}
