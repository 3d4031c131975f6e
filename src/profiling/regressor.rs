// src/profiling/regressor.rs
use serde::{Deserialize, Serialize};
use std::fmt;

// SmartCore imports
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::config::{FOREST_TREES, MODEL_SEED};
use crate::error::ProfileError;

/// Supervised model mapping standardized feature rows to a percentage grade.
pub trait Regressor: Sized {
    fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self, ProfileError>;
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ProfileError>;
}

/// Random forest regressor backed by SmartCore.
#[derive(Serialize, Deserialize)]
pub struct ForestRegressor {
    forest: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl fmt::Debug for ForestRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForestRegressor").finish_non_exhaustive()
    }
}

impl Regressor for ForestRegressor {
    fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self, ProfileError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ProfileError::Training(format!(
                "Feature rows ({}) and labels ({}) do not line up",
                x.len(),
                y.len()
            )));
        }

        let matrix = DenseMatrix::from_2d_vec(&x.to_vec());
        let labels = y.to_vec();

        // Every feature is a split candidate, as in plain bagged regression trees
        let forest_params = RandomForestRegressorParameters {
            n_trees: FOREST_TREES,
            m: Some(x[0].len()),
            seed: MODEL_SEED,
            ..Default::default()
        };

        let forest = RandomForestRegressor::fit(&matrix, &labels, forest_params)
            .map_err(|e| ProfileError::Training(format!("Failed to train random forest: {}", e)))?;

        Ok(Self { forest })
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ProfileError> {
        let matrix = DenseMatrix::from_2d_vec(&x.to_vec());
        self.forest
            .predict(&matrix)
            .map_err(|e| ProfileError::Inference(format!("Failed to generate prediction: {}", e)))
    }
}
