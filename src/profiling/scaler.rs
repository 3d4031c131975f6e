// src/profiling/scaler.rs
use serde::{Deserialize, Serialize};

// SmartCore imports
use smartcore::api::{Transformer, UnsupervisedEstimator};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::preprocessing::numerical::{StandardScaler, StandardScalerParameters};

use crate::error::ProfileError;

/// Per-column standardization fitted on the training matrix.
///
/// SmartCore divides zero-variance columns by the smallest positive float,
/// so columns that were constant at fit time are pinned to zero instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    scaler: StandardScaler<f64>,
    constant_columns: Vec<bool>,
}

impl FeatureScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ProfileError> {
        let n_features = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || n_features == 0 {
            return Err(ProfileError::Training(
                "Cannot fit a scaler on an empty matrix".into(),
            ));
        }

        let constant_columns = (0..n_features)
            .map(|col| rows.iter().all(|row| row[col] == rows[0][col]))
            .collect();

        let scaler = StandardScaler::fit(
            &DenseMatrix::from_2d_vec(&rows.to_vec()),
            StandardScalerParameters::default(),
        )
        .map_err(|e| ProfileError::Training(format!("Failed to fit feature scaler: {}", e)))?;

        Ok(Self {
            scaler,
            constant_columns,
        })
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ProfileError> {
        let scaled = self
            .scaler
            .transform(&DenseMatrix::from_2d_vec(&rows.to_vec()))
            .map_err(|e| ProfileError::Inference(format!("Failed to scale features: {}", e)))?;

        let mut out = matrix_rows(&scaled);
        for row in out.iter_mut() {
            for (value, constant) in row.iter_mut().zip(&self.constant_columns) {
                if *constant {
                    *value = 0.0;
                }
            }
        }
        Ok(out)
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ProfileError> {
        self.transform(&[row.to_vec()])?
            .pop()
            .ok_or_else(|| ProfileError::Inference("Scaler returned no row".into()))
    }

    pub fn n_features(&self) -> usize {
        self.constant_columns.len()
    }
}

/// Copies a dense matrix back into row vectors.
pub(crate) fn matrix_rows(matrix: &DenseMatrix<f64>) -> Vec<Vec<f64>> {
    let (n_rows, n_cols) = Array::shape(matrix);
    (0..n_rows)
        .map(|i| (0..n_cols).map(|j| *Array::get(matrix, (i, j))).collect())
        .collect()
}
