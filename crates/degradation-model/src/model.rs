//! Model artifacts
//!
//! A forest is stored as JSON: each tree is a flat node list rooted at index
//! 0, where a split sends `x[feature] <= threshold` to `left` and everything
//! else (including NaN) to `right`.

use crate::PredictionError;
use lap_features::FeatureColumn;
use ndarray::ArrayView1;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// One node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Regression tree in flat form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Check that the node list forms a tree over `n_features` inputs
    ///
    /// Children must come after their parent, so evaluation always
    /// terminates.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", idx));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} has a non-finite value", idx));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk from the root to a leaf
    pub fn evaluate(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Serialized forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
}

impl ModelArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PredictionError> {
        read_json(path.as_ref())
    }
}

/// Baseline comparison recorded at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub baseline_r2: f64,
    pub r2_improvement: f64,
    pub r2_improvement_pct: f64,
}

/// Training metadata shipped next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub best_model: String,
    /// Input columns, in model order
    pub features: Vec<String>,
    pub best_test_r2: f64,
    pub best_test_mae: f64,
    pub best_test_rmse: f64,
    pub training_date: String,
    pub training_samples: usize,
    pub test_samples: usize,
    #[serde(default)]
    pub weather_features: Vec<String>,
    #[serde(default)]
    pub baseline_comparison: Option<BaselineComparison>,
}

impl ModelMetadata {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PredictionError> {
        read_json(path.as_ref())
    }

    /// Resolve feature names to columns
    pub fn feature_columns(&self) -> Result<Vec<FeatureColumn>, PredictionError> {
        self.features
            .iter()
            .map(|name| {
                name.parse::<FeatureColumn>()
                    .map_err(|e| PredictionError::InvalidModel(e.to_string()))
            })
            .collect()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PredictionError> {
    let load_error = |reason: String| PredictionError::ModelLoad {
        path: path.display().to_string(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| load_error(e.to_string()))
}

/// Trained regression model
pub trait Regressor: Send + Sync {
    /// Number of inputs per row
    fn n_features(&self) -> usize;

    /// Predict one row. `x.len()` must equal [`n_features`](Self::n_features).
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64;

    /// Per-feature importances, in input order, if the model has them
    fn feature_importances(&self) -> Option<&[f64]>;
}

/// Random forest regressor: mean of its trees
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
    importances: Option<Vec<f64>>,
}

impl RandomForest {
    /// Validate an artifact and build the forest
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, PredictionError> {
        if artifact.trees.is_empty() {
            return Err(PredictionError::InvalidModel("forest has no trees".to_string()));
        }
        for (i, tree) in artifact.trees.iter().enumerate() {
            tree.validate(artifact.n_features)
                .map_err(|reason| PredictionError::InvalidModel(format!("tree {}: {}", i, reason)))?;
        }
        if let Some(importances) = &artifact.feature_importances {
            if importances.len() != artifact.n_features {
                return Err(PredictionError::FeatureCountMismatch {
                    expected: artifact.n_features,
                    actual: importances.len(),
                });
            }
        }

        info!(
            "Loaded random forest: {} trees over {} features",
            artifact.trees.len(),
            artifact.n_features
        );
        Ok(Self {
            n_features: artifact.n_features,
            trees: artifact.trees,
            importances: artifact.feature_importances,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PredictionError> {
        Self::from_artifact(ModelArtifact::load(path)?)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.evaluate(x)).sum();
        total / self.trees.len() as f64
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }
}
