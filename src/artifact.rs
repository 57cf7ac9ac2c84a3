//! Pre-fit classifier artifact: a random forest exported to JSON.
//!
//! Trees use scikit-learn's flat node layout (`children_left`,
//! `children_right`, `feature`, `threshold`, `value`). The artifact is
//! validated once on load and is read-only afterwards.

use std::path::{Path, PathBuf};

use ndarray::{ArrayView1, ArrayView2};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::align::Vocabulary;

/// scikit-learn marker for "no child".
const TREE_LEAF: i64 = -1;

/// A fit binary classifier together with the vocabulary it was fit on.
pub trait Artifact {
    /// Ordered feature names (`feature_names_in_`).
    fn feature_names_in(&self) -> &Vocabulary;

    /// Raw class label per row of `features`.
    ///
    /// A matrix whose width differs from the vocabulary yields no labels;
    /// callers detect that as a label-count mismatch.
    fn predict(&self, features: ArrayView2<'_, f64>) -> Vec<i64>;
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact file could not be read.
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not a JSON forest document.
    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// The document parsed but describes an unusable forest.
    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct ForestFile {
    #[serde(default)]
    model_id: String,
    #[serde(default)]
    model_version: String,
    feature_names_in: Vec<String>,
    classes: Vec<i64>,
    trees: Vec<TreeFile>,
}

#[derive(Debug, Deserialize)]
struct TreeFile {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        proba: [f64; 2],
    },
}

/// One decision tree. Children always sit at larger indices than their parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_file(index: usize, file: TreeFile, n_features: usize) -> Result<Self, ArtifactError> {
        let invalid = |msg: String| ArtifactError::Invalid(format!("tree {index}: {msg}"));

        let n = file.children_left.len();
        if n == 0 {
            return Err(invalid("has no nodes".to_string()));
        }
        if file.children_right.len() != n
            || file.feature.len() != n
            || file.threshold.len() != n
            || file.value.len() != n
        {
            return Err(invalid("node arrays differ in length".to_string()));
        }

        let child = |node: usize, raw: i64| -> Result<usize, ArtifactError> {
            usize::try_from(raw)
                .ok()
                .filter(|&c| c > node && c < n)
                .ok_or_else(|| invalid(format!("node {node} has invalid child index {raw}")))
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (file.children_left[i], file.children_right[i]);
            if left == TREE_LEAF {
                if right != TREE_LEAF {
                    return Err(invalid(format!("node {i} has only one child")));
                }
                let weights = &file.value[i];
                if weights.len() != 2 {
                    return Err(invalid(format!(
                        "leaf {i} has {} class weights, expected 2",
                        weights.len()
                    )));
                }
                let total = weights[0] + weights[1];
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || total <= 0.0 {
                    return Err(invalid(format!("leaf {i} has unusable class weights")));
                }
                nodes.push(Node::Leaf {
                    proba: [weights[0] / total, weights[1] / total],
                });
            } else {
                let feature = usize::try_from(file.feature[i])
                    .ok()
                    .filter(|&f| f < n_features)
                    .ok_or_else(|| {
                        invalid(format!(
                            "node {i} splits on feature {} outside the vocabulary",
                            file.feature[i]
                        ))
                    })?;
                let threshold = file.threshold[i];
                if !threshold.is_finite() {
                    return Err(invalid(format!("node {i} has a non-finite threshold")));
                }
                nodes.push(Node::Split {
                    feature,
                    threshold,
                    left: child(i, left)?,
                    right: child(i, right)?,
                });
            }
        }
        Ok(Self { nodes })
    }

    /// Class probabilities of the leaf `row` falls into. NaN goes right.
    fn leaf_proba(&self, row: ArrayView1<'_, f64>) -> [f64; 2] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Random forest binary classifier loaded from a JSON artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    model_id: String,
    model_version: String,
    vocabulary: Vocabulary,
    classes: [i64; 2],
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Parse and validate an artifact from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let file: ForestFile = serde_json::from_str(json)?;

        if file.feature_names_in.is_empty() {
            return Err(ArtifactError::Invalid(
                "feature_names_in is empty".to_string(),
            ));
        }
        let vocabulary = Vocabulary::new(file.feature_names_in);
        if let Some(dup) = vocabulary.duplicate() {
            return Err(ArtifactError::Invalid(format!(
                "feature `{dup}` appears more than once in feature_names_in"
            )));
        }

        let classes: [i64; 2] = file.classes.as_slice().try_into().map_err(|_| {
            ArtifactError::Invalid(format!(
                "expected exactly 2 classes, found {}",
                file.classes.len()
            ))
        })?;

        if file.trees.is_empty() {
            return Err(ArtifactError::Invalid("forest has no trees".to_string()));
        }
        let trees = file
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| Tree::from_file(i, tree, vocabulary.len()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            model_id: file.model_id,
            model_version: file.model_version,
            vocabulary,
            classes,
            trees,
        })
    }

    /// Load and validate an artifact from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        let json = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let forest = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            model_id = %forest.model_id,
            model_version = %forest.model_version,
            trees = forest.trees.len(),
            features = forest.vocabulary.len(),
            "loaded model artifact"
        );
        Ok(forest)
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn classes(&self) -> [i64; 2] {
        self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean per-tree class probabilities for one row.
    ///
    /// Panics if `row` is narrower than the vocabulary.
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> [f64; 2] {
        let mut sum = [0.0f64; 2];
        for tree in &self.trees {
            let p = tree.leaf_proba(row);
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }
}

impl Artifact for RandomForest {
    fn feature_names_in(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Vec<i64> {
        if features.ncols() != self.vocabulary.len() {
            warn!(
                expected = self.vocabulary.len(),
                got = features.ncols(),
                "feature matrix width does not match the vocabulary"
            );
            return Vec::new();
        }
        features
            .rows()
            .into_iter()
            .map(|row| {
                let p = self.predict_proba_row(row);
                // argmax; ties resolve to the first class
                if p[1] > p[0] {
                    self.classes[1]
                } else {
                    self.classes[0]
                }
            })
            .collect()
    }
}
