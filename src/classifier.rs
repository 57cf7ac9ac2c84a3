//! Classifier adapter: guards the artifact's column contract and maps its raw
//! labels onto [`Prediction`].

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::align::{AlignedMatrix, Vocabulary};
use crate::artifact::Artifact;

/// Binary subscription outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prediction {
    WillNotSubscribe,
    WillSubscribe,
}

impl Prediction {
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(Self::WillNotSubscribe),
            1 => Some(Self::WillSubscribe),
            _ => None,
        }
    }

    pub fn label(self) -> u8 {
        match self {
            Self::WillNotSubscribe => 0,
            Self::WillSubscribe => 1,
        }
    }

    /// Fixed human-readable verdict for a single client.
    pub fn message(self) -> &'static str {
        match self {
            Self::WillSubscribe => "✔️ The client is likely to subscribe to a term deposit.",
            Self::WillNotSubscribe => "❌ The client is unlikely to subscribe to a term deposit.",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Error)]
pub enum PredictError {
    /// The matrix columns diverge from the artifact's vocabulary.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// The artifact returned a label vector of the wrong length.
    #[error("classifier returned {got} labels for {expected} rows")]
    LengthMismatch { expected: usize, got: usize },
    /// The artifact returned a label outside {0, 1}.
    #[error("classifier returned label {0}, expected 0 or 1")]
    UnexpectedLabel(i64),
}

/// Wraps a pre-fit [`Artifact`]. Performs no learning.
#[derive(Debug, Clone)]
pub struct ClassifierAdapter<A> {
    artifact: A,
}

impl<A: Artifact> ClassifierAdapter<A> {
    pub fn new(artifact: A) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &A {
        &self.artifact
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.artifact.feature_names_in()
    }

    /// One prediction per matrix row, in row order.
    pub fn predict(&self, matrix: &AlignedMatrix) -> Result<Vec<Prediction>, PredictError> {
        self.check_columns(matrix)?;

        let labels = self.artifact.predict(matrix.values().view());
        if labels.len() != matrix.nrows() {
            return Err(PredictError::LengthMismatch {
                expected: matrix.nrows(),
                got: labels.len(),
            });
        }

        let predictions = labels
            .into_iter()
            .map(|label| Prediction::from_label(label).ok_or(PredictError::UnexpectedLabel(label)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(rows = predictions.len(), "classifier inference completed");
        Ok(predictions)
    }

    fn check_columns(&self, matrix: &AlignedMatrix) -> Result<(), PredictError> {
        let expected = self.vocabulary().names();
        let actual = matrix.columns().names();

        if actual.len() != expected.len() {
            return Err(PredictError::SchemaMismatch(format!(
                "matrix has {} columns, classifier expects {}",
                actual.len(),
                expected.len()
            )));
        }
        if let Some((i, (got, want))) = actual
            .iter()
            .zip(expected)
            .enumerate()
            .find(|(_, (got, want))| got != want)
        {
            return Err(PredictError::SchemaMismatch(format!(
                "column {i} is `{got}`, classifier expects `{want}`"
            )));
        }
        if matrix.values().ncols() != expected.len() {
            return Err(PredictError::SchemaMismatch(format!(
                "matrix holds {} value columns for {} names",
                matrix.values().ncols(),
                expected.len()
            )));
        }
        Ok(())
    }
}
