//! Prediction context: the loaded artifact plus the operations that run
//! records through alignment and the classifier.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::align::{AlignError, Vocabulary, align};
use crate::artifact::{Artifact, ArtifactError, RandomForest};
use crate::batch::{BatchError, BatchTable, LabeledTable};
use crate::classifier::{ClassifierAdapter, PredictError, Prediction};
use crate::record::{ClientProfile, RawRecord};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Read-only state shared by every prediction in a process.
///
/// Constructed once and passed to callers explicitly; tests build it around
/// fake artifacts.
#[derive(Debug, Clone)]
pub struct PredictionContext<A = RandomForest> {
    adapter: ClassifierAdapter<A>,
}

impl PredictionContext<RandomForest> {
    /// Load the random forest artifact at `path`.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        Ok(Self::new(RandomForest::from_file(path)?))
    }
}

impl<A: Artifact> PredictionContext<A> {
    pub fn new(artifact: A) -> Self {
        Self {
            adapter: ClassifierAdapter::new(artifact),
        }
    }

    pub fn artifact(&self) -> &A {
        self.adapter.artifact()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.adapter.vocabulary()
    }

    /// Align and predict a batch of records in one vectorized call.
    pub fn predict_records(&self, records: &[RawRecord]) -> Result<Vec<Prediction>, PipelineError> {
        let matrix = align(records, self.vocabulary())?;
        Ok(self.adapter.predict(&matrix)?)
    }

    /// Predict a single record as given; nothing is injected.
    pub fn predict_record(&self, record: &RawRecord) -> Result<Prediction, PipelineError> {
        only(self.predict_records(std::slice::from_ref(record))?)
    }

    /// Predict one client from the interactive form (`pdays` fixed to -1).
    pub fn predict_client(&self, profile: &ClientProfile) -> Result<Prediction, PipelineError> {
        let prediction = self.predict_record(&profile.to_record())?;
        info!(prediction = prediction.label(), "single client prediction");
        Ok(prediction)
    }

    /// Predict every row of `table` and return the labeled output table.
    pub fn predict_batch(&self, table: &BatchTable) -> Result<LabeledTable, PipelineError> {
        let records = table.to_records();
        let predictions = self.predict_records(&records)?;
        let labeled = table.label(&predictions)?;
        info!(
            rows = labeled.rows().len(),
            subscribers = labeled.subscribers(),
            "batch prediction completed"
        );
        Ok(labeled)
    }
}

fn only(predictions: Vec<Prediction>) -> Result<Prediction, PipelineError> {
    match predictions.as_slice() {
        [single] => Ok(*single),
        _ => Err(PredictError::LengthMismatch {
            expected: 1,
            got: predictions.len(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Poutcome;
    use ndarray::ArrayView2;
    use std::cell::Cell;

    /// Records how many rows each inference call saw; predicts 1 when the
    /// `poutcome_success` indicator is set.
    struct CountingArtifact {
        vocabulary: Vocabulary,
        calls: Cell<usize>,
        last_rows: Cell<usize>,
    }

    impl CountingArtifact {
        fn new() -> Self {
            Self {
                vocabulary: ["age", "pdays", "poutcome_success", "job_admin."]
                    .into_iter()
                    .collect(),
                calls: Cell::new(0),
                last_rows: Cell::new(0),
            }
        }
    }

    impl Artifact for CountingArtifact {
        fn feature_names_in(&self) -> &Vocabulary {
            &self.vocabulary
        }

        fn predict(&self, features: ArrayView2<'_, f64>) -> Vec<i64> {
            self.calls.set(self.calls.get() + 1);
            self.last_rows.set(features.nrows());
            features.rows().into_iter().map(|r| i64::from(r[2] == 1.0)).collect()
        }
    }

    #[test]
    fn client_path_injects_pdays() {
        struct PdaysEcho(Vocabulary);
        impl Artifact for PdaysEcho {
            fn feature_names_in(&self) -> &Vocabulary {
                &self.0
            }
            fn predict(&self, features: ArrayView2<'_, f64>) -> Vec<i64> {
                features.rows().into_iter().map(|r| i64::from(r[0] == -1.0)).collect()
            }
        }

        let ctx = PredictionContext::new(PdaysEcho(["pdays"].into_iter().collect()));
        let got = ctx.predict_client(&ClientProfile::default()).unwrap();
        assert_eq!(got, Prediction::WillSubscribe);
    }

    #[test]
    fn client_prediction_uses_form_values() {
        let ctx = PredictionContext::new(CountingArtifact::new());
        let profile = ClientProfile {
            poutcome: Poutcome::Success,
            ..ClientProfile::default()
        };
        assert_eq!(ctx.predict_client(&profile).unwrap(), Prediction::WillSubscribe);
        assert_eq!(
            ctx.predict_client(&ClientProfile::default()).unwrap(),
            Prediction::WillNotSubscribe
        );
    }

    #[test]
    fn batch_is_a_single_inference_call() {
        let ctx = PredictionContext::new(CountingArtifact::new());
        let table = BatchTable::from_reader(
            "age,poutcome\n30,success\n40,failure\n50,success\n".as_bytes(),
            b',',
        )
        .unwrap();
        let labeled = ctx.predict_batch(&table).unwrap();
        assert_eq!(ctx.artifact().calls.get(), 1);
        assert_eq!(ctx.artifact().last_rows.get(), 3);
        assert_eq!(labeled.headers(), ["age", "poutcome", "y"]);
        let ys: Vec<&str> = labeled.rows().iter().map(|r| r[2].as_str()).collect();
        assert_eq!(ys, ["1", "0", "1"]);
    }

    #[test]
    fn schema_error_rejects_request() {
        let ctx = PredictionContext::new(CountingArtifact::new());
        let record = RawRecord::new()
            .with("job", "admin.")
            .with("job_admin.", 1.0);
        let err = ctx.predict_record(&record).unwrap_err();
        assert!(matches!(err, PipelineError::Align(AlignError::Schema(_))));
        assert_eq!(ctx.artifact().calls.get(), 0);
    }
}
