//! Feature alignment: raw records -> fixed-width numeric matrix.
//!
//! Each record is expanded into a `column -> value` map (categoricals become
//! `<field>_<category>` indicators, numerics keep their name) and then
//! projected onto the classifier's [`Vocabulary`]. Vocabulary columns missing
//! from a row are 0; expanded columns outside the vocabulary are dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::{Array2, ArrayView1};
use thiserror::Error;
use tracing::debug;

use crate::record::{RawRecord, Value};

#[derive(Debug, Error)]
pub enum AlignError {
    /// The record is not a flat mapping of field -> scalar.
    #[error("schema error: {0}")]
    Schema(String),
    /// The vocabulary has no columns to project onto.
    #[error("feature vocabulary is empty")]
    EmptyVocabulary,
}

/// Ordered column names a classifier was fit on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// First name that appears more than once, if any.
    pub fn duplicate(&self) -> Option<&str> {
        self.names
            .iter()
            .enumerate()
            .find(|(i, name)| self.position(name) != Some(*i))
            .map(|(_, name)| name.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Numeric table whose columns are exactly a [`Vocabulary`], one row per record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMatrix {
    columns: Vocabulary,
    values: Array2<f64>,
}

impl AlignedMatrix {
    /// Wrap an already-built matrix. Column/shape agreement is checked by the
    /// classifier adapter, not here.
    pub fn new(columns: Vocabulary, values: Array2<f64>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &Vocabulary {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    /// Value of `column` in row `i`, if the column exists.
    pub fn get(&self, i: usize, column: &str) -> Option<f64> {
        let j = self.columns.position(column)?;
        self.values.get((i, j)).copied()
    }
}

/// Expand one record into `column -> value`.
///
/// Categorical fields become a single `<field>_<category>` indicator set to 1;
/// numeric fields keep their own name. Two fields producing the same column
/// name is a schema error.
pub fn expand(record: &RawRecord) -> Result<BTreeMap<String, f64>, AlignError> {
    let mut columns = BTreeMap::new();
    for (field, value) in record.iter() {
        if field.is_empty() {
            return Err(AlignError::Schema("record has an empty field name".to_string()));
        }
        let (column, cell) = match value {
            Value::Category(category) => (format!("{field}_{category}"), 1.0),
            Value::Number(number) => (field.to_string(), *number),
        };
        if columns.insert(column.clone(), cell).is_some() {
            return Err(AlignError::Schema(format!(
                "column `{column}` is produced by more than one field"
            )));
        }
    }
    Ok(columns)
}

/// Align a batch of records onto `vocabulary`.
///
/// The whole batch is expanded before projection so every row sees the same
/// column union.
pub fn align(records: &[RawRecord], vocabulary: &Vocabulary) -> Result<AlignedMatrix, AlignError> {
    if vocabulary.is_empty() {
        return Err(AlignError::EmptyVocabulary);
    }
    if let Some(name) = vocabulary.duplicate() {
        return Err(AlignError::Schema(format!(
            "vocabulary column `{name}` appears more than once"
        )));
    }

    let expanded = records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            expand(record).map_err(|e| match e {
                AlignError::Schema(msg) => AlignError::Schema(format!("row {row}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut values = Array2::<f64>::zeros((records.len(), vocabulary.len()));
    let mut dropped = BTreeSet::new();
    for (i, columns) in expanded.iter().enumerate() {
        for (name, value) in columns {
            match vocabulary.position(name) {
                Some(j) => values[[i, j]] = *value,
                None => {
                    dropped.insert(name.as_str());
                }
            }
        }
    }

    if !dropped.is_empty() {
        debug!(
            dropped = ?dropped,
            "expanded columns outside the feature vocabulary were dropped"
        );
    }
    debug!(
        rows = records.len(),
        columns = vocabulary.len(),
        "aligned records onto feature vocabulary"
    );

    Ok(AlignedMatrix::new(vocabulary.clone(), values))
}
