//! Model-ready labeled dataset: feature matrix, labels, and row identities.

use serde::{Deserialize, Serialize};

use crate::domain::{ClassCounts, Label, SampleId};
use crate::features::{Feature, PreparedRecord};

/// Dense row-major feature matrix with aligned labels and sample ids.
///
/// All three vectors always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
    labels: Vec<Label>,
    ids: Vec<SampleId>,
}

impl Dataset {
    /// Build from parallel vectors.
    ///
    /// # Panics
    /// If the vectors differ in length or a row's width differs from the
    /// feature count. Both indicate a programming error, not bad input.
    pub fn new(
        feature_names: Vec<String>,
        rows: Vec<Vec<f64>>,
        labels: Vec<Label>,
        ids: Vec<SampleId>,
    ) -> Self {
        assert_eq!(rows.len(), labels.len(), "rows/labels length mismatch");
        assert_eq!(rows.len(), ids.len(), "rows/ids length mismatch");
        assert!(
            rows.iter().all(|r| r.len() == feature_names.len()),
            "row width must equal feature count"
        );
        Self {
            feature_names,
            rows,
            labels,
            ids,
        }
    }

    /// Project prepared records onto the selected feature list.
    pub fn from_prepared(records: &[PreparedRecord], features: &[Feature]) -> Self {
        let feature_names = features.iter().map(Feature::name).collect();
        let rows = records
            .iter()
            .map(|r| features.iter().map(|f| f.value(r)).collect())
            .collect();
        let labels = records.iter().map(|r| r.transaction.label).collect();
        let ids = records
            .iter()
            .map(|r| SampleId::Record(r.transaction.id))
            .collect();
        Self {
            feature_names,
            rows,
            labels,
            ids,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn ids(&self) -> &[SampleId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_counts(&self) -> ClassCounts {
        ClassCounts::from_labels(&self.labels)
    }

    /// Labels as 0.0 / 1.0 targets.
    pub fn targets(&self) -> Vec<f64> {
        self.labels.iter().map(|l| l.target()).collect()
    }

    /// Row indices carrying `label`, in dataset order.
    pub fn indices_of(&self, label: Label) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// New dataset holding the given rows, in the order given.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            ids: indices.iter().map(|&i| self.ids[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Dataset {
        Dataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            vec![Label::Legitimate, Label::Fraud, Label::Legitimate],
            vec![SampleId::Record(10), SampleId::Record(11), SampleId::Record(12)],
        )
    }

    #[test]
    fn indices_by_label() {
        let ds = small();
        assert_eq!(ds.indices_of(Label::Legitimate), vec![0, 2]);
        assert_eq!(ds.indices_of(Label::Fraud), vec![1]);
    }

    #[test]
    fn subset_keeps_alignment() {
        let ds = small();
        let sub = ds.subset(&[2, 1]);
        assert_eq!(sub.rows(), &[vec![5.0, 6.0], vec![3.0, 4.0]]);
        assert_eq!(sub.labels(), &[Label::Legitimate, Label::Fraud]);
        assert_eq!(sub.ids(), &[SampleId::Record(12), SampleId::Record(11)]);
        assert_eq!(sub.feature_count(), 2);
    }

    #[test]
    #[should_panic(expected = "row width")]
    fn ragged_rows_panic() {
        Dataset::new(
            vec!["a".into()],
            vec![vec![1.0, 2.0]],
            vec![Label::Fraud],
            vec![SampleId::Record(0)],
        );
    }
}
