//! Domain types: transaction records, labels, and sample identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of anonymized components (`V1`..`V28`) per transaction.
pub const COMPONENT_COUNT: usize = 28;

/// Binary transaction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Legitimate,
    Fraud,
}

impl Label {
    /// Parse the numeric class encoding used by the input file (0 or 1).
    pub fn from_class(value: f64) -> Option<Self> {
        if value == 0.0 {
            Some(Self::Legitimate)
        } else if value == 1.0 {
            Some(Self::Fraud)
        } else {
            None
        }
    }

    pub fn class_value(self) -> u8 {
        match self {
            Self::Legitimate => 0,
            Self::Fraud => 1,
        }
    }

    pub fn is_fraud(self) -> bool {
        matches!(self, Self::Fraud)
    }

    /// Regression target used by the classifiers (0.0 / 1.0).
    pub fn target(self) -> f64 {
        f64::from(self.class_value())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legitimate => write!(f, "legitimate"),
            Self::Fraud => write!(f, "fraud"),
        }
    }
}

/// One raw transaction. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Zero-based row index in the source file; the record's identity.
    pub id: usize,
    /// Seconds elapsed since the first transaction in the dataset.
    pub time: f64,
    pub components: [f64; COMPONENT_COUNT],
    pub amount: f64,
    pub label: Label,
}

/// Identity of a row in a model-ready dataset.
///
/// Rows copied from the input keep their record id; rows produced by the
/// class balancer are numbered separately so they can never collide with a
/// real record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SampleId {
    Record(usize),
    Synthetic(usize),
}

impl SampleId {
    pub fn record(&self) -> Option<usize> {
        match self {
            Self::Record(id) => Some(*id),
            Self::Synthetic(_) => None,
        }
    }
}

/// Count of legitimate and fraud labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub legitimate: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a Label>) -> Self {
        let mut counts = Self::default();
        for label in labels {
            match label {
                Label::Legitimate => counts.legitimate += 1,
                Label::Fraud => counts.fraud += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.legitimate + self.fraud
    }

    /// Share of fraud rows in `[0, 1]`; 0 for an empty collection.
    pub fn fraud_share(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.fraud as f64 / self.total() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parses_only_zero_and_one() {
        assert_eq!(Label::from_class(0.0), Some(Label::Legitimate));
        assert_eq!(Label::from_class(1.0), Some(Label::Fraud));
        assert_eq!(Label::from_class(2.0), None);
        assert_eq!(Label::from_class(0.5), None);
    }

    #[test]
    fn class_counts_share() {
        let labels = [Label::Legitimate, Label::Legitimate, Label::Legitimate, Label::Fraud];
        let counts = ClassCounts::from_labels(&labels);
        assert_eq!(counts.legitimate, 3);
        assert_eq!(counts.fraud, 1);
        assert!((counts.fraud_share() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn synthetic_ids_have_no_record() {
        assert_eq!(SampleId::Record(7).record(), Some(7));
        assert_eq!(SampleId::Synthetic(7).record(), None);
        assert_ne!(SampleId::Record(7), SampleId::Synthetic(7));
    }
}
