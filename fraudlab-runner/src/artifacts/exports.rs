//! Prediction exports for downstream reporting tools.
//!
//! Every table covers the test partition in its stored order. The SQL table
//! carries every raw and derived column under snake_case headers; the
//! spreadsheet table keeps time, amount and class plus the hour of day and a
//! three-level risk category. The dashboard table bins probabilities into
//! five right-closed ranges. The remaining files are small aggregates.

use anyhow::{ensure, Result};
use std::collections::BTreeMap;
use std::path::Path;

use fraudlab_core::domain::Label;
use fraudlab_core::features::{Feature, PreparedRecord};
use fraudlab_core::schema::expected_columns;

use super::datasets::prepared_fields;
use super::{create_csv, finish_csv, flag};
use crate::result::Prediction;

const PREDICTION_COLUMNS: [&str; 4] = [
    "predicted_proba",
    "predicted_class",
    "is_false_positive",
    "is_false_negative",
];

/// Three-level risk used by the spreadsheet export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 3] = [Self::Low, Self::Medium, Self::High];

    /// `[0, 0.3)` low, `[0.3, 0.7)` medium, `[0.7, 1]` high.
    pub fn of(proba: f64) -> Self {
        if proba < 0.3 {
            Self::Low
        } else if proba < 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Medium => "Medium Risk",
            Self::High => "High Risk",
        }
    }
}

/// Five-level score bins for the dashboard export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBin {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskBin {
    /// Right-closed bins `[0, 0.2]`, `(0.2, 0.4]`, `(0.4, 0.6]`, `(0.6, 0.8]`, `(0.8, 1]`.
    pub fn of(proba: f64) -> Self {
        if proba <= 0.2 {
            Self::VeryLow
        } else if proba <= 0.4 {
            Self::Low
        } else if proba <= 0.6 {
            Self::Medium
        } else if proba <= 0.8 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "Very Low",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

/// Transaction amount bands, lower bound inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRange {
    UnderTen,
    TenToFifty,
    FiftyToHundred,
    HundredToFiveHundred,
    FiveHundredToThousand,
    ThousandPlus,
}

impl AmountRange {
    pub const ALL: [AmountRange; 6] = [
        Self::UnderTen,
        Self::TenToFifty,
        Self::FiftyToHundred,
        Self::HundredToFiveHundred,
        Self::FiveHundredToThousand,
        Self::ThousandPlus,
    ];

    pub fn of(amount: f64) -> Self {
        if amount < 10.0 {
            Self::UnderTen
        } else if amount < 50.0 {
            Self::TenToFifty
        } else if amount < 100.0 {
            Self::FiftyToHundred
        } else if amount < 500.0 {
            Self::HundredToFiveHundred
        } else if amount < 1000.0 {
            Self::FiveHundredToThousand
        } else {
            Self::ThousandPlus
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UnderTen => "< $10",
            Self::TenToFifty => "$10 - $49.99",
            Self::FiftyToHundred => "$50 - $99.99",
            Self::HundredToFiveHundred => "$100 - $499.99",
            Self::FiveHundredToThousand => "$500 - $999.99",
            Self::ThousandPlus => "$1000+",
        }
    }
}

/// Hour of day (0-23) of a `Time` offset in seconds from a midnight origin.
pub fn transaction_hour(time: f64) -> u32 {
    (time / 3600.0).floor().rem_euclid(24.0) as u32
}

fn model_performance(p: &Prediction) -> &'static str {
    if p.is_false_positive() {
        "False Positive"
    } else if p.is_false_negative() {
        "False Negative"
    } else {
        "Correct Prediction"
    }
}

/// Per-hour row of `fraud_by_hour.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct HourSummary {
    pub hour: u32,
    pub mean_proba: f64,
    pub count: usize,
}

/// Mean fraud probability and row count for each hour present, by hour.
pub fn summarize_by_hour(test: &[PreparedRecord], predictions: &[Prediction]) -> Vec<HourSummary> {
    let mut hours: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (record, p) in test.iter().zip(predictions) {
        let slot = hours.entry(transaction_hour(record.transaction.time)).or_default();
        slot.0 += p.proba;
        slot.1 += 1;
    }
    hours
        .into_iter()
        .map(|(hour, (sum, count))| HourSummary {
            hour,
            mean_proba: sum / count as f64,
            count,
        })
        .collect()
}

/// Non-empty risk categories, most frequent first. Ties keep category order.
pub fn summarize_risk(predictions: &[Prediction]) -> Vec<(RiskCategory, usize)> {
    let mut counts: Vec<(RiskCategory, usize)> = RiskCategory::ALL
        .iter()
        .map(|&c| (c, predictions.iter().filter(|p| RiskCategory::of(p.proba) == c).count()))
        .filter(|&(_, n)| n > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Per-band row of `amount_distribution.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountSummary {
    pub range: AmountRange,
    pub count: usize,
    pub fraud: usize,
}

impl AmountSummary {
    pub fn fraud_percentage(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            100.0 * self.fraud as f64 / self.count as f64
        }
    }
}

/// Actual fraud counts per amount band. Every band is listed, empty or not.
pub fn summarize_amounts(test: &[PreparedRecord]) -> Vec<AmountSummary> {
    AmountRange::ALL
        .iter()
        .map(|&range| {
            let rows = test
                .iter()
                .map(|r| &r.transaction)
                .filter(|t| AmountRange::of(t.amount) == range);
            let (count, fraud) = rows.fold((0, 0), |(n, f), t| {
                (n + 1, f + usize::from(t.label == Label::Fraud))
            });
            AmountSummary { range, count, fraud }
        })
        .collect()
}

fn prediction_fields(p: &Prediction) -> [String; 4] {
    [
        p.proba.to_string(),
        p.predicted.class_value().to_string(),
        flag(p.is_false_positive()).to_string(),
        flag(p.is_false_negative()).to_string(),
    ]
}

fn check_aligned(test: &[PreparedRecord], predictions: &[Prediction]) -> Result<()> {
    ensure!(
        test.len() == predictions.len(),
        "{} predictions for {} test rows",
        predictions.len(),
        test.len()
    );
    Ok(())
}

pub fn write_sql_export(path: &Path, test: &[PreparedRecord], predictions: &[Prediction]) -> Result<()> {
    check_aligned(test, predictions)?;
    let mut wtr = create_csv(path)?;

    let mut header = vec!["row_id".to_string()];
    header.extend(expected_columns().iter().map(|c| c.to_lowercase()));
    header.extend(Feature::derived().iter().map(|f| f.name().to_lowercase()));
    header.extend(PREDICTION_COLUMNS.iter().map(|c| c.to_string()));
    wtr.write_record(&header)?;

    for (record, p) in test.iter().zip(predictions) {
        let mut fields = vec![record.transaction.id.to_string()];
        fields.extend(prepared_fields(record));
        fields.extend(prediction_fields(p));
        wtr.write_record(&fields)?;
    }
    finish_csv(wtr, path)
}

pub fn write_excel_export(path: &Path, test: &[PreparedRecord], predictions: &[Prediction]) -> Result<()> {
    check_aligned(test, predictions)?;
    let mut wtr = create_csv(path)?;

    let mut header = vec!["Time".to_string(), "Amount".to_string(), "Class".to_string()];
    header.extend(PREDICTION_COLUMNS.iter().map(|c| c.to_string()));
    header.push("transaction_hour".to_string());
    header.push("risk_category".to_string());
    wtr.write_record(&header)?;

    for (record, p) in test.iter().zip(predictions) {
        let t = &record.transaction;
        let mut fields = vec![
            t.time.to_string(),
            t.amount.to_string(),
            t.label.class_value().to_string(),
        ];
        fields.extend(prediction_fields(p));
        fields.push(transaction_hour(t.time).to_string());
        fields.push(RiskCategory::of(p.proba).label().to_string());
        wtr.write_record(&fields)?;
    }
    finish_csv(wtr, path)
}

pub fn write_powerbi_export(path: &Path, test: &[PreparedRecord], predictions: &[Prediction]) -> Result<()> {
    check_aligned(test, predictions)?;
    let mut wtr = create_csv(path)?;
    wtr.write_record([
        "row_id",
        "Time",
        "Amount",
        "Class",
        "Transaction_Hour",
        "predicted_proba",
        "predicted_class",
        "Model_Performance",
        "Risk_Score",
    ])?;

    for (record, p) in test.iter().zip(predictions) {
        let t = &record.transaction;
        wtr.write_record([
            t.id.to_string(),
            t.time.to_string(),
            t.amount.to_string(),
            t.label.class_value().to_string(),
            transaction_hour(t.time).to_string(),
            p.proba.to_string(),
            p.predicted.class_value().to_string(),
            model_performance(p).to_string(),
            RiskBin::of(p.proba).label().to_string(),
        ])?;
    }
    finish_csv(wtr, path)
}

pub fn write_hour_summary(path: &Path, test: &[PreparedRecord], predictions: &[Prediction]) -> Result<()> {
    check_aligned(test, predictions)?;
    let mut wtr = create_csv(path)?;
    wtr.write_record(["Hour", "Average Fraud Probability", "Transaction Count"])?;
    for row in summarize_by_hour(test, predictions) {
        wtr.write_record([
            row.hour.to_string(),
            row.mean_proba.to_string(),
            row.count.to_string(),
        ])?;
    }
    finish_csv(wtr, path)
}

pub fn write_risk_summary(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let mut wtr = create_csv(path)?;
    wtr.write_record(["Risk Category", "Count"])?;
    for (category, count) in summarize_risk(predictions) {
        wtr.write_record([category.label().to_string(), count.to_string()])?;
    }
    finish_csv(wtr, path)
}

pub fn write_amount_distribution(path: &Path, test: &[PreparedRecord]) -> Result<()> {
    let mut wtr = create_csv(path)?;
    wtr.write_record([
        "Amount Range",
        "Transaction Count",
        "Fraud Count",
        "Fraud Percentage",
    ])?;
    for row in summarize_amounts(test) {
        wtr.write_record([
            row.range.label().to_string(),
            row.count.to_string(),
            row.fraud.to_string(),
            row.fraud_percentage().to_string(),
        ])?;
    }
    finish_csv(wtr, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlab_core::domain::{SampleId, Transaction, COMPONENT_COUNT};
    use fraudlab_core::features::fit_and_prepare;

    fn test_rows() -> Vec<PreparedRecord> {
        let records: Vec<Transaction> = (0..3)
            .map(|i| Transaction {
                id: 10 + i,
                time: 60.0 * i as f64,
                components: [0.1; COMPONENT_COUNT],
                amount: 5.0 + i as f64,
                label: if i == 0 { Label::Fraud } else { Label::Legitimate },
            })
            .collect();
        fit_and_prepare(&records).unwrap().1
    }

    fn predictions(rows: &[PreparedRecord]) -> Vec<Prediction> {
        // Row 0: missed fraud. Row 1: false alarm. Row 2: correct.
        let verdicts = [(0.2, Label::Legitimate), (0.9, Label::Fraud), (0.1, Label::Legitimate)];
        rows.iter()
            .zip(verdicts)
            .map(|(r, (proba, predicted))| Prediction {
                id: SampleId::Record(r.transaction.id),
                actual: r.transaction.label,
                proba,
                predicted,
            })
            .collect()
    }

    #[test]
    fn excel_export_flags_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("excel.csv");
        let rows = test_rows();
        write_excel_export(&path, &rows, &predictions(&rows)).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            rdr.headers().unwrap().iter().collect::<Vec<_>>(),
            vec![
                "Time",
                "Amount",
                "Class",
                "predicted_proba",
                "predicted_class",
                "is_false_positive",
                "is_false_negative",
                "transaction_hour",
                "risk_category"
            ]
        );
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!((&rows[0][5], &rows[0][6]), ("0", "1"));
        assert_eq!((&rows[1][5], &rows[1][6]), ("1", "0"));
        assert_eq!((&rows[2][5], &rows[2][6]), ("0", "0"));
        assert_eq!(&rows[1][4], "1");
        assert_eq!(&rows[0][8], "Low Risk");
        assert_eq!(&rows[1][8], "High Risk");
    }

    #[test]
    fn risk_category_edges() {
        assert_eq!(RiskCategory::of(0.0), RiskCategory::Low);
        assert_eq!(RiskCategory::of(0.299_999), RiskCategory::Low);
        assert_eq!(RiskCategory::of(0.3), RiskCategory::Medium);
        assert_eq!(RiskCategory::of(0.699_999), RiskCategory::Medium);
        assert_eq!(RiskCategory::of(0.7), RiskCategory::High);
        assert_eq!(RiskCategory::of(1.0), RiskCategory::High);
    }

    #[test]
    fn risk_bins_are_right_closed() {
        assert_eq!(RiskBin::of(0.0), RiskBin::VeryLow);
        assert_eq!(RiskBin::of(0.2), RiskBin::VeryLow);
        assert_eq!(RiskBin::of(0.200_001), RiskBin::Low);
        assert_eq!(RiskBin::of(0.4), RiskBin::Low);
        assert_eq!(RiskBin::of(0.6), RiskBin::Medium);
        assert_eq!(RiskBin::of(0.8), RiskBin::High);
        assert_eq!(RiskBin::of(0.800_001), RiskBin::VeryHigh);
        assert_eq!(RiskBin::of(1.0), RiskBin::VeryHigh);
    }

    #[test]
    fn amount_range_lower_bounds_are_inclusive() {
        let cases = [
            (9.99, AmountRange::UnderTen),
            (10.0, AmountRange::TenToFifty),
            (49.99, AmountRange::TenToFifty),
            (50.0, AmountRange::FiftyToHundred),
            (100.0, AmountRange::HundredToFiveHundred),
            (499.99, AmountRange::HundredToFiveHundred),
            (500.0, AmountRange::FiveHundredToThousand),
            (999.99, AmountRange::FiveHundredToThousand),
            (1000.0, AmountRange::ThousandPlus),
        ];
        for (amount, expected) in cases {
            assert_eq!(AmountRange::of(amount), expected, "amount {amount}");
        }
    }

    #[test]
    fn hour_wraps_each_day() {
        assert_eq!(transaction_hour(0.0), 0);
        assert_eq!(transaction_hour(3599.0), 0);
        assert_eq!(transaction_hour(3600.0), 1);
        assert_eq!(transaction_hour(23.0 * 3600.0 + 59.0), 23);
        assert_eq!(transaction_hour(24.0 * 3600.0), 0);
        assert_eq!(transaction_hour(172_792.0), 23);
    }

    #[test]
    fn hour_summary_averages_per_hour() {
        let rows = test_rows();
        let summary = summarize_by_hour(&rows, &predictions(&rows));
        // All three rows fall within the first two minutes.
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].hour, 0);
        assert_eq!(summary[0].count, 3);
        assert!((summary[0].mean_proba - 0.4).abs() < 1e-12);
    }

    #[test]
    fn risk_summary_orders_by_count() {
        let rows = test_rows();
        let summary = summarize_risk(&predictions(&rows));
        assert_eq!(summary, vec![(RiskCategory::Low, 2), (RiskCategory::High, 1)]);
    }

    #[test]
    fn amount_distribution_lists_every_band() {
        let rows = test_rows();
        let summary = summarize_amounts(&rows);
        assert_eq!(summary.len(), AmountRange::ALL.len());
        assert_eq!(summary[0].range, AmountRange::UnderTen);
        assert_eq!((summary[0].count, summary[0].fraud), (3, 1));
        assert!((summary[0].fraud_percentage() - 100.0 / 3.0).abs() < 1e-9);
        assert!(summary[1..].iter().all(|s| s.count == 0 && s.fraud_percentage() == 0.0));
    }

    #[test]
    fn powerbi_export_labels_performance_and_bins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("powerbi.csv");
        let rows = test_rows();
        write_powerbi_export(&path, &rows, &predictions(&rows)).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        assert_eq!(&rdr.headers().unwrap()[8], "Risk_Score");
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!((&rows[0][7], &rows[0][8]), ("False Negative", "Very Low"));
        assert_eq!((&rows[1][7], &rows[1][8]), ("False Positive", "Very High"));
        assert_eq!((&rows[2][7], &rows[2][8]), ("Correct Prediction", "Very Low"));
    }

    #[test]
    fn sql_export_uses_snake_case_and_row_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sql.csv");
        let rows = test_rows();
        write_sql_export(&path, &rows, &predictions(&rows)).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let header = rdr.headers().unwrap().clone();
        assert_eq!(&header[0], "row_id");
        assert_eq!(&header[1], "time");
        assert_eq!(&header[2], "v1");
        assert!(header.iter().any(|h| h == "amount_scaled"));
        assert_eq!(&header[header.len() - 1], "is_false_negative");
        let first = rdr.records().next().unwrap().unwrap();
        assert_eq!(&first[0], "10");
        assert_eq!(first.len(), header.len());
    }

    #[test]
    fn misaligned_predictions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rows = test_rows();
        let mut preds = predictions(&rows);
        preds.pop();
        assert!(write_sql_export(&dir.path().join("x.csv"), &rows, &preds).is_err());
    }
}
