//! Input column contract: the boundary between the raw transaction file and the pipeline.
//!
//! Defines the exact column names the loader accepts. Every column is numeric;
//! `Class` must hold 0 or 1. Column order is free, names are not.

use crate::domain::COMPONENT_COUNT;

pub const TIME_COLUMN: &str = "Time";
pub const AMOUNT_COLUMN: &str = "Amount";
pub const CLASS_COLUMN: &str = "Class";

/// Name of the i-th anonymized component column (0-based index → `V1`..`V28`).
pub fn component_column(index: usize) -> String {
    format!("V{}", index + 1)
}

/// The canonical column list in file order: `Time`, `V1`..`V28`, `Amount`, `Class`.
pub fn expected_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(COMPONENT_COUNT + 3);
    columns.push(TIME_COLUMN.to_string());
    columns.extend((0..COMPONENT_COUNT).map(component_column));
    columns.push(AMOUNT_COLUMN.to_string());
    columns.push(CLASS_COLUMN.to_string());
    columns
}

/// Position of every expected column inside a concrete header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    pub time: usize,
    pub components: [usize; COMPONENT_COUNT],
    pub amount: usize,
    pub class: usize,
}

/// Result of schema validation.
#[derive(Debug, Clone)]
pub struct SchemaValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Present only when `is_valid`.
    pub index: Option<ColumnIndex>,
}

/// Validate a header row against the column contract.
///
/// Missing, duplicated, and unexpected columns are all reported.
pub fn validate_header(header: &[&str]) -> SchemaValidation {
    let mut errors = Vec::new();

    let find = |name: &str, errors: &mut Vec<String>| -> Option<usize> {
        let positions: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, h)| **h == name)
            .map(|(i, _)| i)
            .collect();
        match positions.as_slice() {
            [only] => Some(*only),
            [] => {
                errors.push(format!("missing required column '{name}'"));
                None
            }
            _ => {
                errors.push(format!("column '{name}' appears {} times", positions.len()));
                None
            }
        }
    };

    let time = find(TIME_COLUMN, &mut errors);
    let amount = find(AMOUNT_COLUMN, &mut errors);
    let class = find(CLASS_COLUMN, &mut errors);
    let mut components = [0usize; COMPONENT_COUNT];
    let mut components_ok = true;
    for (i, slot) in components.iter_mut().enumerate() {
        match find(&component_column(i), &mut errors) {
            Some(pos) => *slot = pos,
            None => components_ok = false,
        }
    }

    let expected = expected_columns();
    for name in header {
        if !expected.iter().any(|e| e == name) {
            errors.push(format!("unexpected column '{name}' (not in schema)"));
        }
    }

    let index = match (time, amount, class) {
        (Some(time), Some(amount), Some(class)) if components_ok && errors.is_empty() => {
            Some(ColumnIndex {
                time,
                components,
                amount,
                class,
            })
        }
        _ => None,
    };

    SchemaValidation {
        is_valid: errors.is_empty(),
        errors,
        index,
    }
}
