use crate::Result;
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A single record keyed by column name.
pub(crate) type Row = Map<String, Value>;

/// A header plus rows of JSON cell values.
///
/// `columns` fixes the column order; a row may lack a key for any column, in which case the cell
/// is treated as null. Rows coming from a sheet hold strings, rows coming from PROMS hold whatever
/// JSON the API returned.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Builds a table from the row-major strings of a worksheet. The first row is the header, and
    /// a blank or repeated header name is an error. Short rows are padded with empty strings,
    /// cells past the header are ignored and rows that are entirely blank are skipped.
    pub(crate) fn from_sheet_values<S, R>(values: impl IntoIterator<Item = R>) -> Result<Self>
    where
        S: Into<String>,
        R: IntoIterator<Item = S>,
    {
        let mut rows = values.into_iter();
        let columns: Vec<String> = match rows.next() {
            Some(header) => header.into_iter().map(|s| s.into()).collect(),
            None => return Ok(Self::new()),
        };

        // Cells are keyed by header name, so every header must be present and unique.
        let mut seen = HashSet::new();
        for (ix, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                bail!("The header of column {} is empty", ix + 1);
            }
            if !seen.insert(column.as_str()) {
                bail!("Encountered a duplicate header '{column}'");
            }
        }

        let mut table = Self {
            columns,
            rows: Vec::new(),
        };
        for values in rows {
            let mut values: Vec<String> = values.into_iter().map(|s| s.into()).collect();
            if values.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            values.resize(table.columns.len(), String::new());
            let row: Row = table
                .columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.clone(), Value::String(value)))
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Renders the table as worksheet values: the header followed by one line per row.
    pub(crate) fn to_sheet_values(&self) -> Vec<Vec<String>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(self.columns.clone());
        for row in &self.rows {
            values.push(
                self.columns
                    .iter()
                    .map(|column| cell_text(row.get(column)))
                    .collect(),
            );
        }
        values
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Fails unless `column` is part of the header.
    pub(crate) fn require_column(&self, column: &str) -> Result<()> {
        ensure!(
            self.has_column(column),
            "Expected column '{column}' is missing, found [{}]",
            self.columns.join(", ")
        );
        Ok(())
    }

    /// Appends `row`. Keys that are not yet columns become new columns, in the row's key order.
    pub(crate) fn push(&mut self, row: Row) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Appends all rows of `other`, keeping this table's column order and adding the columns that
    /// only `other` has at the end.
    pub(crate) fn extend(&mut self, other: Table) {
        for column in other.columns {
            if !self.has_column(&column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(other.rows);
    }

    pub(crate) fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        self.require_column(from)?;
        ensure!(
            !self.has_column(to),
            "Cannot rename '{from}' to '{to}' because '{to}' already exists"
        );
        for column in self.columns.iter_mut().filter(|c| c.as_str() == from) {
            *column = to.to_string();
        }
        for row in &mut self.rows {
            if let Some(value) = row.remove(from) {
                row.insert(to.to_string(), value);
            }
        }
        Ok(())
    }

    pub(crate) fn drop_column(&mut self, column: &str) -> Result<()> {
        self.require_column(column)?;
        self.columns.retain(|c| c != column);
        for row in &mut self.rows {
            row.remove(column);
        }
        Ok(())
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Row) -> bool) {
        self.rows.retain(keep);
    }

    /// Adds (or replaces) `column`, computing each cell from its row.
    pub(crate) fn set_column(&mut self, column: &str, mut value: impl FnMut(&Row) -> Value) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
        for row in &mut self.rows {
            let v = value(row);
            row.insert(column.to_string(), v);
        }
    }
}

impl FromIterator<Row> for Table {
    fn from_iter<T: IntoIterator<Item = Row>>(iter: T) -> Self {
        let mut table = Table::new();
        for row in iter {
            table.push(row);
        }
        table
    }
}

/// Returns `true` for JSON null and for a missing cell.
pub(crate) fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Returns `true` for a number equal to zero or a string holding such a number.
pub(crate) fn is_zero(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f == 0.0).unwrap_or(false),
        _ => false,
    }
}

/// The text that is written to a sheet cell for `value`.
pub(crate) fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "TRUE".to_string(),
        Some(Value::Bool(false)) => "FALSE".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_from_sheet_values() {
        let table = Table::from_sheet_values(vec![
            vec!["created_at", "score", "remarks"],
            vec!["2024-01-01", "3", "ok"],
            vec!["2024-01-02"],
            vec!["", " ", ""],
            vec!["2024-01-03", "1", "x", "overflow"],
        ])
        .unwrap();

        assert_eq!(vec!["created_at", "score", "remarks"], table.columns());
        assert_eq!(3, table.len());
        assert_eq!(Some(&json!("")), table.rows()[1].get("remarks"));
        assert_eq!(3, table.rows()[2].len());
    }

    #[test]
    fn test_from_sheet_values_empty() {
        let table = Table::from_sheet_values(Vec::<Vec<String>>::new()).unwrap();
        assert!(table.is_empty());
        assert!(table.columns().is_empty());

        let header_only = Table::from_sheet_values(vec![vec!["created_at"]]).unwrap();
        assert!(header_only.is_empty());
        assert!(header_only.has_column("created_at"));
    }

    #[test]
    fn test_from_sheet_values_duplicate_header() {
        let result = Table::from_sheet_values(vec![vec!["a", "b", "a"]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_sheet_values_blank_header() {
        let message = Table::from_sheet_values(vec![
            vec!["created_at", "", ""],
            vec!["2024-01-01", "left", "right"],
        ])
        .unwrap_err()
        .to_string();
        assert!(message.contains("column 2"), "{message}");

        assert!(Table::from_sheet_values(vec![vec!["created_at", " "]]).is_err());
    }

    #[test]
    fn test_sheet_values_round_trip() {
        let values = vec![
            vec!["created_at", "left", "right"],
            vec!["2024-01-01", "l", "r"],
            vec!["2024-01-02", "", "only right"],
        ];
        let table = Table::from_sheet_values(values.clone()).unwrap();
        assert_eq!(values, table.to_sheet_values());
    }

    #[test]
    fn test_push_collects_columns_in_first_seen_order() {
        let table: Table = vec![
            row(json!({"b": 1, "a": 2})),
            row(json!({"a": 3, "c": 4})),
        ]
        .into_iter()
        .collect();
        assert_eq!(vec!["b", "a", "c"], table.columns());
    }

    #[test]
    fn test_extend_keeps_left_column_order() {
        let mut left = Table::from_sheet_values(vec![vec!["x", "y"], vec!["1", "2"]]).unwrap();
        let right: Table = vec![row(json!({"z": true, "x": 5}))].into_iter().collect();
        left.extend(right);
        assert_eq!(vec!["x", "y", "z"], left.columns());
        assert_eq!(
            vec![
                vec!["x", "y", "z"],
                vec!["1", "2", ""],
                vec!["5", "", "TRUE"],
            ],
            left.to_sheet_values()
        );
    }

    #[test]
    fn test_rename_and_drop() {
        let mut table: Table = vec![row(json!({"ttc": 1, "time_input": null}))]
            .into_iter()
            .collect();
        table.rename_column("ttc", "time_to_completion").unwrap();
        table.drop_column("time_input").unwrap();
        assert_eq!(vec!["time_to_completion"], table.columns());
        assert_eq!(Some(&json!(1)), table.rows()[0].get("time_to_completion"));
        assert!(table.drop_column("time_input").is_err());
        assert!(table.rename_column("nope", "other").is_err());
    }

    #[test]
    fn test_rename_onto_existing_column_fails() {
        let mut table: Table = vec![row(json!({"a": 1, "b": 2}))].into_iter().collect();
        assert!(table.rename_column("a", "b").is_err());
    }

    #[test]
    fn test_cell_helpers() {
        assert!(is_null(None));
        assert!(is_null(Some(&Value::Null)));
        assert!(!is_null(Some(&json!(""))));

        assert!(is_zero(Some(&json!(0))));
        assert!(is_zero(Some(&json!(0.0))));
        assert!(is_zero(Some(&json!(" 0 "))));
        assert!(!is_zero(Some(&json!("0.5"))));
        assert!(!is_zero(Some(&json!("abc"))));
        assert!(!is_zero(None));

        assert_eq!("", cell_text(Some(&Value::Null)));
        assert_eq!("2.5", cell_text(Some(&json!(2.5))));
        assert_eq!("FALSE", cell_text(Some(&json!(false))));
        assert_eq!("text", cell_text(Some(&json!("text"))));
    }
}
