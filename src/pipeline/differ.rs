use crate::model::{cell_text, Table};
use crate::pipeline::CREATED_AT;
use crate::Result;
use serde_json::Value;
use std::collections::HashSet;

/// The rows of a fresh sheet read next to the transformed rows that the sheet does not have yet.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Diff {
    current: Table,
    additions: Table,
}

impl Diff {
    /// Keeps the rows of `transformed` whose `created_at` text does not already appear in
    /// `current`. Rows within `transformed` are not deduplicated against each other.
    pub(crate) fn compute(current: Table, transformed: Table) -> Result<Self> {
        if !current.is_empty() {
            current.require_column(CREATED_AT)?;
        }
        if !transformed.is_empty() {
            transformed.require_column(CREATED_AT)?;
        }

        let existing: HashSet<String> = current
            .rows()
            .iter()
            .map(|row| created_at_key(row.get(CREATED_AT)))
            .collect();

        let mut additions = transformed;
        additions.retain(|row| !existing.contains(&created_at_key(row.get(CREATED_AT))));
        Ok(Self { current, additions })
    }

    pub(crate) fn current(&self) -> &Table {
        &self.current
    }

    pub(crate) fn additions(&self) -> &Table {
        &self.additions
    }

    /// The sheet rows followed by the additions, in the sheet's column order with any new
    /// columns appended.
    pub(crate) fn combined(&self) -> Table {
        let mut combined = self.current.clone();
        combined.extend(self.additions.clone());
        combined
    }
}

fn created_at_key(value: Option<&Value>) -> String {
    cell_text(value).trim().to_string()
}
