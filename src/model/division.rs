use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// An organizational unit. PROMS is queried once per division and day.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub(crate) struct Division {
    id: String,
    #[serde(rename = "nama_divisi")]
    name: String,
}

impl Division {
    pub(crate) fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The identifier sent to PROMS.
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// The display name written into the `division` column.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

/// The division reference list, in file order.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub(crate) struct Divisions(Vec<Division>);

impl Divisions {
    pub(crate) fn new(divisions: Vec<Division>) -> Result<Self> {
        if divisions.is_empty() {
            bail!("The division list is empty");
        }
        let mut ids = HashSet::new();
        for division in &divisions {
            if !ids.insert(division.id()) {
                bail!("Division id '{}' appears more than once", division.id());
            }
        }
        Ok(Self(divisions))
    }

    /// Loads a CSV file with the header `id,nama_divisi`. Other columns are ignored.
    pub(crate) async fn load(path: &Path) -> Result<Self> {
        let csv = utils::read(path).await?;
        Self::parse(&csv).with_context(|| format!("Invalid division file {}", path.display()))
    }

    pub(crate) fn parse(csv_data: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());
        let divisions = reader
            .deserialize::<Division>()
            .enumerate()
            .map(|(ix, record)| {
                record.with_context(|| format!("Unable to read division on line {}", ix + 2))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(divisions)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Division> {
        self.0.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}
