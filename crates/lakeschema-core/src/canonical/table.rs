//! Canonical table definitions.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::canonical::field::{CanonicalField, FieldValidationError};

/// How a table's row count was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowCountMode {
    /// Every record was read and counted.
    Counted,
    /// The count reflects only the inspected sample.
    Sampled,
    /// The count was taken from source metadata without reading records.
    Metadata,
}

/// Profiling metadata recorded alongside a table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TableMetadata {
    /// Row count, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Provenance of `row_count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count_mode: Option<RowCountMode>,
}

/// Canonical representation of a physical table.
///
/// Works uniformly for flat sources (a single delimited file) and for
/// nested record collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalTable {
    /// Table name (raw until the normalizer runs, final afterwards).
    pub name: String,
    /// Ordered fields; names are unique after normalization.
    pub fields: Vec<CanonicalField>,
    /// Optional table description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Profiling metadata.
    #[serde(default)]
    pub metadata: TableMetadata,
}

impl CanonicalTable {
    /// Construct a table with the given name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<CanonicalField>) -> Self {
        CanonicalTable {
            name: name.into(),
            fields,
            description: None,
            metadata: TableMetadata::default(),
        }
    }

    /// Validate the table: a non-empty field list, unique field names,
    /// and structurally valid field subtrees.
    pub fn validate(&self) -> Result<(), TableValidationError> {
        if self.fields.is_empty() {
            return EmptyFieldListSnafu {
                table: self.name.clone(),
            }
            .fail();
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return DuplicateFieldSnafu {
                    table: self.name.clone(),
                    field: field.name.clone(),
                }
                .fail();
            }
            field.validate(&field.name).context(InvalidFieldSnafu {
                table: self.name.clone(),
            })?;
        }
        Ok(())
    }
}

/// Errors raised when a canonical table is structurally invalid.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum TableValidationError {
    /// Tables must declare at least one field.
    #[snafu(display("table '{table}' has an empty field list"))]
    EmptyFieldList {
        /// Name of the offending table.
        table: String,
    },

    /// Field names must be unique within a table.
    #[snafu(display("table '{table}' declares field '{field}' more than once"))]
    DuplicateField {
        /// Name of the offending table.
        table: String,
        /// The duplicated field name.
        field: String,
    },

    /// A field subtree violated a structural invariant.
    #[snafu(display("table '{table}' has an invalid field: {source}"))]
    InvalidField {
        /// Name of the offending table.
        table: String,
        /// The underlying field error.
        source: FieldValidationError,
    },
}
