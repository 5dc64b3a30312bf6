//! Structural schema diffing and drift classification.
//!
//! Compares two mapped schemas column-by-column (matched by name, with
//! platform metadata columns filtered out first) and classifies every
//! difference as breaking or non-breaking. Breaking is defined purely in
//! terms of whether a consumer reading with the *old* schema assumption
//! could be surprised or fail: removal and tightening are breaking,
//! widening with optional columns is not.
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::{ColumnMode, MappedColumn, MappedType};
use crate::naming::is_platform_metadata_column;

/// One classified schema change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "change", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaChange {
    /// A new column that existing readers cannot supply.
    AddRequiredColumn {
        /// The added column.
        column: String,
    },
    /// A new optional column; safe widening.
    AddNullableColumn {
        /// The added column.
        column: String,
    },
    /// A column existing readers may still select.
    RemoveColumn {
        /// The removed column.
        column: String,
    },
    /// The column's type changed.
    TypeChange {
        /// The modified column.
        column: String,
        /// Previous type.
        from: MappedType,
        /// New type.
        to: MappedType,
    },
    /// The column tightened from NULLABLE to REQUIRED.
    NullableToRequired {
        /// The modified column.
        column: String,
    },
    /// Any other modification (description, safe mode change).
    NonBreakingModification {
        /// The modified column.
        column: String,
    },
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::AddRequiredColumn { column } => {
                write!(f, "ADD_REQUIRED_COLUMN {column}")
            }
            SchemaChange::AddNullableColumn { column } => {
                write!(f, "ADD_NULLABLE_COLUMN {column}")
            }
            SchemaChange::RemoveColumn { column } => write!(f, "REMOVE_COLUMN {column}"),
            SchemaChange::TypeChange { column, from, to } => {
                write!(f, "TYPE_CHANGE {column} {from} -> {to}")
            }
            SchemaChange::NullableToRequired { column } => {
                write!(f, "NULLABLE_TO_REQUIRED {column}")
            }
            SchemaChange::NonBreakingModification { column } => {
                write!(f, "NON_BREAKING_MODIFICATION {column}")
            }
        }
    }
}

/// A column present in both schemas whose definition changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModifiedColumn {
    /// The column name.
    pub column: String,
    /// Definition in the previously registered schema.
    pub old: MappedColumn,
    /// Definition in the newly inferred schema.
    pub new: MappedColumn,
}

/// Result of diffing a registered schema against a newly inferred one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DiffReport {
    /// Columns present only in the new schema.
    pub added_columns: Vec<MappedColumn>,
    /// Columns present only in the old schema.
    pub removed_columns: Vec<MappedColumn>,
    /// Columns present in both with differing definitions.
    pub modified_columns: Vec<ModifiedColumn>,
    /// Classified breaking changes.
    pub breaking_changes: Vec<SchemaChange>,
    /// Classified non-breaking changes.
    pub non_breaking_changes: Vec<SchemaChange>,
}

impl DiffReport {
    /// Whether the two schemas are structurally identical.
    pub fn is_empty(&self) -> bool {
        self.breaking_changes.is_empty() && self.non_breaking_changes.is_empty()
    }

    /// Whether any breaking change was classified.
    pub fn has_breaking(&self) -> bool {
        !self.breaking_changes.is_empty()
    }
}

fn field_changed(old: &MappedColumn, new: &MappedColumn) -> bool {
    old.column_type != new.column_type || old.mode != new.mode || old.description != new.description
}

fn business_columns(schema: &[MappedColumn]) -> Vec<&MappedColumn> {
    schema
        .iter()
        .filter(|column| !is_platform_metadata_column(&column.name))
        .collect()
}

/// Structurally compare two mapped schemas.
///
/// Platform metadata columns are dropped from both sides before
/// matching; columns are matched by name. Classification: additions are
/// breaking only in REQUIRED mode, removals are always breaking, type
/// changes and NULLABLE-to-REQUIRED tightening are breaking, and every
/// other modification is non-breaking.
pub fn diff(old: &[MappedColumn], new: &[MappedColumn]) -> DiffReport {
    let old_columns = business_columns(old);
    let new_columns = business_columns(new);

    let old_by_name: HashMap<&str, &MappedColumn> = old_columns
        .iter()
        .map(|column| (column.name.as_str(), *column))
        .collect();
    let new_by_name: HashMap<&str, &MappedColumn> = new_columns
        .iter()
        .map(|column| (column.name.as_str(), *column))
        .collect();

    let mut report = DiffReport::default();

    for column in &new_columns {
        match old_by_name.get(column.name.as_str()) {
            None => report.added_columns.push((*column).clone()),
            Some(old_column) if field_changed(old_column, column) => {
                report.modified_columns.push(ModifiedColumn {
                    column: column.name.clone(),
                    old: (*old_column).clone(),
                    new: (*column).clone(),
                });
            }
            Some(_) => {}
        }
    }

    for column in &old_columns {
        if !new_by_name.contains_key(column.name.as_str()) {
            report.removed_columns.push((*column).clone());
        }
    }

    for column in &report.added_columns {
        let change = if column.mode == ColumnMode::Required {
            SchemaChange::AddRequiredColumn {
                column: column.name.clone(),
            }
        } else {
            SchemaChange::AddNullableColumn {
                column: column.name.clone(),
            }
        };
        match change {
            SchemaChange::AddRequiredColumn { .. } => report.breaking_changes.push(change),
            _ => report.non_breaking_changes.push(change),
        }
    }

    for column in &report.removed_columns {
        report.breaking_changes.push(SchemaChange::RemoveColumn {
            column: column.name.clone(),
        });
    }

    for modified in &report.modified_columns {
        if modified.old.column_type != modified.new.column_type {
            report.breaking_changes.push(SchemaChange::TypeChange {
                column: modified.column.clone(),
                from: modified.old.column_type,
                to: modified.new.column_type,
            });
        } else if modified.old.mode == ColumnMode::Nullable
            && modified.new.mode == ColumnMode::Required
        {
            report
                .breaking_changes
                .push(SchemaChange::NullableToRequired {
                    column: modified.column.clone(),
                });
        } else {
            report
                .non_breaking_changes
                .push(SchemaChange::NonBreakingModification {
                    column: modified.column.clone(),
                });
        }
    }

    report
}
