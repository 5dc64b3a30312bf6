//! Projection from canonical fields to warehouse column definitions.
//!
//! A narrow, mostly mechanical boundary: arrays become REPEATED columns
//! carrying the element's scalar type, records become RECORD columns
//! with nested fields, and DECIMAL chooses between the narrow and wide
//! fixed-point types based on inferred precision and scale. The output
//! shape here is exactly what the diff engine and the registry consume.
use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::canonical::field::{CanonicalDataType, CanonicalField, NumericMetadata};
use crate::canonical::table::CanonicalTable;

/// Precision bound for the narrow fixed-point type.
const NARROW_NUMERIC_MAX_PRECISION: u32 = 38;
/// Scale bound for the narrow fixed-point type.
const NARROW_NUMERIC_MAX_SCALE: u32 = 9;

/// Warehouse column types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MappedType {
    /// UTF-8 text.
    #[serde(rename = "STRING")]
    String,
    /// 64-bit signed integer.
    #[serde(rename = "INT64")]
    Int64,
    /// 64-bit floating point.
    #[serde(rename = "FLOAT64")]
    Float64,
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool,
    /// Calendar date.
    #[serde(rename = "DATE")]
    Date,
    /// UTC timestamp.
    #[serde(rename = "TIMESTAMP")]
    Timestamp,
    /// Fixed-point numeric, up to 38 digits of precision and 9 of scale.
    #[serde(rename = "NUMERIC")]
    Numeric,
    /// Wide fixed-point numeric for precision/scale beyond NUMERIC.
    #[serde(rename = "BIGNUMERIC")]
    Bignumeric,
    /// Arbitrary JSON payload.
    #[serde(rename = "JSON")]
    Json,
    /// Nested record with its own column list.
    #[serde(rename = "RECORD")]
    Record,
    /// Well-known-text geometry.
    #[serde(rename = "GEOGRAPHY")]
    Geography,
    /// Range over an element type (the element is recorded alongside).
    #[serde(rename = "RANGE")]
    Range,
}

impl MappedType {
    /// Canonical wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MappedType::String => "STRING",
            MappedType::Int64 => "INT64",
            MappedType::Float64 => "FLOAT64",
            MappedType::Bool => "BOOL",
            MappedType::Date => "DATE",
            MappedType::Timestamp => "TIMESTAMP",
            MappedType::Numeric => "NUMERIC",
            MappedType::Bignumeric => "BIGNUMERIC",
            MappedType::Json => "JSON",
            MappedType::Record => "RECORD",
            MappedType::Geography => "GEOGRAPHY",
            MappedType::Range => "RANGE",
        }
    }
}

impl fmt::Display for MappedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnMode {
    /// Null values allowed.
    Nullable,
    /// Null values rejected by the warehouse.
    Required,
    /// Array of values.
    Repeated,
}

impl ColumnMode {
    /// Canonical wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnMode::Nullable => "NULLABLE",
            ColumnMode::Required => "REQUIRED",
            ColumnMode::Repeated => "REPEATED",
        }
    }
}

impl fmt::Display for ColumnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single warehouse column definition.
///
/// This is the only shape the diff engine and the registry understand;
/// it is warehouse-agnostic in structure even though the type vocabulary
/// matches the target warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappedColumn {
    /// Final (normalized) column name.
    pub name: String,
    /// Warehouse type.
    #[serde(rename = "type")]
    pub column_type: MappedType,
    /// Column mode.
    pub mode: ColumnMode,
    /// Optional description. Ignored by the structural hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested columns for RECORD types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<MappedColumn>,
    /// Element type for RANGE columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_element_type: Option<MappedType>,
}

/// Errors raised while projecting canonical fields to mapped columns.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum MappingError {
    /// RECORD fields must carry children to project.
    #[snafu(display("record field '{field}' has no children to project"))]
    RecordWithoutChildren {
        /// Name of the offending field.
        field: String,
    },
}

fn numeric_type(metadata: Option<&NumericMetadata>) -> MappedType {
    match metadata {
        Some(meta)
            if meta.precision <= NARROW_NUMERIC_MAX_PRECISION
                && meta.scale <= NARROW_NUMERIC_MAX_SCALE =>
        {
            MappedType::Numeric
        }
        Some(_) => MappedType::Bignumeric,
        None => MappedType::Numeric,
    }
}

fn scalar_type(data_type: CanonicalDataType, field: &CanonicalField) -> MappedType {
    match data_type {
        CanonicalDataType::Integer => MappedType::Int64,
        CanonicalDataType::Float => MappedType::Float64,
        CanonicalDataType::Boolean => MappedType::Bool,
        CanonicalDataType::Date => MappedType::Date,
        CanonicalDataType::Timestamp => MappedType::Timestamp,
        CanonicalDataType::Decimal => numeric_type(field.numeric_metadata.as_ref()),
        CanonicalDataType::Json => MappedType::Json,
        CanonicalDataType::Record => MappedType::Record,
        CanonicalDataType::Geography => MappedType::Geography,
        CanonicalDataType::RangeDate => MappedType::Range,
        CanonicalDataType::String => MappedType::String,
    }
}

/// Project a single canonical field into a mapped column.
///
/// Arrays project to mode REPEATED with the element's type; all other
/// fields take NULLABLE or REQUIRED from their nullability. RECORD
/// fields project their children recursively.
pub fn project_field(field: &CanonicalField) -> Result<MappedColumn, MappingError> {
    let element_type = field.element_type.unwrap_or(field.data_type);
    let effective_type = if field.is_array {
        element_type
    } else {
        field.data_type
    };

    let mode = if field.is_array {
        ColumnMode::Repeated
    } else if field.nullable {
        ColumnMode::Nullable
    } else {
        ColumnMode::Required
    };

    let column_type = scalar_type(effective_type, field);

    let fields = if effective_type == CanonicalDataType::Record {
        let children = field
            .children
            .as_deref()
            .filter(|children| !children.is_empty())
            .context(RecordWithoutChildrenSnafu {
                field: field.name.clone(),
            })?;
        children
            .iter()
            .map(project_field)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    let range_element_type = match effective_type {
        CanonicalDataType::RangeDate => Some(MappedType::Date),
        _ => None,
    };

    Ok(MappedColumn {
        name: field.name.clone(),
        column_type,
        mode,
        description: field.description.clone(),
        fields,
        range_element_type,
    })
}

/// Project every field of a normalized canonical table.
pub fn project_table(table: &CanonicalTable) -> Result<Vec<MappedColumn>, MappingError> {
    table.fields.iter().map(project_field).collect()
}
