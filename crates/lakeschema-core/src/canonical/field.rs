//! Canonical column definitions and structural validation.
//!
//! This module models the recursive field shape shared by every adapter,
//! along with the structural invariants that downstream stages rely on:
//! numeric metadata only on DECIMAL, children only (and always) on
//! RECORD, element type only on arrays, and bounded nesting depth.
use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Canonical data types a sampled column can be classified into.
///
/// This is the closed vocabulary produced by the type inference engine;
/// adapters never invent types outside it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalDataType {
    /// Free-form text; also the safe fallback for unclassifiable samples.
    String,
    /// Base-10 integer.
    Integer,
    /// Fixed-point number with known precision and scale.
    Decimal,
    /// General floating-point number (including exponent notation).
    Float,
    /// Boolean value.
    Boolean,
    /// Calendar date without a time component.
    Date,
    /// Timezone-qualified timestamp, normalized to UTC.
    Timestamp,
    /// Well-known-text geometry.
    Geography,
    /// Half-open/closed date range literal.
    RangeDate,
    /// Nested record with named child fields.
    Record,
    /// Arbitrary JSON payload.
    Json,
}

impl fmt::Display for CanonicalDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CanonicalDataType::String => "STRING",
            CanonicalDataType::Integer => "INTEGER",
            CanonicalDataType::Decimal => "DECIMAL",
            CanonicalDataType::Float => "FLOAT",
            CanonicalDataType::Boolean => "BOOLEAN",
            CanonicalDataType::Date => "DATE",
            CanonicalDataType::Timestamp => "TIMESTAMP",
            CanonicalDataType::Geography => "GEOGRAPHY",
            CanonicalDataType::RangeDate => "RANGE_DATE",
            CanonicalDataType::Record => "RECORD",
            CanonicalDataType::Json => "JSON",
        };
        write!(f, "{name}")
    }
}

/// Numeric characteristics inferred from a DECIMAL sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumericMetadata {
    /// Total number of decimal digits (both sides of the decimal point).
    pub precision: u32,
    /// Number of digits to the right of the decimal point.
    pub scale: u32,
    /// Digits available left of the decimal point (`precision - scale`).
    pub max_integer_digits: u32,
    /// Whether negative values are representable. Always true for
    /// sampled text data.
    pub signed: bool,
}

/// Sample statistics recorded per column for downstream advisors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldStats {
    /// Distinct non-null values divided by non-null sample size.
    pub distinct_ratio: f64,
    /// Null (or missing) values divided by total sample size.
    pub null_ratio: f64,
}

/// Canonical representation of a column. Format-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalField {
    /// Column name (raw until the normalizer runs, final afterwards).
    pub name: String,

    /// Canonical data type. For arrays this is the element's type
    /// (RECORD for arrays of records).
    pub data_type: CanonicalDataType,

    /// Whether null values were observed or must be tolerated.
    pub nullable: bool,

    /// Optional human-readable description carried into the warehouse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Maximum observed string length, when the type is STRING.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Whether the column was absent from at least one sampled record.
    #[serde(default)]
    pub has_missing: bool,

    /// Precision/scale metadata. Present iff `data_type` is DECIMAL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_metadata: Option<NumericMetadata>,

    /// Whether the column is an array (REPEATED in the warehouse).
    #[serde(default)]
    pub is_array: bool,

    /// Element type for arrays. Set iff `is_array`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<CanonicalDataType>,

    /// Child fields. Non-empty iff `data_type` is RECORD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<CanonicalField>>,

    /// True when the sample consisted solely of `0`/`1` tokens, which
    /// may represent a boolean or a categorical integer.
    #[serde(default)]
    pub is_ambiguous_boolean: bool,

    /// Optional sample statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<FieldStats>,
}

impl CanonicalField {
    /// Construct a scalar field with the given type and nullability.
    ///
    /// All optional metadata starts unset; adapters fill it in as they
    /// learn more about the sample.
    pub fn scalar(name: impl Into<String>, data_type: CanonicalDataType, nullable: bool) -> Self {
        CanonicalField {
            name: name.into(),
            data_type,
            nullable,
            description: None,
            max_length: None,
            has_missing: false,
            numeric_metadata: None,
            is_array: false,
            element_type: None,
            children: None,
            is_ambiguous_boolean: false,
            stats: None,
        }
    }

    /// Construct a RECORD field owning the given children.
    pub fn record(name: impl Into<String>, children: Vec<CanonicalField>, nullable: bool) -> Self {
        let mut field = Self::scalar(name, CanonicalDataType::Record, nullable);
        field.children = Some(children);
        field
    }

    /// Construct an array field with the given element type.
    ///
    /// For arrays of records, pass `CanonicalDataType::Record` and set
    /// `children` afterwards.
    pub fn array(
        name: impl Into<String>,
        element_type: CanonicalDataType,
        nullable: bool,
    ) -> Self {
        let mut field = Self::scalar(name, element_type, nullable);
        field.is_array = true;
        field.element_type = Some(element_type);
        field
    }

    /// Validate the structural invariants of this field and its subtree.
    ///
    /// `path` is the dotted ancestor path used in error messages; pass
    /// the field's own name at the root.
    pub fn validate(&self, path: &str) -> Result<(), FieldValidationError> {
        if let Some(meta) = &self.numeric_metadata {
            if self.data_type != CanonicalDataType::Decimal {
                return NumericMetadataOnNonDecimalSnafu {
                    path: path.to_string(),
                    data_type: self.data_type,
                }
                .fail();
            }
            if meta.scale > meta.precision {
                return ScaleExceedsPrecisionSnafu {
                    path: path.to_string(),
                    precision: meta.precision,
                    scale: meta.scale,
                }
                .fail();
            }
        }

        if self.is_array != self.element_type.is_some() {
            return ArrayElementMismatchSnafu {
                path: path.to_string(),
                is_array: self.is_array,
            }
            .fail();
        }

        match (&self.children, self.data_type) {
            (Some(children), CanonicalDataType::Record) => {
                if children.is_empty() {
                    return EmptyRecordSnafu {
                        path: path.to_string(),
                    }
                    .fail();
                }
                for child in children {
                    let child_path = format!("{path}.{}", child.name);
                    child.validate(&child_path)?;
                }
                Ok(())
            }
            (None, CanonicalDataType::Record) => EmptyRecordSnafu {
                path: path.to_string(),
            }
            .fail(),
            (Some(_), data_type) => ChildrenOnNonRecordSnafu {
                path: path.to_string(),
                data_type,
            }
            .fail(),
            (None, _) => Ok(()),
        }
    }
}

/// Errors raised when a canonical field violates its structural invariants.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum FieldValidationError {
    /// Numeric metadata is only meaningful on DECIMAL columns.
    #[snafu(display("field '{path}' has numeric metadata but type {data_type}"))]
    NumericMetadataOnNonDecimal {
        /// Dotted path of the offending field.
        path: String,
        /// The non-DECIMAL type that carried metadata.
        data_type: CanonicalDataType,
    },

    /// Numeric scale must never exceed precision.
    #[snafu(display(
        "field '{path}' has scale {scale} exceeding precision {precision}"
    ))]
    ScaleExceedsPrecision {
        /// Dotted path of the offending field.
        path: String,
        /// Declared precision.
        precision: u32,
        /// Declared scale.
        scale: u32,
    },

    /// `element_type` must be set exactly when `is_array` is true.
    #[snafu(display(
        "field '{path}' array/element mismatch (is_array={is_array} but element_type disagrees)"
    ))]
    ArrayElementMismatch {
        /// Dotted path of the offending field.
        path: String,
        /// Whether the field claimed to be an array.
        is_array: bool,
    },

    /// RECORD fields must own at least one child.
    #[snafu(display("record field '{path}' has no children"))]
    EmptyRecord {
        /// Dotted path of the offending field.
        path: String,
    },

    /// Only RECORD fields may own children.
    #[snafu(display("field '{path}' of type {data_type} must not have children"))]
    ChildrenOnNonRecord {
        /// Dotted path of the offending field.
        path: String,
        /// The non-RECORD type that carried children.
        data_type: CanonicalDataType,
    },
}
