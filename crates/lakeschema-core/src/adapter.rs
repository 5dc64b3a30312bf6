//! Value adapter: canonical tables from sampled JSON records.
//!
//! Takes a sample of pre-parsed record objects and builds a
//! [`CanonicalTable`] by running type inference over every scalar
//! column and recursing into nested objects and arrays. Byte-level
//! concerns (encoding, delimiters, container formats) live with the
//! caller; this module only sees `serde_json::Value`.
//!
//! Column order follows first appearance across the sample. Sparse
//! records are tolerated (a missing key reads as null and marks the
//! column `has_missing`); heterogeneous unions and mixed-kind arrays
//! are rejected with a descriptive error rather than guessed at.
use std::collections::{HashMap, HashSet};

use serde_json::Value;
use snafu::prelude::*;

use crate::canonical::{
    CanonicalDataType, CanonicalField, CanonicalTable, FieldStats, RowCountMode,
};
use crate::inference::{self, numeric, InferenceError};

/// Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Nesting deeper than this is rejected. Self-referential definitions
/// cannot occur in owned JSON values, so a depth bound is the practical
/// cycle guard.
pub const MAX_NESTING_DEPTH: usize = 16;

/// How many records of the sample are inspected by default.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Errors raised while building a canonical table from sampled records.
#[derive(Debug, Snafu)]
pub enum AdapterError {
    /// The sample contained no record objects.
    #[snafu(display("no record objects found in the input sample"))]
    EmptySample,

    /// A column mixed incompatible JSON kinds (e.g. number and string).
    #[snafu(display("column '{column}' mixes incompatible value kinds: {}", kinds.join(", ")))]
    MixedValueKinds {
        /// The offending column.
        column: String,
        /// The distinct kinds observed, sorted.
        kinds: Vec<String>,
    },

    /// An array column mixed object and non-object elements.
    #[snafu(display("array column '{column}' mixes object and non-object elements"))]
    MixedArrayElements {
        /// The offending column.
        column: String,
    },

    /// Nesting exceeded the recursion guard.
    #[snafu(display("column '{column}' is nested deeper than {MAX_NESTING_DEPTH} levels"))]
    NestingTooDeep {
        /// The offending column.
        column: String,
    },

    /// Type inference rejected the column's sample.
    #[snafu(display("type inference failed for column '{column}': {source}"))]
    Inference {
        /// The offending column.
        column: String,
        /// The underlying inference error.
        source: InferenceError,
    },
}

/// JSON kind label used in mixed-kind error messages.
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a scalar JSON value as the token fed to type inference.
/// Nulls become the empty string, which inference treats as a null
/// marker.
fn scalar_token(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Per-column sample accumulated across records, in first-seen order.
struct ColumnSample {
    raw_name: String,
    values: Vec<Value>,
    has_missing: bool,
}

fn collect_columns(records: &[Value]) -> Vec<ColumnSample> {
    let mut order: Vec<ColumnSample> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Value::Object(map) = record else {
            continue;
        };

        let mut present: HashSet<usize> = HashSet::with_capacity(map.len());
        for (key, value) in map {
            let clean = key.trim().to_string();
            let slot = match index.get(clean.as_str()) {
                Some(&i) => i,
                None => {
                    index.insert(clean.clone(), order.len());
                    order.push(ColumnSample {
                        raw_name: clean,
                        values: Vec::new(),
                        has_missing: false,
                    });
                    order.len() - 1
                }
            };
            order[slot].values.push(value.clone());
            present.insert(slot);
        }

        for (slot, column) in order.iter_mut().enumerate() {
            if !present.contains(&slot) {
                column.values.push(Value::Null);
                column.has_missing = true;
            }
        }
    }

    order
}

fn stats_for(values: &[Value]) -> FieldStats {
    let total = values.len();
    let non_null: Vec<String> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(scalar_token)
        .collect();
    let nulls = total - non_null.len();
    let distinct: HashSet<&str> = non_null.iter().map(String::as_str).collect();

    FieldStats {
        distinct_ratio: if non_null.is_empty() {
            0.0
        } else {
            distinct.len() as f64 / non_null.len() as f64
        },
        null_ratio: if total == 0 {
            0.0
        } else {
            nulls as f64 / total as f64
        },
    }
}

fn infer_scalar_field(
    name: &str,
    values: &[Value],
    has_missing: bool,
) -> AdapterResult<CanonicalField> {
    let tokens: Vec<String> = values.iter().map(scalar_token).collect();
    let data_type = inference::infer(&tokens).context(InferenceSnafu {
        column: name.to_string(),
    })?;

    let nullable = has_missing || values.iter().any(Value::is_null);
    let mut field = CanonicalField::scalar(name, data_type, nullable);
    field.has_missing = has_missing;
    field.is_ambiguous_boolean = inference::is_ambiguous_boolean(&tokens);
    field.stats = Some(stats_for(values));

    match data_type {
        CanonicalDataType::Decimal => {
            field.numeric_metadata = numeric::infer_numeric_metadata(&tokens);
        }
        CanonicalDataType::String => {
            field.max_length = values
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| scalar_token(v).chars().count())
                .max();
        }
        _ => {}
    }

    Ok(field)
}

fn infer_array_field(
    name: &str,
    values: &[Value],
    has_missing: bool,
    depth: usize,
) -> AdapterResult<CanonicalField> {
    let mut elements: Vec<Value> = Vec::new();
    for value in values {
        if let Value::Array(items) = value {
            elements.extend(items.iter().cloned());
        }
    }

    let objects = elements.iter().filter(|v| v.is_object()).count();
    if objects > 0 {
        if objects != elements.len() {
            return MixedArrayElementsSnafu {
                column: name.to_string(),
            }
            .fail();
        }
        let children = infer_fields(name, &elements, depth + 1)?;
        let mut field = CanonicalField::array(name, CanonicalDataType::Record, true);
        field.children = Some(children);
        field.has_missing = has_missing;
        return Ok(field);
    }

    if elements.iter().any(|v| v.is_array()) {
        return NestingTooDeepSnafu {
            column: name.to_string(),
        }
        .fail();
    }

    let tokens: Vec<String> = elements.iter().map(scalar_token).collect();
    let element_type = inference::infer(&tokens).context(InferenceSnafu {
        column: name.to_string(),
    })?;

    let mut field = CanonicalField::array(name, element_type, true);
    field.has_missing = has_missing;
    field.stats = Some(stats_for(&elements));
    Ok(field)
}

/// Infer the field list for one nesting level of the sample.
///
/// `scope` names the enclosing entity or column for positional fallback
/// names and error messages.
fn infer_fields(scope: &str, records: &[Value], depth: usize) -> AdapterResult<Vec<CanonicalField>> {
    if depth > MAX_NESTING_DEPTH {
        return NestingTooDeepSnafu {
            column: scope.to_string(),
        }
        .fail();
    }

    let columns = collect_columns(records);
    ensure!(!columns.is_empty(), EmptySampleSnafu);

    let mut fields = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        // Empty keys get a positional fallback name.
        let name = if column.raw_name.is_empty() {
            format!("{scope}_{}", idx + 1)
        } else {
            column.raw_name.clone()
        };

        let non_null: Vec<&Value> = column.values.iter().filter(|v| !v.is_null()).collect();
        let saw_null = non_null.len() != column.values.len();

        let all_objects = !non_null.is_empty() && non_null.iter().all(|v| v.is_object());
        let all_arrays = !non_null.is_empty() && non_null.iter().all(|v| v.is_array());

        if all_objects {
            let owned: Vec<Value> = non_null.into_iter().cloned().collect();
            let children = infer_fields(&name, &owned, depth + 1)?;
            let mut field = CanonicalField::record(&name, children, saw_null || column.has_missing);
            field.has_missing = column.has_missing;
            fields.push(field);
            continue;
        }

        if all_arrays {
            fields.push(infer_array_field(
                &name,
                &column.values,
                column.has_missing,
                depth,
            )?);
            continue;
        }

        // Scalars only from here. Numbers of different JSON flavors
        // (integer and float) share one kind and widen through
        // inference; anything else mixing kinds is rejected.
        let kinds: HashSet<&'static str> = non_null.iter().map(|v| kind_of(v)).collect();
        if kinds.len() > 1 || kinds.contains("object") || kinds.contains("array") {
            let mut sorted: Vec<String> = kinds.into_iter().map(String::from).collect();
            sorted.sort_unstable();
            return MixedValueKindsSnafu {
                column: name,
                kinds: sorted,
            }
            .fail();
        }

        fields.push(infer_scalar_field(&name, &column.values, column.has_missing)?);
    }

    Ok(fields)
}

/// Build a canonical table from a sample of record objects.
///
/// At most [`DEFAULT_SAMPLE_SIZE`] records are inspected; non-object
/// records in the sample are skipped. The resulting table records the
/// inspected count as a sampled row count.
///
/// # Errors
///
/// `EmptySample` when no record objects remain, `MixedValueKinds` and
/// `MixedArrayElements` for heterogeneous unions, `NestingTooDeep`
/// beyond [`MAX_NESTING_DEPTH`] levels, and `Inference` when a column's
/// sample is rejected (naive timestamps).
pub fn build_table(entity: &str, records: &[Value]) -> AdapterResult<CanonicalTable> {
    let sample: Vec<Value> = records
        .iter()
        .filter(|record| record.is_object())
        .take(DEFAULT_SAMPLE_SIZE)
        .cloned()
        .collect();
    ensure!(!sample.is_empty(), EmptySampleSnafu);

    let fields = infer_fields(entity, &sample, 0)?;

    let mut table = CanonicalTable::new(entity, fields);
    table.metadata.row_count = Some(sample.len() as u64);
    table.metadata.row_count_mode = Some(RowCountMode::Sampled);
    Ok(table)
}
