//! Identifier normalization and rename lineage.
//!
//! Maps raw table and column names to stable warehouse-safe identifiers:
//! lowercase, `[a-z0-9_]` only, collapsed underscores, leading-character
//! repair, reserved-keyword collision handling, and deterministic
//! de-duplication in source field order. Every raw-to-final pair is
//! recorded in the schema's rename mappings so lineage documentation can
//! trace each identifier back to its source.
use std::collections::{BTreeMap, HashMap};

use snafu::prelude::*;

use crate::canonical::schema::CanonicalSchema;

/// Result alias for normalization operations.
pub type NamingResult<T> = Result<T, NamingError>;

/// Errors raised while normalizing a canonical schema.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum NamingError {
    /// Dataset identity fields drive naming and must all be present.
    #[snafu(display("dataset identity is missing required field '{field}'"))]
    MissingDatasetIdentity {
        /// The absent identity field.
        field: String,
    },

    /// Platform metadata column names are reserved for the ingestion
    /// layer and must never be claimed by business columns.
    #[snafu(display(
        "column '{raw}' in table '{table}' normalizes to reserved platform column '{normalized}'"
    ))]
    ReservedPlatformColumn {
        /// Raw column name as submitted.
        raw: String,
        /// The reserved identifier it collided with.
        normalized: String,
        /// The table containing the column.
        table: String,
    },
}

/// Warehouse reserved keywords (lowercased, sorted for binary search).
const RESERVED_KEYWORDS: [&str; 96] = [
    "all",
    "and",
    "any",
    "array",
    "as",
    "asc",
    "assert_rows_modified",
    "at",
    "between",
    "by",
    "case",
    "cast",
    "collate",
    "contains",
    "create",
    "cross",
    "cube",
    "current",
    "default",
    "define",
    "desc",
    "distinct",
    "else",
    "end",
    "enum",
    "escape",
    "except",
    "exclude",
    "exists",
    "extract",
    "false",
    "fetch",
    "following",
    "for",
    "from",
    "full",
    "group",
    "grouping",
    "groups",
    "hash",
    "having",
    "if",
    "ignore",
    "in",
    "inner",
    "intersect",
    "interval",
    "into",
    "is",
    "join",
    "lateral",
    "left",
    "like",
    "limit",
    "lookup",
    "merge",
    "natural",
    "new",
    "no",
    "not",
    "null",
    "nulls",
    "of",
    "on",
    "or",
    "order",
    "outer",
    "over",
    "partition",
    "preceding",
    "proto",
    "qualify",
    "range",
    "recursive",
    "respect",
    "right",
    "rollup",
    "rows",
    "select",
    "set",
    "some",
    "struct",
    "tablesample",
    "then",
    "to",
    "treat",
    "true",
    "unbounded",
    "union",
    "unnest",
    "using",
    "when",
    "where",
    "window",
    "with",
    "within",
];

/// Platform-reserved metadata column names injected by the ingestion
/// layer. Business columns must not reuse them, and the diff engine
/// never compares them.
pub const PLATFORM_METADATA_COLUMNS: [&str; 8] = [
    "_ingestion_timestamp",
    "_source_system",
    "_batch_id",
    "_record_hash",
    "_is_deleted",
    "_deleted_timestamp",
    "_op_type",
    "_op_ts",
];

/// Whether `name` is a warehouse reserved keyword.
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.binary_search(&name).is_ok()
}

/// Whether `name` is a platform-reserved metadata column.
pub fn is_platform_metadata_column(name: &str) -> bool {
    PLATFORM_METADATA_COLUMNS.contains(&name)
}

/// Normalize a raw identifier to warehouse standards.
///
/// Rules: trim, lowercase, replace anything outside `[a-z0-9_]` with
/// `_`, collapse repeated `_`, and prefix `_` when the first character
/// is not a letter or underscore. Empty input normalizes to `_`.
pub fn normalize_identifier(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for c in name.trim().chars() {
        let c = c.to_ascii_lowercase();
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '_'
        };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        normalized.push(mapped);
    }

    match normalized.chars().next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => normalized,
        _ => format!("_{normalized}"),
    }
}

/// Build the warehouse dataset name: `{domain}_{environment}_{zone}`.
pub fn build_dataset_name(domain: &str, environment: &str, zone: &str) -> String {
    normalize_identifier(&format!("{domain}_{environment}_{zone}"))
}

/// Build a warehouse table name: `{domain}_{entity}_{layer}`.
pub fn build_table_name(domain: &str, entity: &str, layer: &str) -> String {
    normalize_identifier(&format!("{domain}_{entity}_{layer}"))
}

fn require_identity_field(value: &str, field: &str) -> NamingResult<()> {
    if value.trim().is_empty() {
        return MissingDatasetIdentitySnafu {
            field: field.to_string(),
        }
        .fail();
    }
    Ok(())
}

/// Apply warehouse-safe naming to the dataset, tables, and columns of a
/// canonical schema, mutating it in place.
///
/// Column handling, per table, in original field order: normalize the
/// raw name; prefix with the table name when the normalized name is a
/// reserved keyword; then de-duplicate deterministically (the first
/// occurrence keeps its name, the n-th repeat becomes `name_n` with n
/// starting at 2). Every raw-to-final pair lands in
/// `schema.rename_mappings`.
///
/// # Errors
///
/// Fails when a dataset identity field is empty or when a business
/// column claims a platform-reserved metadata column name.
pub fn normalize_schema(schema: &mut CanonicalSchema) -> NamingResult<()> {
    let identity = &schema.dataset;
    require_identity_field(&identity.domain, "domain")?;
    require_identity_field(&identity.environment, "environment")?;
    require_identity_field(&identity.zone, "zone")?;
    require_identity_field(&identity.layer, "layer")?;
    require_identity_field(&identity.entity, "entity")?;

    let domain = schema.dataset.domain.clone();
    let layer = schema.dataset.layer.clone();

    schema.dataset.dataset_name = Some(build_dataset_name(
        &domain,
        &schema.dataset.environment,
        &schema.dataset.zone,
    ));

    schema.rename_mappings.tables.clear();
    schema.rename_mappings.columns.clear();

    for table in &mut schema.tables {
        let raw_table_name = table.name.clone();
        let final_table_name = build_table_name(&domain, &raw_table_name, &layer);

        schema
            .rename_mappings
            .tables
            .insert(raw_table_name, final_table_name.clone());
        table.name = final_table_name.clone();

        let mut table_columns: BTreeMap<String, String> = BTreeMap::new();
        let mut seen: HashMap<String, u32> = HashMap::new();

        for field in &mut table.fields {
            let raw_column_name = field.name.clone();
            let mut normalized = normalize_identifier(&raw_column_name);

            if is_platform_metadata_column(&normalized) {
                return ReservedPlatformColumnSnafu {
                    raw: raw_column_name,
                    normalized,
                    table: final_table_name,
                }
                .fail();
            }

            if is_reserved_keyword(&normalized) {
                normalized = format!("{final_table_name}_{normalized}");
            }

            let count = seen.entry(normalized.clone()).or_insert(0);
            *count += 1;
            let final_column_name = if *count == 1 {
                normalized
            } else {
                format!("{normalized}_{count}")
            };

            table_columns.insert(raw_column_name, final_column_name.clone());
            field.name = final_column_name;
        }

        schema
            .rename_mappings
            .columns
            .insert(final_table_name, table_columns);
    }

    Ok(())
}
