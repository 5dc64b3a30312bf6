//! Canonical schema root: dataset identity, tables, and rename lineage.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canonical::table::CanonicalTable;

/// Supported source formats.
///
/// A closed set of variants: new formats are new variants with their own
/// adapter, not open-ended runtime registration, so the inference
/// contract stays statically guaranteed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Delimited text, pre-parsed into records upstream.
    Csv,
    /// JSON objects, arrays of objects, or JSONL.
    Json,
    /// Columnar container files, read upstream.
    Parquet,
    /// Row-oriented container files with embedded schemas, read upstream.
    Avro,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
            SourceFormat::Parquet => "parquet",
            SourceFormat::Avro => "avro",
        };
        write!(f, "{name}")
    }
}

/// Identity of the dataset a submission belongs to.
///
/// All five fields must be present before the normalizer runs; they
/// drive dataset and table naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DatasetIdentity {
    /// Business domain (for example, `sales`).
    pub domain: String,
    /// Deployment environment (for example, `prod`).
    pub environment: String,
    /// Storage zone (for example, `curated`).
    pub zone: String,
    /// Modelling layer (for example, `raw` or `silver`).
    pub layer: String,
    /// Logical entity name (for example, `orders`).
    pub entity: String,
    /// Warehouse dataset name, filled in by the normalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
}

/// Raw-to-final rename lineage recorded by the normalizer.
///
/// Every table and column rename is traceable; identical raw/final pairs
/// are recorded too so the mapping is complete for documentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RenameMappings {
    /// Raw table name to final table name.
    pub tables: BTreeMap<String, String>,
    /// Final table name to a map of raw column name to final column name.
    pub columns: BTreeMap<String, BTreeMap<String, String>>,
}

/// Canonical, format-agnostic description of one submission.
///
/// Created fresh per submission by an adapter, mutated in place by the
/// normalizer, and discarded after its mapped projection is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalSchema {
    /// Which adapter produced this schema.
    pub source_type: SourceFormat,
    /// Dataset identity used for naming and registry keying.
    pub dataset: DatasetIdentity,
    /// Tables in this submission.
    pub tables: Vec<CanonicalTable>,
    /// Optional schema-level description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form source metadata (file names, sample sizes, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Rename lineage, populated by the normalizer.
    #[serde(default)]
    pub rename_mappings: RenameMappings,
}

impl CanonicalSchema {
    /// Construct a schema for the given source format and identity.
    pub fn new(
        source_type: SourceFormat,
        dataset: DatasetIdentity,
        tables: Vec<CanonicalTable>,
    ) -> Self {
        CanonicalSchema {
            source_type,
            dataset,
            tables,
            description: None,
            metadata: BTreeMap::new(),
            rename_mappings: RenameMappings::default(),
        }
    }
}
