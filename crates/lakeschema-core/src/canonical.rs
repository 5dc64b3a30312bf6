//! Canonical (format-agnostic) schema model.
//!
//! This module groups the in-memory entity graph that adapters populate
//! and that the normalizer, projector, and diff engine consume:
//!
//! - [`field::CanonicalField`] — a recursive column description with
//!   canonical type, nullability, array/record nesting, and inferred
//!   numeric metadata.
//! - [`table::CanonicalTable`] — an ordered collection of fields plus
//!   profiling metadata.
//! - [`schema::CanonicalSchema`] — the per-submission root: source
//!   format, dataset identity, tables, and rename lineage.
//!
//! The canonical model carries no warehouse-specific knowledge; only its
//! mapped projection (see [`crate::mapping`]) is ever persisted.

pub mod field;
pub mod schema;
pub mod table;

pub use field::{CanonicalDataType, CanonicalField, FieldStats, FieldValidationError, NumericMetadata};
pub use schema::{CanonicalSchema, DatasetIdentity, RenameMappings, SourceFormat};
pub use table::{CanonicalTable, RowCountMode, TableMetadata, TableValidationError};
